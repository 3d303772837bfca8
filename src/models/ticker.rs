use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::InputError;

/// Stock symbol used as the portfolio key.
///
/// Always trimmed and upper-cased. Accepts the characters exchanges actually
/// use in symbols: letters, digits, `.`, `-`, `^` and `=` (e.g. `BRK.B`,
/// `^GSPC`, `EURUSD=X`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

fn pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Z0-9.\-^=]{1,20}$").ok())
        .as_ref()
}

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(InputError::EmptyTicker);
        }
        if !pattern().is_some_and(|re| re.is_match(&normalized)) {
            return Err(InputError::MalformedTicker(raw.trim().to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ticker {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let ticker = Ticker::parse("  aapl ").unwrap();
        assert_eq!(ticker.as_str(), "AAPL");
    }

    #[test]
    fn accepts_exchange_symbols() {
        for symbol in ["BRK.B", "BRK-B", "^GSPC", "EURUSD=X", "BTC-USD", "7203.T"] {
            assert!(Ticker::parse(symbol).is_ok(), "{symbol} should parse");
        }
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert_eq!(Ticker::parse("   "), Err(InputError::EmptyTicker));
        assert_eq!(
            Ticker::parse("AA PL"),
            Err(InputError::MalformedTicker("AA PL".to_string()))
        );
        assert!(Ticker::parse("ABCDEFGHIJKLMNOPQRSTU").is_err());
        assert!(Ticker::parse("../etc").is_err());
    }

    #[test]
    fn serde_goes_through_validation() {
        let ticker: Ticker = serde_json::from_str(r#""msft""#).unwrap();
        assert_eq!(ticker.as_str(), "MSFT");
        assert_eq!(serde_json::to_string(&ticker).unwrap(), r#""MSFT""#);
        assert!(serde_json::from_str::<Ticker>(r#""""#).is_err());
    }
}
