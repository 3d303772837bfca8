//! Human-readable durations for config values like `interval = "60s"`.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Parse a duration string like "60s", "5m", "1h" or "1d".
///
/// The unit suffix is case-insensitive and surrounding whitespace is ignored.
///
/// ```
/// use stockalloc::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("1H").unwrap(), Duration::from_secs(3600));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let Some(unit) = s.chars().last() else {
        anyhow::bail!("Duration is empty");
    };

    let multiplier = match unit.to_ascii_lowercase() {
        'd' => SECS_PER_DAY,
        'h' => SECS_PER_HOUR,
        'm' => SECS_PER_MINUTE,
        's' => 1,
        _ => anyhow::bail!("Duration must end with d, h, m, or s"),
    };

    let digits = &s[..s.len() - unit.len_utf8()];
    let count: u64 = digits
        .parse()
        .with_context(|| format!("Invalid number in duration: {s:?}"))?;
    let secs = count
        .checked_mul(multiplier)
        .context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Like [`parse_duration`] but rejects `0`.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let d = parse_duration(s)?;
    if d.is_zero() {
        anyhow::bail!("Interval must be greater than zero");
    }
    Ok(d)
}

/// Format a duration with the largest unit that divides it evenly.
///
/// ```
/// use stockalloc::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(60)), "1m");
/// assert_eq!(format_duration(Duration::from_secs(90)), "90s");
/// ```
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let units = [(SECS_PER_DAY, 'd'), (SECS_PER_HOUR, 'h'), (SECS_PER_MINUTE, 'm')];

    for (size, suffix) in units {
        if secs >= size && secs % size == 0 {
            return format!("{}{suffix}", secs / size);
        }
    }
    format!("{secs}s")
}

/// Serde adapter: `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// Serde adapter writing the [`format_duration`] form.
pub fn serialize_duration<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*d))
}

/// Serde adapter for refresh intervals, where zero is not allowed.
pub fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_interval(&s).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86400));
        assert_eq!(parse_duration("3h").unwrap(), Duration::from_secs(3 * 3600));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn tolerates_case_and_whitespace() {
        assert_eq!(parse_duration(" 60S\n").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("\t1M").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "   ", "60", "s", "1w", "-5s", "1.5m", "abc"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_overflow() {
        let max = u64::MAX.to_string();
        assert!(parse_duration(&format!("{max}d")).is_err());
        assert!(parse_duration(&format!("{max}s")).is_ok());
    }

    #[test]
    fn interval_must_be_positive() {
        assert!(parse_interval("0s").is_err());
        assert_eq!(parse_interval("60s").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn formats_with_largest_even_unit() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(86400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(3700)), "3700s");
    }

    #[test]
    fn deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            #[serde(deserialize_with = "deserialize_interval")]
            interval: Duration,
        }

        let parsed: Section = toml::from_str(r#"interval = "5m""#).unwrap();
        assert_eq!(parsed.interval, Duration::from_secs(300));

        let zero = toml::from_str::<Section>(r#"interval = "0s""#);
        assert!(zero.is_err());
    }
}
