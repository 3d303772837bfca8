//! Text rendering for money, percentages and share counts.
//!
//! Shared by the CSV exporter and the CLI table so both show the same figures.

/// How money is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyFormat {
    pub symbol: String,
    /// Insert `,` every three integer digits.
    pub grouping: bool,
}

impl Default for MoneyFormat {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            grouping: false,
        }
    }
}

impl MoneyFormat {
    pub fn new(symbol: impl Into<String>, grouping: bool) -> Self {
        Self {
            symbol: symbol.into(),
            grouping,
        }
    }

    /// Two decimal places, sign before the symbol: `-$250.00`.
    pub fn format(&self, value: f64) -> String {
        let fixed = format!("{:.2}", value.abs());
        // A value that rounds to zero should not print as "-$0.00".
        let negative = value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0');

        let body = if self.grouping {
            group_number_string(&fixed)
        } else {
            fixed
        };

        let mut out = String::with_capacity(body.len() + self.symbol.len() + 1);
        if negative {
            out.push('-');
        }
        out.push_str(&self.symbol);
        out.push_str(&body);
        out
    }
}

fn group_int_digits(int_part: &str) -> String {
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        out.push(ch);
        let remaining = len.saturating_sub(i + 1);
        if remaining > 0 && remaining % 3 == 0 {
            out.push(',');
        }
    }
    out
}

fn group_number_string(s: &str) -> String {
    match s.split_once('.') {
        Some((int_part, frac)) => format!("{}.{frac}", group_int_digits(int_part)),
        None => group_int_digits(s),
    }
}

pub fn format_money(value: f64) -> String {
    MoneyFormat::default().format(value)
}

/// One decimal place with a percent sign: `40.0%`.
pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Share counts keep three decimals so fractional shares stay visible.
pub fn format_quantity(value: f64) -> String {
    format!("{value:.3}")
}
