//! Amount comparison and display helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default rounding tolerance, one sen.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Slack absorbed when comparing against the tolerance so `0.01` itself still passes.
const COMPARE_EPSILON: f64 = 1e-9;

/// Returns true when `a` and `b` agree within `tolerance`.
pub fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance + COMPARE_EPSILON
}

/// Rounds to two decimal places for presentation and storage of totals.
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn symbol(&self) -> &str {
        match self.0.as_str() {
            "MYR" => "RM",
            "USD" => "$",
            "SGD" => "S$",
            "EUR" => "€",
            "GBP" => "£",
            other => other,
        }
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("MYR")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NegativeStyle {
    #[default]
    Sign,
    Parentheses,
}

/// Displays an amount with currency symbol, thousands grouping and two decimals.
pub struct Money<'a> {
    pub amount: f64,
    pub currency: &'a CurrencyCode,
    pub negative: NegativeStyle,
}

impl<'a> Money<'a> {
    pub fn new(amount: f64, currency: &'a CurrencyCode) -> Self {
        Self {
            amount,
            currency,
            negative: NegativeStyle::Sign,
        }
    }

    pub fn accounting(mut self) -> Self {
        self.negative = NegativeStyle::Parentheses;
        self
    }
}

impl fmt::Display for Money<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = round2(self.amount);
        let body = format!("{} {}", self.currency.symbol(), group_thousands(value.abs()));
        let text = if value < 0.0 {
            match self.negative {
                NegativeStyle::Sign => format!("-{body}"),
                NegativeStyle::Parentheses => format!("({body})"),
            }
        } else {
            body
        };
        f.pad(&text)
    }
}

fn group_thousands(value: f64) -> String {
    let raw = format!("{value:.2}");
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_is_inclusive() {
        assert!(within_tolerance(100.0, 100.01, DEFAULT_TOLERANCE));
        assert!(!within_tolerance(100.0, 100.02, DEFAULT_TOLERANCE));
    }

    #[test]
    fn money_groups_and_signs() {
        let myr = CurrencyCode::default();
        assert_eq!(Money::new(1234567.891, &myr).to_string(), "RM 1,234,567.89");
        assert_eq!(Money::new(-800.0, &myr).to_string(), "-RM 800.00");
        assert_eq!(Money::new(-800.0, &myr).accounting().to_string(), "(RM 800.00)");
        assert_eq!(Money::new(-0.001, &myr).to_string(), "RM 0.00");
    }
}
