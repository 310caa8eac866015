use std::{fmt, str::FromStr};

use crate::EngineError;

/// Expense amount in **integer minor units** (cents).
///
/// Amounts are never stored as floats. The currency itself is implied by the
/// entity's ledger and is not tracked here.
///
/// # Examples
///
/// ```rust
/// use engine::Amount;
///
/// let amount: Amount = "42.5".parse().unwrap();
/// assert_eq!(amount.minor(), 4250);
/// assert_eq!(amount.to_string(), "42.50");
/// assert!("12.345".parse::<Amount>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Amount(i64);

impl Amount {
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Absolute distance between two amounts, in minor units.
    #[must_use]
    pub fn distance(self, other: Amount) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    /// Parses a positive decimal string.
    ///
    /// Accepts `.` or `,` as decimal separator and at most 2 fractional
    /// digits. Signs are rejected: an expense amount is always positive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidInput(format!("invalid amount: {s}"));

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidInput("empty amount".to_string()));
        }

        let normalized = trimmed.replace(',', ".");
        let (units_str, frac_str) = match normalized.split_once('.') {
            Some((units, frac)) => (units, frac),
            None => (normalized.as_str(), ""),
        };

        if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units_str.parse().map_err(|_| invalid())?;
        let cents: i64 = match frac_str.len() {
            0 => 0,
            1 => frac_str.parse::<i64>().map_err(|_| invalid())? * 10,
            2 => frac_str.parse::<i64>().map_err(|_| invalid())?,
            _ => return Err(EngineError::InvalidInput("too many decimals".to_string())),
        };

        units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .map(Amount)
            .ok_or_else(|| EngineError::InvalidInput("amount too large".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_two_digits() {
        assert_eq!(Amount::new(0).to_string(), "0.00");
        assert_eq!(Amount::new(7).to_string(), "0.07");
        assert_eq!(Amount::new(4250).to_string(), "42.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Amount>().unwrap().minor(), 1000);
        assert_eq!("10,5".parse::<Amount>().unwrap().minor(), 1050);
        assert_eq!(" 42.50 ".parse::<Amount>().unwrap().minor(), 4250);
        assert_eq!("3.".parse::<Amount>().unwrap().minor(), 300);
    }

    #[test]
    fn parse_rejects_garbage() {
        for input in ["", "abc", "-1", "+1", "1.2.3", "12.345", ".5", "1e3"] {
            assert!(input.parse::<Amount>().is_err(), "{input}");
        }
    }

    #[test]
    fn only_positive_amounts_are_positive() {
        assert!(Amount::new(1).is_positive());
        assert!(!Amount::new(0).is_positive());
        assert!(!Amount::new(-250).is_positive());
    }

    #[test]
    fn distance_is_symmetric() {
        assert_eq!(Amount::new(1000).distance(Amount::new(1001)), 1);
        assert_eq!(Amount::new(1001).distance(Amount::new(1000)), 1);
    }
}
