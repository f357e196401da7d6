//! Non-negative monetary amounts in minor units.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Non-negative decimal amount stored in the smallest currency unit (cents).
///
/// Parsed from and rendered as a plain decimal string with two fraction
/// digits (`"149.90"`), which is how the CRM API and the store exchange prices
/// and order totals.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(u64);

const MINOR_DIGITS: usize = 2;
const MINOR_PER_MAJOR: u64 = 100;

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub fn minor(&self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Parse a decimal string such as `"12"`, `"12.5"` or `"12.50"`.
    ///
    /// Extra fraction digits are accepted only when they are zeros, so a
    /// value is never silently rounded.
    pub fn parse_decimal(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DomainError::validation("amount is empty"));
        }
        if s.starts_with('-') {
            return Err(DomainError::validation(format!("amount must not be negative: {s}")));
        }

        let (major, fraction) = match s.split_once('.') {
            Some((major, fraction)) => (major, fraction),
            None => (s, ""),
        };

        if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation(format!("malformed amount: {s}")));
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation(format!("malformed amount: {s}")));
        }
        if fraction.len() > MINOR_DIGITS && fraction[MINOR_DIGITS..].bytes().any(|b| b != b'0') {
            return Err(DomainError::validation(format!(
                "amount has more than {MINOR_DIGITS} significant fraction digits: {s}"
            )));
        }

        let major: u64 = major
            .parse()
            .map_err(|_| DomainError::validation(format!("amount out of range: {s}")))?;

        let mut minor: u64 = 0;
        for i in 0..MINOR_DIGITS {
            let digit = fraction.as_bytes().get(i).map(|b| u64::from(b - b'0')).unwrap_or(0);
            minor = minor * 10 + digit;
        }

        major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(minor))
            .map(Money)
            .ok_or_else(|| DomainError::validation(format!("amount out of range: {s}")))
    }
}

impl ValueObject for Money {}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / MINOR_PER_MAJOR, self.0 % MINOR_PER_MAJOR)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl TryFrom<String> for Money {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_decimal(&value)
    }
}

impl From<Money> for String {
    fn from(value: Money) -> Self {
        value.to_string()
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).fold(0u64, u64::saturating_add))
    }
}
