use crate::error::SettlementError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A strictly positive monetary amount, as charged for one order.
///
/// Money never goes through binary floating point; the tier lookup in the
/// pricing table compares these values exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub fn new(value: Decimal) -> Result<Self, SettlementError> {
        if value > Decimal::ZERO {
            Ok(Self(value.normalize()))
        } else {
            Err(SettlementError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = SettlementError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Running money total kept on a user's ledger.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Balance {
    fn from(money: Money) -> Self {
        Self(money.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Seconds of purchased service credit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Credit(pub Decimal);

impl Credit {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(seconds: Decimal) -> Self {
        Self(seconds)
    }

    pub fn seconds(&self) -> Decimal {
        self.0
    }
}

impl Add for Credit {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Credit {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Credit {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Credit {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Credit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_arithmetic() {
        let c1 = Credit::new(dec!(3600));
        let c2 = Credit::new(dec!(600));
        assert_eq!(c1 + c2, Credit::new(dec!(4200)));
        assert_eq!(c1 - c2, Credit::new(dec!(3000)));
    }

    #[test]
    fn test_money_validation() {
        assert!(Money::new(dec!(36000)).is_ok());
        assert!(matches!(
            Money::new(dec!(0)),
            Err(SettlementError::ValidationError(_))
        ));
        assert!(matches!(
            Money::new(dec!(-1)),
            Err(SettlementError::ValidationError(_))
        ));
    }

    #[test]
    fn test_money_rejects_non_positive_on_deserialize() {
        let parsed: Result<Money, _> = serde_json::from_str("\"0\"");
        assert!(parsed.is_err());

        let parsed: Money = serde_json::from_str("\"36000.00\"").unwrap();
        assert_eq!(parsed.value(), dec!(36000));
    }
}
