use crate::domain::money::{Balance, Credit, Money};
use crate::domain::order::UserId;
use crate::error::SettlementError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Uz,
    #[default]
    En,
    Ru,
}

impl Lang {
    /// Unknown language codes fall back to English.
    pub fn from_code(code: &str) -> Self {
        match code.split(['-', '_']).next().unwrap_or_default() {
            "uz" => Lang::Uz,
            "ru" => Lang::Ru,
            _ => Lang::En,
        }
    }
}

/// The credit-ledger part of a user.
///
/// `credit_balance` only grows through settlement and only shrinks through
/// consumption; `spent_balance` and `paid_total` never decrease.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct UserAccount {
    pub user: UserId,
    #[serde(default)]
    pub lang: Lang,
    pub credit_balance: Credit,
    pub spent_balance: Credit,
    pub paid_total: Balance,
}

impl UserAccount {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            lang: Lang::default(),
            credit_balance: Credit::ZERO,
            spent_balance: Credit::ZERO,
            paid_total: Balance::ZERO,
        }
    }

    /// Books a paid order: adds the grant and the money it was bought with.
    ///
    /// Leaves the account untouched when either total would overflow.
    pub fn grant(&mut self, credit: Credit, paid: Money) -> Result<(), SettlementError> {
        let credit_balance = self.credit_balance.0.checked_add(credit.0);
        let paid_total = self.paid_total.0.checked_add(paid.value());
        match (credit_balance, paid_total) {
            (Some(credit_balance), Some(paid_total)) => {
                self.credit_balance = Credit(credit_balance);
                self.paid_total = Balance(paid_total);
                Ok(())
            }
            _ => Err(SettlementError::LedgerInvariantViolation(format!(
                "Granting {} s for {} overflows the ledger of user {}",
                credit, paid, self.user
            ))),
        }
    }

    /// Moves `seconds` from the usable balance to the spent balance.
    pub fn consume(&mut self, seconds: Credit) -> Result<(), SettlementError> {
        if seconds.seconds().is_sign_negative() {
            return Err(SettlementError::ValidationError(
                "Consumed credit must not be negative".to_string(),
            ));
        }
        if self.credit_balance >= seconds {
            let spent_balance = self.spent_balance.0.checked_add(seconds.0).ok_or_else(|| {
                SettlementError::LedgerInvariantViolation(format!(
                    "Spent balance of user {} overflows",
                    self.user
                ))
            })?;
            self.credit_balance -= seconds;
            self.spent_balance = Credit(spent_balance);
            Ok(())
        } else {
            Err(SettlementError::InsufficientCredit {
                user: self.user,
                requested: seconds.seconds(),
                available: self.credit_balance.seconds(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_grant() {
        let mut account = UserAccount::new(1);
        account
            .grant(Credit::new(dec!(3600)), Money::new(dec!(36000)).unwrap())
            .unwrap();
        assert_eq!(account.credit_balance, Credit::new(dec!(3600)));
        assert_eq!(account.paid_total, Balance::new(dec!(36000)));
        assert_eq!(account.spent_balance, Credit::ZERO);
    }

    #[test]
    fn test_grant_overflow_leaves_account_unchanged() {
        let mut account = UserAccount::new(1);
        account.credit_balance = Credit::new(dec!(10));
        account.paid_total = Balance::new(Decimal::MAX);

        let result = account.grant(Credit::new(dec!(3600)), Money::new(dec!(36000)).unwrap());
        assert!(matches!(
            result,
            Err(SettlementError::LedgerInvariantViolation(_))
        ));
        assert_eq!(account.credit_balance, Credit::new(dec!(10)));
        assert_eq!(account.paid_total, Balance::new(Decimal::MAX));
    }

    #[test]
    fn test_consume_success() {
        let mut account = UserAccount::new(1);
        account.credit_balance = Credit::new(dec!(100));

        account.consume(Credit::new(dec!(40))).unwrap();
        assert_eq!(account.credit_balance, Credit::new(dec!(60)));
        assert_eq!(account.spent_balance, Credit::new(dec!(40)));
    }

    #[test]
    fn test_consume_insufficient() {
        let mut account = UserAccount::new(1);
        account.credit_balance = Credit::new(dec!(10));

        let result = account.consume(Credit::new(dec!(11)));
        assert!(matches!(
            result,
            Err(SettlementError::InsufficientCredit { user: 1, .. })
        ));
        assert_eq!(account.credit_balance, Credit::new(dec!(10)));
        assert_eq!(account.spent_balance, Credit::ZERO);
    }

    #[test]
    fn test_lang_from_code() {
        assert_eq!(Lang::from_code("uz-UZ"), Lang::Uz);
        assert_eq!(Lang::from_code("ru"), Lang::Ru);
        assert_eq!(Lang::from_code("en-US"), Lang::En);
        assert_eq!(Lang::from_code("de"), Lang::En);
    }
}
