use crate::domain::ledger::UserAccount;
use crate::domain::order::UserId;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct AccountRow {
    user: UserId,
    credit_balance: Decimal,
    spent_balance: Decimal,
    paid_total: Decimal,
}

impl From<&UserAccount> for AccountRow {
    fn from(account: &UserAccount) -> Self {
        Self {
            user: account.user,
            credit_balance: account.credit_balance.seconds().normalize(),
            spent_balance: account.spent_balance.seconds().normalize(),
            paid_total: account.paid_total.0.normalize(),
        }
    }
}

/// Writes final ledger state as CSV, one row per user.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts<I>(&mut self, accounts: I) -> Result<()>
    where
        I: IntoIterator<Item = UserAccount>,
    {
        for account in accounts {
            self.writer.serialize(AccountRow::from(&account))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Balance, Credit};
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_header_and_normalized_rows() {
        let mut account = UserAccount::new(7);
        account.credit_balance = Credit::new(dec!(3540.00));
        account.spent_balance = Credit::new(dec!(60));
        account.paid_total = Balance::new(dec!(36000));

        let mut out = Vec::new();
        AccountWriter::new(&mut out)
            .write_accounts(vec![account])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "user,credit_balance,spent_balance,paid_total\n7,3540,60,36000\n"
        );
    }
}
