use crate::domain::ledger::Lang;
use crate::domain::money::{Credit, Money};
use crate::domain::order::{Gateway, OrderId, Outcome, UserId};
use crate::domain::promo::{PromoCode, PromoId};
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    User,
    Promo,
    Create,
    Ack,
    Paid,
    Cancel,
    Consume,
}

/// One raw CSV row. Which columns are required depends on `type`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub r#type: CommandType,
    pub order: Option<OrderId>,
    pub user: Option<UserId>,
    pub amount: Option<Decimal>,
    pub gateway: Option<Gateway>,
    pub promo: Option<PromoId>,
    pub min_price: Option<Decimal>,
    pub limit: Option<u32>,
    pub lang: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum LedgerCommand {
    RegisterUser { user: UserId, lang: Lang },
    DefinePromo(PromoCode),
    Create {
        order: OrderId,
        user: UserId,
        amount: Money,
        gateway: Gateway,
        promo: Option<PromoId>,
    },
    Acknowledge(OrderId),
    Settle(OrderId, Outcome),
    Consume { user: UserId, seconds: Credit },
}

fn required<T>(value: Option<T>, column: &str, kind: CommandType) -> Result<T> {
    value.ok_or_else(|| {
        SettlementError::ValidationError(format!(
            "'{}' column is required for {:?} commands",
            column, kind
        ))
    })
}

impl TryFrom<CommandRecord> for LedgerCommand {
    type Error = SettlementError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let kind = record.r#type;
        match kind {
            CommandType::User => Ok(LedgerCommand::RegisterUser {
                user: required(record.user, "user", kind)?,
                lang: record.lang.as_deref().map(Lang::from_code).unwrap_or_default(),
            }),
            CommandType::Promo => {
                let id = required(record.promo, "promo", kind)?;
                Ok(LedgerCommand::DefinePromo(PromoCode {
                    id,
                    name: format!("PROMO{}", id),
                    min_price: record.min_price.unwrap_or(Decimal::ZERO),
                    discount_amount: required(record.amount, "amount", kind)?,
                    usage_limit: required(record.limit, "limit", kind)?,
                    is_active: true,
                }))
            }
            CommandType::Create => Ok(LedgerCommand::Create {
                order: required(record.order, "order", kind)?,
                user: required(record.user, "user", kind)?,
                amount: Money::new(required(record.amount, "amount", kind)?)?,
                gateway: record.gateway.unwrap_or(Gateway::Push),
                promo: record.promo,
            }),
            CommandType::Ack => Ok(LedgerCommand::Acknowledge(required(
                record.order,
                "order",
                kind,
            )?)),
            CommandType::Paid => Ok(LedgerCommand::Settle(
                required(record.order, "order", kind)?,
                Outcome::Paid,
            )),
            CommandType::Cancel => Ok(LedgerCommand::Settle(
                required(record.order, "order", kind)?,
                Outcome::Cancelled,
            )),
            CommandType::Consume => Ok(LedgerCommand::Consume {
                user: required(record.user, "user", kind)?,
                seconds: Credit::new(required(record.amount, "amount", kind)?),
            }),
        }
    }
}

/// Reads ledger commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<LedgerCommand>`.
/// It trims whitespace and tolerates rows that omit trailing columns.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads, deserializes and validates commands.
    pub fn commands(self) -> impl Iterator<Item = Result<LedgerCommand>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| -> Result<LedgerCommand> { LedgerCommand::try_from(result?) })
    }
}
