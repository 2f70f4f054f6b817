use crate::domain::money::{Credit, Money};
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A bulk-purchase package: paying exactly `amount` grants `credit` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    pub amount: Decimal,
    pub credit: Decimal,
}

/// Converts a paid amount into seconds of credit.
///
/// Exact tier matches win; any other amount is converted linearly at
/// `price_per_second`. This is the only place credit grants are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    pub price_per_second: Decimal,
    pub tiers: Vec<PriceTier>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            price_per_second: dec!(10),
            tiers: vec![
                PriceTier {
                    amount: dec!(36000),
                    credit: dec!(3600),
                },
                PriceTier {
                    amount: dec!(100000),
                    credit: dec!(10800),
                },
                PriceTier {
                    amount: dec!(200000),
                    credit: dec!(25200),
                },
                PriceTier {
                    amount: dec!(500000),
                    credit: dec!(61200),
                },
            ],
        }
    }
}

impl PricingTable {
    pub fn validate(&self) -> Result<()> {
        if self.price_per_second <= Decimal::ZERO {
            return Err(SettlementError::ValidationError(
                "price_per_second must be positive".to_string(),
            ));
        }
        for (i, tier) in self.tiers.iter().enumerate() {
            if tier.amount <= Decimal::ZERO || tier.credit <= Decimal::ZERO {
                return Err(SettlementError::ValidationError(format!(
                    "tier {} must have a positive amount and credit",
                    tier.amount
                )));
            }
            if self.tiers[..i].iter().any(|t| t.amount == tier.amount) {
                return Err(SettlementError::ValidationError(format!(
                    "tier {} is defined more than once",
                    tier.amount
                )));
            }
        }
        Ok(())
    }

    pub fn credit_for(&self, amount: Money) -> Credit {
        let value = amount.value();
        let seconds = self
            .tiers
            .iter()
            .find(|tier| tier.amount == value)
            .map(|tier| tier.credit)
            .unwrap_or_else(|| value / self.price_per_second);
        Credit::new(seconds.normalize())
    }
}
