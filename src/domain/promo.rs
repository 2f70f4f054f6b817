use crate::domain::order::UserId;
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type PromoId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PromoCode {
    pub id: PromoId,
    pub name: String,
    pub min_price: Decimal,
    pub discount_amount: Decimal,
    pub usage_limit: u32,
    pub is_active: bool,
}

impl PromoCode {
    /// Whether `user_usage` still leaves room for an order of `amount`.
    pub fn check_eligible(&self, amount: Decimal, user_usage: Option<&PromoCodeUsage>) -> Result<()> {
        if !self.is_active {
            return Err(SettlementError::ValidationError(format!(
                "Promo code '{}' is not active",
                self.name
            )));
        }
        if amount < self.min_price {
            return Err(SettlementError::ValidationError(format!(
                "Promo code '{}' requires a minimum price of {}",
                self.name, self.min_price
            )));
        }
        if user_usage.is_some_and(|u| u.usage_count >= self.usage_limit) {
            return Err(SettlementError::ValidationError(format!(
                "Promo code '{}' usage limit reached",
                self.name
            )));
        }
        Ok(())
    }
}

/// Per-(promo, user) usage counter.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PromoCodeUsage {
    pub promo: PromoId,
    pub user: UserId,
    pub usage_count: u32,
}

impl PromoCodeUsage {
    pub fn new(promo: PromoId, user: UserId) -> Self {
        Self {
            promo,
            user,
            usage_count: 0,
        }
    }

    /// Counts one more use if the limit allows it.
    ///
    /// Returns `Ok(false)` when the promo is exhausted; the counter is left
    /// untouched. A counter already above the limit means the stored data
    /// is corrupt and is reported as an invariant violation.
    pub fn increment(&mut self, limit: u32) -> Result<bool> {
        if self.usage_count > limit {
            return Err(SettlementError::LedgerInvariantViolation(format!(
                "promo {} usage for user {} is {} but the limit is {}",
                self.promo, self.user, self.usage_count, limit
            )));
        }
        if self.usage_count < limit {
            self.usage_count += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
