use crate::domain::pricing::PricingTable;
use crate::error::{Result, SettlementError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Retry and scheduling policy for polled gateways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay between order creation and the first status check.
    pub initial_delay_ms: u64,
    /// Retries after the first attempt when the gateway is unavailable.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// A single status query taking longer than this counts as unavailable.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 20_000,
            max_retries: 3,
            backoff_base_ms: 30_000,
            backoff_max_ms: 600_000,
            attempt_timeout_ms: 15_000,
        }
    }
}

impl RetryPolicy {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Exponential delay before retry number `retry` (1-based), capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let delay = self.backoff_base_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.attempt_timeout_ms == 0 {
            return Err(SettlementError::ValidationError(
                "attempt_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(SettlementError::ValidationError(
                "backoff_max_ms must not be below backoff_base_ms".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub pricing: PricingTable,
    pub reconciliation: RetryPolicy,
}

impl SettlementConfig {
    /// Loads a JSON config file, or the built-in defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let reader = BufReader::new(File::open(path)?);
                serde_json::from_reader(reader)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pricing.validate()?;
        self.reconciliation.validate()
    }
}
