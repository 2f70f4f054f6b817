//! Application layer containing the settlement orchestration.
//!
//! `SettlementEngine` is the single place orders are resolved and ledgers
//! credited. Webhooks and the reconciliation scheduler both call into it and
//! rely on its per-order lock and commit guard instead of coordinating with
//! each other.

pub mod locks;
pub mod reconciliation;
pub mod settlement;
pub mod webhook;
