//! Domain types and ports.
//!
//! Nothing in here performs I/O; storage, gateways and notifications are
//! reached only through the traits in [`ports`].

pub mod gateway;
pub mod ledger;
pub mod money;
pub mod notification;
pub mod order;
pub mod ports;
pub mod pricing;
pub mod promo;
