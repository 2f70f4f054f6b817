//! Wire formats at the edge of the system.

pub mod csv;
pub mod json;
