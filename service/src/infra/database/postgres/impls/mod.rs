//! Per-entity [`Database`] implementations.
//!
//! [`Database`]: crate::infra::Database

mod session;
