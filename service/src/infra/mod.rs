//! Infrastructure implementations.

pub mod assistant;
pub mod database;
pub mod ledger;

#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
pub use self::{
    assistant::{Assistant, OpenAi},
    database::{Database, Memory, Storage},
    ledger::{Ledger, SolanaRpc},
};
