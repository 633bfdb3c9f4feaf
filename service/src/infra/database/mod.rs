//! [`Database`]-related implementations.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use common::operations::{By, Insert, Select, Update};
use derive_more::{Display, Error as StdError, From};
use tracerr::Traced;

use crate::domain::{
    session::{self, Settle},
    Session,
};

pub use self::memory::Memory;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation.
pub use common::Handler as Database;

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Memory`] error.
    Memory(memory::Error),

    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    Postgres(postgres::Error),
}

/// [`Database`] implementation selected at startup.
///
/// Dispatches every operation to the configured backend. No [`Session`]
/// state is ever cached in front of it: every read reflects the latest
/// committed state.
#[derive(Clone, Debug)]
pub enum Storage {
    /// In-memory [`Database`].
    Memory(Memory),

    #[cfg(feature = "postgres")]
    /// [`Postgres`]-backed [`Database`].
    Postgres(Postgres),
}

impl Database<Insert<Session>> for Storage {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(&self, op: Insert<Session>) -> Result<Self::Ok, Self::Err> {
        match self {
            Self::Memory(db) => db.execute(op).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(db) => db.execute(op).await,
        }
    }
}

impl Database<Select<By<Option<Session>, session::Id>>> for Storage {
    type Ok = Option<Session>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        op: Select<By<Option<Session>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        match self {
            Self::Memory(db) => db.execute(op).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(db) => db.execute(op).await,
        }
    }
}

impl Database<Update<Settle>> for Storage {
    type Ok = bool;
    type Err = Traced<Error>;

    async fn execute(&self, op: Update<Settle>) -> Result<Self::Ok, Self::Err> {
        match self {
            Self::Memory(db) => db.execute(op).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(db) => db.execute(op).await,
        }
    }
}
