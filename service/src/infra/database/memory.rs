//! In-memory [`Database`] implementation.

use std::{collections::HashMap, sync::Arc};

use common::operations::{By, Insert, Select, Update};
use derive_more::{Display, Error as StdError};
use tokio::sync::Mutex;
use tracerr::Traced;

use crate::domain::{
    session::{self, Settle},
    Session,
};

use super::Database;

/// In-memory [`Database`] client.
///
/// Used when no Postgres configuration is provided. Keeps all [`Session`]s
/// in a process-local map, so all state is lost on restart. The settling
/// update is checked and applied under a single lock guard, keeping the
/// at-most-once settlement guarantee of the persistent backend.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Stored [`Session`]s, keyed by their IDs.
    sessions: Arc<Mutex<HashMap<session::Id, Session>>>,
}

impl Database<Insert<Session>> for Memory {
    type Ok = ();
    type Err = Traced<super::Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.id) {
            return Err(tracerr::new!(super::Error::Memory(
                Error::DuplicateSession(session.id),
            )));
        }
        drop(sessions.insert(session.id, session));
        Ok(())
    }
}

impl Database<Select<By<Option<Session>, session::Id>>> for Memory {
    type Ok = Option<Session>;
    type Err = Traced<super::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.sessions.lock().await.get(&id).cloned())
    }
}

impl Database<Update<Settle>> for Memory {
    type Ok = bool;
    type Err = Traced<super::Error>;

    async fn execute(
        &self,
        Update(settle): Update<Settle>,
    ) -> Result<Self::Ok, Self::Err> {
        let Settle {
            session_id,
            settlement,
        } = settle;

        let mut sessions = self.sessions.lock().await;
        Ok(match sessions.get_mut(&session_id) {
            Some(session) if session.settlement.is_none() => {
                session.settlement = Some(settlement);
                true
            }
            Some(_) | None => false,
        })
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// [`Session`] with the same ID is stored already.
    #[display("`Session(id: {_0})` exists already")]
    DuplicateSession(#[error(not(source))] session::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Insert, Select, Update},
        Chain, DateTime, Lamports,
    };

    use crate::{
        domain::{
            session::{self, Product, Receiver, Settle, Settlement, Signature,
                      Token},
            Session,
        },
        infra::Database as _,
    };

    use super::Memory;

    fn session(id: session::Id) -> Session {
        Session {
            id,
            product: Product::new("tradegpt").unwrap(),
            chain: Chain::Solana,
            wallet: None,
            amount_required: Lamports::from(10_000_000),
            receiver: Receiver::new("1".repeat(32)).unwrap(),
            created_at: DateTime::now().coerce(),
            settlement: None,
        }
    }

    fn settlement(token: &str) -> Settlement {
        #[expect(unsafe_code, reason = "test token")]
        let access_token = unsafe { Token::new_unchecked(token.to_owned()) };
        Settlement {
            signature: Signature::new("A".repeat(64)).unwrap(),
            paid_at: DateTime::now().coerce(),
            access_token,
        }
    }

    #[tokio::test]
    async fn settles_unpaid_session_once() {
        let db = Memory::default();
        let id = session::Id::new();
        db.execute(Insert(session(id))).await.unwrap();

        let first = db
            .execute(Update(Settle {
                session_id: id,
                settlement: settlement("first"),
            }))
            .await
            .unwrap();
        let second = db
            .execute(Update(Settle {
                session_id: id,
                settlement: settlement("second"),
            }))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);

        let stored: Option<Session> = db
            .execute(Select(By::<Option<Session>, _>::new(id)))
            .await
            .unwrap();
        let token = stored.unwrap().settlement.unwrap().access_token;
        assert_eq!(AsRef::<str>::as_ref(&token), "first");
    }

    #[tokio::test]
    async fn missing_session_cannot_be_settled() {
        let db = Memory::default();

        let settled = db
            .execute(Update(Settle {
                session_id: session::Id::new(),
                settlement: settlement("any"),
            }))
            .await
            .unwrap();

        assert!(!settled);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_settles_apply_exactly_once() {
        let db = Memory::default();
        let id = session::Id::new();
        db.execute(Insert(session(id))).await.unwrap();

        let (db1, db2) = (db.clone(), db.clone());
        let (a, b) = tokio::join!(
            db1.execute(Update(Settle {
                session_id: id,
                settlement: settlement("a"),
            })),
            db2.execute(Update(Settle {
                session_id: id,
                settlement: settlement("b"),
            })),
        );

        assert!(a.unwrap() ^ b.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let db = Memory::default();
        let id = session::Id::new();

        db.execute(Insert(session(id))).await.unwrap();
        assert!(db.execute(Insert(session(id))).await.is_err());
    }
}
