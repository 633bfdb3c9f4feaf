//! [`Command`] for verifying a [`Session`] payment and settling it.

use common::{
    operations::{By, Select, Update, Verify},
    DateTime, Lamports,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        session::{self, Claims, Settle, Settlement, Signature, Token},
        Session,
    },
    infra::{
        database,
        ledger::{self, Denial, Payment, Verdict},
        Database, Ledger,
    },
    Service,
};

use super::Command;

/// [`Command`] for verifying a [`Session`] payment and settling it.
///
/// Replaying it for an already paid [`Session`] returns the originally
/// issued [`Token`] without querying the ledger again.
#[derive(Clone, Debug)]
pub struct VerifyPayment {
    /// ID of the [`Session`] to settle.
    pub session_id: session::Id,

    /// [`Signature`] of the ledger transaction claimed to pay for the
    /// [`Session`].
    pub signature: Signature,
}

/// Output of [`VerifyPayment`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Access [`Token`] of the settled [`Session`].
    pub access_token: Token,

    /// Amount received by the transaction settling the [`Session`].
    ///
    /// [`None`] if the [`Session`] had been settled before this
    /// [`VerifyPayment`] execution.
    pub amount_received: Option<Lamports>,

    /// Indicates whether the [`Session`] had been settled already.
    pub already_paid: bool,
}

impl<Db, Lg, Ai> Command<VerifyPayment> for Service<Db, Lg, Ai>
where
    Db: Database<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + Database<Update<Settle>, Ok = bool, Err = Traced<database::Error>>,
    Lg: Ledger<Verify<Payment>, Ok = Verdict, Err = Traced<ledger::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: VerifyPayment) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let VerifyPayment {
            session_id,
            signature,
        } = cmd;

        let session = self
            .database()
            .execute(Select(By::<Option<Session>, _>::new(session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::SessionNotExists(session_id))
            .map_err(tracerr::wrap!())?;

        if let Some(settlement) = session.settlement {
            return Ok(Output {
                access_token: settlement.access_token,
                amount_received: None,
                already_paid: true,
            });
        }

        // TODO: Track redeemed signatures globally, so that a single ledger
        //       transfer cannot settle two different sessions.
        let verdict = self
            .ledger()
            .execute(Verify(Payment {
                signature: signature.clone(),
                receiver: session.receiver.clone(),
                min_amount: session.amount_required,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let amount_received = match verdict {
            Verdict::Confirmed { received } => received,
            Verdict::Rejected(denial) => {
                return Err(tracerr::new!(E::Denied(denial)));
            }
        };

        let expires_at = (DateTime::now() + self.config().token_ttl).coerce();
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Claims {
                session_id,
                product: session.product.clone(),
                expires_at,
            },
            &self.config().jwt_encoding_key,
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        // SAFETY: `jsonwebtoken::encode` always returns a valid
        //         `session::Token`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        let token = unsafe { Token::new_unchecked(token) };

        let settled = self
            .database()
            .execute(Update(Settle {
                session_id,
                settlement: Settlement {
                    signature: signature.clone(),
                    paid_at: DateTime::now().coerce(),
                    access_token: token.clone(),
                },
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if !settled {
            // Lost the settlement race: return the winner's persisted token.
            let winner = self
                .database()
                .execute(Select(By::<Option<Session>, _>::new(session_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .and_then(|s| s.settlement)
                .ok_or_else(|| E::SettlementConflict(session_id))
                .map_err(tracerr::wrap!())?;

            return Ok(Output {
                access_token: winner.access_token,
                amount_received: None,
                already_paid: true,
            });
        }

        log::info!(
            session_id = %session_id,
            amount = %amount_received,
            "session settled",
        );

        Ok(Output {
            access_token: token,
            amount_received: Some(amount_received),
            already_paid: false,
        })
    }
}

/// Error of [`VerifyPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Verification rejected the transaction.
    #[display("Payment verification denied: {_0}")]
    #[from(ignore)]
    Denied(#[error(not(source))] Denial),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// [`Ledger`] read failed, so no verdict was reached.
    ///
    /// This is a transient infrastructure failure: the attempt may be
    /// retried without consuming anything.
    #[display("`Ledger` operation failed: {_0}")]
    Ledger(ledger::Error),

    /// [`Session`] with the provided ID does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    #[from(ignore)]
    SessionNotExists(#[error(not(source))] session::Id),

    /// Conditional settlement lost the race, yet no winning [`Settlement`]
    /// was found on re-read.
    #[display("`Session(id: {_0})` lost settlement without a winner")]
    #[from(ignore)]
    SettlementConflict(#[error(not(source))] session::Id),
}

#[cfg(test)]
mod spec {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use common::{
        operations::{Insert, Verify},
        Chain, DateTime, Handler, Lamports,
    };
    use tracerr::Traced;

    use crate::{
        command::{Command as _, VerifyPayment},
        domain::{
            session::{self, Product, Receiver, Signature},
            Session,
        },
        infra::{
            ledger::{self, Denial, Payment, Verdict},
            Memory,
        },
        Config, Service,
    };

    /// [`Ledger`] stub returning a predefined [`Verdict`] and counting its
    /// invocations.
    ///
    /// [`Ledger`]: crate::infra::Ledger
    #[derive(Clone, Debug)]
    struct StubLedger {
        verdict: Option<Verdict>,
        calls: Arc<AtomicUsize>,
    }

    impl StubLedger {
        fn new(verdict: Option<Verdict>) -> Self {
            Self {
                verdict,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Handler<Verify<Payment>> for StubLedger {
        type Ok = Verdict;
        type Err = Traced<ledger::Error>;

        async fn execute(
            &self,
            _: Verify<Payment>,
        ) -> Result<Self::Ok, Self::Err> {
            _ = self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone().ok_or_else(|| {
                tracerr::new!(ledger::Error::Rpc {
                    code: -32005,
                    message: "node is unhealthy".into(),
                })
            })
        }
    }

    fn config() -> Config {
        Config {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                b"secret",
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                b"secret",
            ),
            token_ttl: Duration::from_secs(2 * 60 * 60),
            product: Product::new("tradegpt").unwrap(),
            price: Lamports::from(10_000_000),
            receiver: Receiver::new("1".repeat(32)).unwrap(),
        }
    }

    fn unpaid_session(id: session::Id, config: &Config) -> Session {
        Session {
            id,
            product: config.product.clone(),
            chain: Chain::Solana,
            wallet: None,
            amount_required: config.price,
            receiver: config.receiver.clone(),
            created_at: DateTime::now().coerce(),
            settlement: None,
        }
    }

    fn signature() -> Signature {
        Signature::new("A".repeat(64)).unwrap()
    }

    async fn service_with_session(
        verdict: Option<Verdict>,
    ) -> (Service<Memory, StubLedger, ()>, session::Id) {
        let config = config();
        let database = Memory::default();
        let id = session::Id::new();
        database
            .execute(Insert(unpaid_session(id, &config)))
            .await
            .unwrap();

        (
            Service::new(config, database, StubLedger::new(verdict), ()),
            id,
        )
    }

    #[tokio::test]
    async fn settles_on_confirmed_verdict() {
        let (service, id) = service_with_session(Some(Verdict::Confirmed {
            received: Lamports::from(10_000_000),
        }))
        .await;

        let out = service
            .execute(VerifyPayment {
                session_id: id,
                signature: signature(),
            })
            .await
            .unwrap();

        assert!(!out.already_paid);
        assert_eq!(out.amount_received, Some(Lamports::from(10_000_000)));
    }

    #[tokio::test]
    async fn replay_returns_original_token_without_ledger_query() {
        let (service, id) = service_with_session(Some(Verdict::Confirmed {
            received: Lamports::from(10_000_000),
        }))
        .await;

        let cmd = VerifyPayment {
            session_id: id,
            signature: signature(),
        };
        let first = service.execute(cmd.clone()).await.unwrap();
        let second = service.execute(cmd).await.unwrap();

        assert!(second.already_paid);
        assert_eq!(second.access_token, first.access_token);
        assert_eq!(service.ledger().calls(), 1);
    }

    #[tokio::test]
    async fn insufficient_amount_keeps_session_retryable() {
        let (service, id) = service_with_session(Some(Verdict::Rejected(
            Denial::InsufficientAmount {
                received: Lamports::from(5_000_000),
            },
        )))
        .await;

        let err = service
            .execute(VerifyPayment {
                session_id: id,
                signature: signature(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            super::ExecutionError::Denied(Denial::InsufficientAmount {
                received,
            }) if *received == Lamports::from(5_000_000),
        ));

        // A later qualifying signature still settles the session.
        let service = Service::new(
            service.config().clone(),
            service.database().clone(),
            StubLedger::new(Some(Verdict::Confirmed {
                received: Lamports::from(10_000_000),
            })),
            (),
        );
        let out = service
            .execute(VerifyPayment {
                session_id: id,
                signature: Signature::new("B".repeat(64)).unwrap(),
            })
            .await
            .unwrap();
        assert!(!out.already_paid);
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let (service, _) = service_with_session(None).await;

        let err = service
            .execute(VerifyPayment {
                session_id: session::Id::new(),
                signature: signature(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            super::ExecutionError::SessionNotExists(_),
        ));
        assert_eq!(service.ledger().calls(), 0);
    }

    #[tokio::test]
    async fn transient_ledger_failure_is_distinguished() {
        let (service, id) = service_with_session(None).await;

        let err = service
            .execute(VerifyPayment {
                session_id: id,
                signature: signature(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            super::ExecutionError::Ledger(_),
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_settlement_issues_single_token() {
        let (service, id) = service_with_session(Some(Verdict::Confirmed {
            received: Lamports::from(10_000_000),
        }))
        .await;

        let cmd = VerifyPayment {
            session_id: id,
            signature: signature(),
        };
        let (s1, s2) = (service.clone(), service.clone());
        let (a, b) = tokio::join!(s1.execute(cmd.clone()), s2.execute(cmd));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.access_token, b.access_token);
        assert!(!(a.already_paid && b.already_paid));
    }
}
