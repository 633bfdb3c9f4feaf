//! [`Command`] for authorizing access to a paid [`Session`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{
        session::{self, Claims, Token},
        Session,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for authorizing access to a paid [`Session`].
///
/// Decodes the provided access [`Token`], resolves the bound [`Session`] and
/// requires it to be paid.
#[derive(Clone, Debug, From)]
pub struct AuthorizeSession {
    /// Access [`Token`] to authorize with.
    pub token: Token,
}

impl<Db, Lg, Ai> Command<AuthorizeSession> for Service<Db, Lg, Ai>
where
    Db: Database<
        Select<By<Option<Session>, session::Id>>,
        Ok = Option<Session>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Claims;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeSession { token } = cmd;

        let claims = jsonwebtoken::decode::<Claims>(
            token.as_ref(),
            &self.config().jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        let session = self
            .database()
            .execute(Select(By::<Option<Session>, _>::new(claims.session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::SessionNotExists(claims.session_id))
            .map_err(tracerr::wrap!())?;

        if !session.is_paid() {
            return Err(tracerr::new!(E::NotPaid(claims.session_id)));
        }

        Ok(claims)
    }
}

/// Error of [`AuthorizeSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`Session`] the [`Token`] is bound to has not been paid.
    #[display("`Session(id: {_0})` is not paid")]
    #[from(ignore)]
    NotPaid(#[error(not(source))] session::Id),

    /// [`Session`] the [`Token`] is bound to does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    #[from(ignore)]
    SessionNotExists(#[error(not(source))] session::Id),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{Insert, Verify},
        Chain, DateTime, Handler, Lamports,
    };

    use crate::{
        command::{AuthorizeSession, Command as _, VerifyPayment},
        domain::{
            session::{self, Claims, Product, Receiver, Signature, Token},
            Session,
        },
        infra::{
            ledger::{Payment, Verdict},
            Memory,
        },
        Config, Service,
    };

    /// [`Ledger`] approving any payment.
    ///
    /// [`Ledger`]: crate::infra::Ledger
    #[derive(Clone, Copy, Debug)]
    struct Approve;

    impl Handler<Verify<Payment>> for Approve {
        type Ok = Verdict;
        type Err = tracerr::Traced<crate::infra::ledger::Error>;

        async fn execute(
            &self,
            Verify(payment): Verify<Payment>,
        ) -> Result<Self::Ok, Self::Err> {
            Ok(Verdict::Confirmed {
                received: payment.min_amount,
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

    async fn paid_session(
        service: &Service<Memory, Approve, ()>,
    ) -> (session::Id, Token) {
        let id = session::Id::new();
        service
            .database()
            .execute(Insert(Session {
                id,
                product: service.config().product.clone(),
                chain: Chain::Solana,
                wallet: None,
                amount_required: service.config().price,
                receiver: service.config().receiver.clone(),
                created_at: DateTime::now().coerce(),
                settlement: None,
            }))
            .await
            .unwrap();

        let out = service
            .execute(VerifyPayment {
                session_id: id,
                signature: Signature::new("A".repeat(64)).unwrap(),
            })
            .await
            .unwrap();

        (id, out.access_token)
    }

    #[tokio::test]
    async fn authorizes_paid_session() {
        let service = Service::new(config(), Memory::default(), Approve, ());
        let (id, token) = paid_session(&service).await;

        let claims = service
            .execute(AuthorizeSession { token })
            .await
            .unwrap();

        assert_eq!(claims.session_id, id);
        assert_eq!(claims.product, Product::new("tradegpt").unwrap());
    }

    #[tokio::test]
    async fn rejects_unpaid_session() {
        let service = Service::new(config(), Memory::default(), Approve, ());
        let id = session::Id::new();
        service
            .database()
            .execute(Insert(Session {
                id,
                product: service.config().product.clone(),
                chain: Chain::Solana,
                wallet: None,
                amount_required: service.config().price,
                receiver: service.config().receiver.clone(),
                created_at: DateTime::now().coerce(),
                settlement: None,
            }))
            .await
            .unwrap();

        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Claims {
                session_id: id,
                product: service.config().product.clone(),
                expires_at: (DateTime::now()
                    + Duration::from_secs(60 * 60))
                .coerce(),
            },
            &service.config().jwt_encoding_key,
        )
        .unwrap();
        #[expect(unsafe_code, reason = "valid encoded token")]
        let token = unsafe { Token::new_unchecked(token) };

        let err = service
            .execute(AuthorizeSession { token })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), super::ExecutionError::NotPaid(_)));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let service = Service::new(config(), Memory::default(), Approve, ());
        let (id, _) = paid_session(&service).await;

        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Claims {
                session_id: id,
                product: service.config().product.clone(),
                expires_at: (DateTime::now()
                    - Duration::from_secs(60 * 60))
                .coerce(),
            },
            &service.config().jwt_encoding_key,
        )
        .unwrap();
        #[expect(unsafe_code, reason = "valid encoded token")]
        let token = unsafe { Token::new_unchecked(token) };

        let err = service
            .execute(AuthorizeSession { token })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            super::ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }

    #[tokio::test]
    async fn rejects_token_signed_with_other_key() {
        let service = Service::new(config(), Memory::default(), Approve, ());
        let (id, _) = paid_session(&service).await;

        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Claims {
                session_id: id,
                product: service.config().product.clone(),
                expires_at: (DateTime::now()
                    + Duration::from_secs(60 * 60))
                .coerce(),
            },
            &jsonwebtoken::EncodingKey::from_secret(b"other"),
        )
        .unwrap();
        #[expect(unsafe_code, reason = "valid encoded token")]
        let token = unsafe { Token::new_unchecked(token) };

        let err = service
            .execute(AuthorizeSession { token })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            super::ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }

    #[tokio::test]
    async fn token_stays_bound_to_its_session() {
        let service = Service::new(config(), Memory::default(), Approve, ());
        let (id_a, token_a) = paid_session(&service).await;
        let (id_b, _) = paid_session(&service).await;

        let claims = service
            .execute(AuthorizeSession { token: token_a })
            .await
            .unwrap();

        assert_eq!(claims.session_id, id_a);
        assert_ne!(claims.session_id, id_b);
    }
}
