//! [`Command`] for creating a [`Session`].

use common::{operations::Insert, Chain, DateTime};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        session::{self, Product, Wallet},
        Session,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a [`Session`].
///
/// The required amount and the receiver address are fixed from the
/// [`Service`] configuration, never from the request.
#[derive(Clone, Debug)]
pub struct CreateSession {
    /// [`Product`] to create a [`Session`] for.
    ///
    /// Defaults to the configured [`Product`] if not provided.
    pub product: Option<Product>,

    /// [`Chain`] the payment is expected on.
    ///
    /// Defaults to [`Chain::Solana`] if not provided.
    pub chain: Option<Chain>,

    /// Client-supplied [`Wallet`], informational only.
    pub wallet: Option<Wallet>,
}

impl<Db, Lg, Ai> Command<CreateSession> for Service<Db, Lg, Ai>
where
    Db: Database<Insert<Session>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateSession) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateSession {
            product,
            chain,
            wallet,
        } = cmd;

        let session = Session {
            id: session::Id::new(),
            product: product.unwrap_or_else(|| self.config().product.clone()),
            chain: chain.unwrap_or(Chain::Solana),
            wallet,
            amount_required: self.config().price,
            receiver: self.config().receiver.clone(),
            created_at: DateTime::now().coerce(),
            settlement: None,
        };

        self.database()
            .execute(Insert(session.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(session)
    }
}

/// Error of [`CreateSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Select},
        Lamports,
    };

    use crate::{
        command::{Command as _, CreateSession},
        domain::{
            session::{self, Product, Receiver, Wallet},
            Session,
        },
        infra::{Database as _, Memory},
        Config, Service,
    };

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

    #[tokio::test]
    async fn fixes_amount_and_receiver_from_config() {
        let service = Service::new(config(), Memory::default(), (), ());

        let session = service
            .execute(CreateSession {
                product: None,
                chain: None,
                wallet: None,
            })
            .await
            .unwrap();

        assert_eq!(session.amount_required, Lamports::from(10_000_000));
        assert_eq!(session.receiver, Receiver::new("1".repeat(32)).unwrap());
        assert_eq!(session.product, Product::new("tradegpt").unwrap());
        assert!(!session.is_paid());
    }

    #[tokio::test]
    async fn persists_created_session() {
        let service = Service::new(config(), Memory::default(), (), ());

        let session = service
            .execute(CreateSession {
                product: Some(Product::new("custom").unwrap()),
                chain: None,
                wallet: Some(Wallet::new("some-wallet").unwrap()),
            })
            .await
            .unwrap();

        let stored: Option<Session> = service
            .database()
            .execute(Select(By::<Option<Session>, session::Id>::new(
                session.id,
            )))
            .await
            .unwrap();
        let stored = stored.unwrap();

        assert_eq!(stored.product, Product::new("custom").unwrap());
        assert_eq!(stored.wallet, Some(Wallet::new("some-wallet").unwrap()));
        assert!(!stored.is_paid());
    }
}
