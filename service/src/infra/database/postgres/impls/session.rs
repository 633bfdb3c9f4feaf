//! [`Session`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{
        session::{self, PaymentDateTime, Settle, Settlement, Signature, Token},
        Session,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Insert<Session>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        let Session {
            id,
            product,
            chain,
            wallet,
            amount_required,
            receiver,
            created_at,
            settlement,
        } = session;

        // Freshly created `Session`s are always unpaid.
        debug_assert!(settlement.is_none(), "inserted `Session` must be unpaid");

        const SQL: &str = "\
            INSERT INTO sessions (\
                id, product, chain, wallet, \
                amount_required, receiver, \
                created_at, paid\
            ) \
            VALUES (\
                $1::UUID, \
                $2::VARCHAR, $3::INT2, $4::VARCHAR, \
                $5::INT8, $6::VARCHAR, \
                $7::TIMESTAMPTZ, FALSE\
            )";
        self.exec(
            SQL,
            &[
                &id,
                &product,
                &chain,
                &wallet,
                &amount_required,
                &receiver,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Option<Session>, session::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: session::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, product, chain, wallet, \
                   amount_required, receiver, created_at, \
                   signature, paid_at, access_token \
            FROM sessions \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| {
                let settlement = row
                    .get::<_, Option<Signature>>("signature")
                    .zip(row.get::<_, Option<PaymentDateTime>>("paid_at"))
                    .zip(row.get::<_, Option<Token>>("access_token"))
                    .map(|((signature, paid_at), access_token)| Settlement {
                        signature,
                        paid_at,
                        access_token,
                    });

                Session {
                    id: row.get("id"),
                    product: row.get("product"),
                    chain: row.get("chain"),
                    wallet: row.get("wallet"),
                    amount_required: row.get("amount_required"),
                    receiver: row.get("receiver"),
                    created_at: row.get("created_at"),
                    settlement,
                }
            }))
    }
}

impl<C> Database<Update<Settle>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(settle): Update<Settle>,
    ) -> Result<Self::Ok, Self::Err> {
        let Settle {
            session_id,
            settlement:
                Settlement {
                    signature,
                    paid_at,
                    access_token,
                },
        } = settle;

        // A single conditional update keyed on the unpaid state keeps the
        // settlement at-most-once under concurrent verification attempts.
        const SQL: &str = "\
            UPDATE sessions \
            SET paid = TRUE, \
                signature = $2::VARCHAR, \
                paid_at = $3::TIMESTAMPTZ, \
                access_token = $4::VARCHAR \
            WHERE id = $1::UUID \
              AND paid = FALSE";
        self.exec(SQL, &[&session_id, &signature, &paid_at, &access_token])
            .await
            .map_err(tracerr::wrap!())
            .map(|affected| affected == 1)
    }
}
