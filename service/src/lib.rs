//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;

use std::time::Duration;

use common::Lamports;
use derive_more::Debug;

use crate::domain::session::{Product, Receiver};
#[cfg(doc)]
use crate::{domain::Session, infra::Database};

pub use self::command::Command;

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] encoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_encoding_key: jsonwebtoken::EncodingKey,

    /// [JWT] decoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// [`Duration`] an issued access token remains valid for.
    pub token_ttl: Duration,

    /// Default [`Product`] a [`Session`] is created for.
    pub product: Product,

    /// Price of a [`Session`], fixed at its creation.
    pub price: Lamports,

    /// Address expected to receive [`Session`] payments.
    pub receiver: Receiver,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Lg, Ai> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Ledger`] of this [`Service`].
    ///
    /// [`Ledger`]: infra::Ledger
    ledger: Lg,

    /// [`Assistant`] of this [`Service`].
    ///
    /// [`Assistant`]: infra::Assistant
    assistant: Ai,
}

impl<Db, Lg, Ai> Service<Db, Lg, Ai> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(config: Config, database: Db, ledger: Lg, assistant: Ai) -> Self {
        Self {
            config,
            database,
            ledger,
            assistant,
        }
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns the ledger of this [`Service`].
    #[must_use]
    pub fn ledger(&self) -> &Lg {
        &self.ledger
    }

    /// Returns the assistant of this [`Service`].
    #[must_use]
    pub fn assistant(&self) -> &Ai {
        &self.assistant
    }
}
