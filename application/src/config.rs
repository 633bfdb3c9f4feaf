//! [`Config`]-related definitions.

use std::{str::FromStr as _, time};

use common::Sol;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use derive_more::{Display, Error as StdError};
use secrecy::SecretString;
use serde::Deserialize;
use service::{
    domain::session::{Product, Receiver},
    infra::{assistant::openai, ledger::solana},
};
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Ledger configuration.
    pub ledger: Ledger,

    /// Assistant configuration.
    pub assistant: Assistant,

    /// Postgres configuration.
    ///
    /// Absence of this section selects the in-memory session store.
    pub postgres: Option<Postgres>,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// [JWT] secret signing issued access tokens.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    #[default("dev_secret_change_me".to_owned())]
    pub jwt_secret: String,

    /// Time-to-live of issued access tokens.
    #[default(time::Duration::from_secs(2 * 60 * 60))]
    #[serde(with = "humantime_serde")]
    pub token_ttl: time::Duration,

    /// Default product a session is created for.
    #[default("tradegpt".to_owned())]
    pub product: String,

    /// Price of a session, in SOL.
    ///
    /// Converted to lamports once at startup.
    #[default(Sol::from_str("0.01").expect("valid amount"))]
    pub price: Sol,

    /// Address expected to receive session payments.
    ///
    /// Must be set to a valid ledger address for the application to start.
    pub receiver: String,
}

impl TryFrom<Service> for service::Config {
    type Error = InvalidConfigError;

    fn try_from(value: Service) -> Result<Self, Self::Error> {
        use InvalidConfigError as E;

        let Service {
            jwt_secret,
            token_ttl,
            product,
            price,
            receiver,
        } = value;

        Ok(Self {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            token_ttl,
            product: Product::new(product).ok_or(E::Product)?,
            price: price.to_lamports().ok_or(E::Price)?,
            receiver: Receiver::new(receiver).ok_or(E::Receiver)?,
        })
    }
}

/// Error of converting a [`Service`] configuration into a
/// [`service::Config`].
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum InvalidConfigError {
    /// `service.product` is not a valid product identifier.
    #[display("`service.product` is not a valid product identifier")]
    Product,

    /// `service.price` is not expressible in lamports.
    #[display("`service.price` is not expressible in lamports")]
    Price,

    /// `service.receiver` is not a valid ledger address.
    #[display("`service.receiver` is not a valid ledger address")]
    Receiver,
}

/// Ledger configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Ledger {
    /// URL of the ledger JSON-RPC endpoint.
    #[default("https://api.mainnet-beta.solana.com".to_owned())]
    pub rpc_url: String,

    /// Timeout of a single RPC request.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

impl From<Ledger> for solana::Config {
    fn from(value: Ledger) -> Self {
        let Ledger { rpc_url, timeout } = value;
        Self { rpc_url, timeout }
    }
}

/// Assistant configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Assistant {
    /// URL of the chat completions endpoint.
    #[default("https://api.openai.com/v1/chat/completions".to_owned())]
    pub url: String,

    /// API key to authenticate with.
    pub api_key: String,

    /// Model generating the answers.
    #[default("gpt-4o-mini".to_owned())]
    pub model: String,

    /// Sampling temperature of the model.
    #[default(0.2)]
    pub temperature: f32,

    /// System prompt shaping the answers.
    #[default(
        "You are TradeGPT, a concise trading tutor. Use clear bullet points \
         and examples. Never mention internal policies."
            .to_owned()
    )]
    pub system_prompt: String,

    /// Timeout of a single API request.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

impl From<Assistant> for openai::Config {
    fn from(value: Assistant) -> Self {
        let Assistant {
            url,
            api_key,
            model,
            temperature,
            system_prompt,
            timeout,
        } = value;

        Self {
            url,
            api_key: SecretString::from(api_key),
            model,
            temperature,
            system_prompt,
            timeout,
        }
    }
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
