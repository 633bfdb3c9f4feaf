//! [`Session`] definitions.

use std::sync::LazyLock;

use common::{unit, Chain, DateTimeOf, Lamports};
#[cfg(doc)]
use common::DateTime;
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Tracked payment obligation.
///
/// A [`Session`] is created unpaid with a fixed required amount and receiver,
/// and settles at most once, when a qualifying ledger transfer is verified.
#[derive(Clone, Debug)]
pub struct Session {
    /// ID of this [`Session`].
    pub id: Id,

    /// [`Product`] this [`Session`] is purchasing access to.
    pub product: Product,

    /// [`Chain`] the payment for this [`Session`] is expected on.
    pub chain: Chain,

    /// Client-supplied [`Wallet`], informational only.
    ///
    /// Never used for verification: only the server-held [`Receiver`] is
    /// authoritative.
    pub wallet: Option<Wallet>,

    /// Amount required to settle this [`Session`], fixed at creation.
    pub amount_required: Lamports,

    /// Address expected to receive the payment, fixed at creation from
    /// configuration.
    pub receiver: Receiver,

    /// [`DateTime`] when this [`Session`] was created.
    pub created_at: CreationDateTime,

    /// [`Settlement`] of this [`Session`], if it has been paid.
    pub settlement: Option<Settlement>,
}

impl Session {
    /// Indicates whether this [`Session`] has been paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.settlement.is_some()
    }
}

/// Settlement of a [`Session`].
///
/// Binds the verified ledger [`Signature`] and the issued access [`Token`]
/// to the moment the [`Session`] became paid. Set exactly once, never
/// reverted.
#[derive(Clone, Debug)]
pub struct Settlement {
    /// [`Signature`] of the ledger transaction satisfying the [`Session`].
    pub signature: Signature,

    /// [`DateTime`] when the [`Session`] was paid.
    pub paid_at: PaymentDateTime,

    /// Access [`Token`] issued for the paid [`Session`].
    pub access_token: Token,
}

/// Application of a [`Settlement`] to a still-unpaid [`Session`].
#[derive(Clone, Debug)]
pub struct Settle {
    /// ID of the [`Session`] to settle.
    pub session_id: Id,

    /// [`Settlement`] to apply.
    pub settlement: Settlement,
}

/// ID of a [`Session`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Product a [`Session`] purchases access to.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Product(String);

impl Product {
    /// Creates a new [`Product`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Product`].
    fn check(name: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Product`] invariants:
        /// - Must start with an alphanumeric character;
        /// - Must contain alphanumeric, `.`, `_` and `-` characters only;
        /// - Must be between 1 and 64 characters long.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$")
                .expect("valid regex")
        });

        REGEX.is_match(name.as_ref())
    }
}

impl FromStr for Product {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Product`")
    }
}

impl<'de> Deserialize<'de> for Product {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Self::new(name).ok_or_else(|| de::Error::custom("invalid `Product`"))
    }
}

/// Client-supplied wallet identifier.
///
/// Carried for operational visibility only and never trusted for
/// authorization.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Wallet(String);

impl Wallet {
    /// Creates a new [`Wallet`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Wallet`].
    fn check(address: impl AsRef<str>) -> bool {
        let address = address.as_ref();
        !address.is_empty()
            && address.len() <= 128
            && !address.chars().any(char::is_whitespace)
    }
}

impl FromStr for Wallet {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Wallet`")
    }
}

/// Ledger address expected to receive a [`Session`] payment.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Receiver(String);

impl Receiver {
    /// Creates a new [`Receiver`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Receiver`].
    fn check(address: impl AsRef<str>) -> bool {
        /// Regular expression checking the Base58 address format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("valid regex")
        });

        REGEX.is_match(address.as_ref())
    }
}

impl FromStr for Receiver {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Receiver`")
    }
}

/// Reference of a finalized transfer on the ledger.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Signature(String);

impl Signature {
    /// Creates a new [`Signature`] if the given `signature` is valid.
    #[must_use]
    pub fn new(signature: impl Into<String>) -> Option<Self> {
        let signature = signature.into();
        Self::check(&signature).then_some(Self(signature))
    }

    /// Checks whether the given `signature` is a valid [`Signature`].
    fn check(signature: impl AsRef<str>) -> bool {
        /// Regular expression checking the Base58 signature format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{64,88}$").expect("valid regex")
        });

        REGEX.is_match(signature.as_ref())
    }
}

impl FromStr for Signature {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Signature`")
    }
}

/// Access token of a paid [`Session`].
#[derive(AsRef, Clone, Debug, Display, Eq, FromStr, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Token(String);

impl Token {
    /// Creates a new [`Token`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The provided `token` must be a valid [`Token`] representation.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(token: String) -> Self {
        Self(token)
    }
}

/// Claims encoded into an access [`Token`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
    /// ID of the [`Session`] the [`Token`] is bound to.
    #[serde(rename = "sid")]
    pub session_id: Id,

    /// [`Product`] the [`Token`] grants access to.
    pub product: Product,

    /// [`DateTime`] when the [`Token`] expires.
    #[serde(rename = "exp", with = "common::datetime::serde::unix_timestamp")]
    pub expires_at: ExpirationDateTime,
}

/// [`DateTime`] when a [`Session`] was created.
pub type CreationDateTime = DateTimeOf<(Session, unit::Creation)>;

/// [`DateTime`] when a [`Session`] was paid.
pub type PaymentDateTime = DateTimeOf<(Session, unit::Payment)>;

/// [`DateTime`] when an access [`Token`] expires.
pub type ExpirationDateTime = DateTimeOf<(Claims, unit::Expiration)>;

#[cfg(test)]
mod spec {
    use super::{Product, Receiver, Signature, Wallet};

    #[test]
    fn product_checks_format() {
        assert!(Product::new("tradegpt").is_some());
        assert!(Product::new("trade-gpt.v2").is_some());

        assert!(Product::new("").is_none());
        assert!(Product::new(" tradegpt").is_none());
        assert!(Product::new("a".repeat(65)).is_none());
    }

    #[test]
    fn receiver_checks_base58() {
        assert!(
            Receiver::new("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin")
                .is_some(),
        );

        assert!(Receiver::new("").is_none());
        // `0`, `O`, `I` and `l` are not Base58 characters.
        assert!(
            Receiver::new("0xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin")
                .is_none(),
        );
        assert!(Receiver::new("tooshort").is_none());
    }

    #[test]
    fn signature_checks_base58() {
        assert!(Signature::new("A".repeat(64)).is_some());
        assert!(Signature::new("A".repeat(88)).is_some());

        assert!(Signature::new("A".repeat(63)).is_none());
        assert!(Signature::new("A".repeat(89)).is_none());
        assert!(Signature::new(format!("{}O", "A".repeat(63))).is_none());
    }

    #[test]
    fn wallet_is_loosely_checked() {
        assert!(Wallet::new("anything-goes-here").is_some());

        assert!(Wallet::new("").is_none());
        assert!(Wallet::new("with whitespace").is_none());
    }
}
