//! Native-currency amounts.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, str::FromStr};

use derive_more::{From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use rust_decimal::{
    prelude::ToPrimitive as _, Decimal, RoundingStrategy,
};

/// Number of [`Lamports`] in one [`Sol`].
const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Amount in the major unit of the native currency.
#[derive(Clone, Copy, Debug, Eq, From, Into, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(transparent)
)]
pub struct Sol(Decimal);

impl Sol {
    /// Converts this [`Sol`] amount into [`Lamports`], rounding halves away
    /// from zero.
    ///
    /// [`None`] is returned if the amount is negative or too large to be
    /// expressed in [`Lamports`].
    #[must_use]
    pub fn to_lamports(self) -> Option<Lamports> {
        (self.0 * Decimal::from(LAMPORTS_PER_SOL))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u64()
            .map(Lamports)
    }
}

impl fmt::Display for Sol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Sol {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Self).map_err(|_| "invalid amount")
    }
}

/// Amount in the smallest unit of the native currency.
#[derive(
    Clone, Copy, Debug, Eq, From, Hash, Into, Ord, PartialEq, PartialOrd,
)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(transparent)
)]
pub struct Lamports(u64);

impl Lamports {
    /// Converts this [`Lamports`] amount into the major [`Sol`] unit.
    #[must_use]
    pub fn to_sol(self) -> Sol {
        Sol(Decimal::from(self.0) / Decimal::from(LAMPORTS_PER_SOL))
    }
}

impl fmt::Display for Lamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl FromSql<'_> for Lamports {
    accepts!(INT8);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        u64::try_from(i64::from_sql(ty, raw)?)
            .map(Self)
            .map_err(Box::from)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Lamports {
    accepts!(INT8);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        i64::try_from(self.0)?.to_sql(ty, w)
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use super::{Lamports, Sol};

    #[test]
    fn from_str() {
        assert_eq!(
            Sol::from_str("0.01").unwrap().to_lamports(),
            Some(Lamports::from(10_000_000)),
        );
        assert_eq!(
            Sol::from_str("1").unwrap().to_lamports(),
            Some(Lamports::from(1_000_000_000)),
        );

        assert!(Sol::from_str("").is_err());
        assert!(Sol::from_str("one").is_err());
    }

    #[test]
    fn to_lamports_rounds_halves_away_from_zero() {
        assert_eq!(
            Sol::from_str("0.0000000025").unwrap().to_lamports(),
            Some(Lamports::from(3)),
        );
        assert_eq!(
            Sol::from_str("0.0000000024").unwrap().to_lamports(),
            Some(Lamports::from(2)),
        );
    }

    #[test]
    fn to_lamports_rejects_negative() {
        assert_eq!(Sol::from_str("-0.01").unwrap().to_lamports(), None);
    }

    #[test]
    fn to_sol() {
        assert_eq!(
            Lamports::from(10_000_000).to_sol(),
            Sol::from_str("0.01").unwrap(),
        );
        assert_eq!(
            Lamports::from(10_000_000).to_sol().to_string(),
            "0.01",
        );
    }
}
