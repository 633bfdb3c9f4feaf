//! [`Ledger`]-related implementations.

pub mod solana;

use common::Lamports;
use derive_more::{Display, Error as StdError, From};

use crate::domain::session::{Receiver, Signature};

pub use self::solana::SolanaRpc;

/// Ledger operation.
pub use common::Handler as Ledger;

/// Payment expected to be found on the ledger.
#[derive(Clone, Debug)]
pub struct Payment {
    /// [`Signature`] of the transaction claimed to carry the payment.
    pub signature: Signature,

    /// Address expected to receive the payment.
    ///
    /// Always the server-held [`Receiver`], never a client-supplied address.
    pub receiver: Receiver,

    /// Minimum amount the [`Receiver`] must have received.
    pub min_amount: Lamports,
}

/// Verdict of a [`Payment`] verification.
///
/// A [`Verdict`] is always reached from the fetched transaction itself:
/// failures to reach the ledger are [`Error`]s instead, so that callers can
/// retry them without treating the attempt as a failed payment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Transaction qualifies as the expected [`Payment`].
    Confirmed {
        /// Amount actually received by the expected receiver.
        received: Lamports,
    },

    /// Transaction does not qualify as the expected [`Payment`].
    Rejected(Denial),
}

/// Reason of a [`Payment`] verification rejection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Denial {
    /// Transaction is not found on the ledger.
    ///
    /// Covers both invalid signatures and transfers not confirmed yet, so
    /// the caller may retry later.
    TxNotFound,

    /// Transaction exists, but its execution failed on-chain, so it cannot
    /// have moved any funds.
    TxFailed,

    /// Expected receiver is not among the transaction participants.
    ReceiverNotInTx,

    /// Receiver's balance delta is below the required minimum.
    InsufficientAmount {
        /// Amount actually received by the expected receiver.
        received: Lamports,
    },
}

impl Denial {
    /// Returns the stable identifier of this [`Denial`].
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::TxNotFound => "TxNotFound",
            Self::TxFailed => "TxFailed",
            Self::ReceiverNotInTx => "ReceiverNotInTx",
            Self::InsufficientAmount { .. } => "InsufficientAmount",
        }
    }

    /// Returns the amount received by the expected receiver, if this
    /// [`Denial`] reports one.
    #[must_use]
    pub const fn received(&self) -> Option<Lamports> {
        match self {
            Self::InsufficientAmount { received } => Some(*received),
            Self::TxNotFound | Self::TxFailed | Self::ReceiverNotInTx => None,
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientAmount { received } => {
                write!(f, "{}: received {received} lamports", self.reason())
            }
            Self::TxNotFound | Self::TxFailed | Self::ReceiverNotInTx => {
                write!(f, "{}", self.reason())
            }
        }
    }
}

/// [`Ledger`] error.
///
/// Represents a failure to reach a [`Verdict`] at all, as opposed to a
/// [`Verdict::Rejected`] outcome.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// HTTP transport failed or timed out.
    #[display("HTTP request failed: {_0}")]
    Http(reqwest::Error),

    /// Ledger RPC returned an error response.
    #[display("RPC error {code}: {message}")]
    #[from(ignore)]
    Rpc {
        /// Error code returned by the RPC.
        code: i64,

        /// Error message returned by the RPC.
        message: String,
    },
}
