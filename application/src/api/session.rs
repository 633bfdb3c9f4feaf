//! [`Session`]-related HTTP API definitions.
//!
//! [`Session`]: service::domain::Session

use axum::{
    response::{IntoResponse, Response},
    Extension, Json,
};
use common::{Chain, Lamports, Sol};
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::session::{self, Product, Signature, Wallet},
    Command as _,
};

use crate::{define_error, AsError, Error, Service};

/// `POST /x402/session` request.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// Product to create a session for.
    pub product: Option<String>,

    /// Ledger the payment is expected on.
    pub chain: Option<String>,

    /// Client wallet address, informational only.
    pub wallet: Option<String>,
}

/// `POST /x402/session` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    /// ID of the created session.
    pub session_id: session::Id,

    /// Product the session is created for.
    pub product: String,

    /// Ledger the payment is expected on.
    pub chain: String,

    /// Amount required to settle the session, in lamports.
    pub amount_lamports: Lamports,

    /// Amount required to settle the session, in SOL.
    pub amount_sol: Sol,

    /// Address expected to receive the payment.
    pub receiver: String,
}

/// Handles `POST /x402/session` requests by creating a new unpaid session.
///
/// # Errors
///
/// Errors if the request fields are malformed, or the session cannot be
/// persisted.
pub async fn create(
    Extension(service): Extension<Service>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, Error> {
    use ApiError as E;

    let CreateRequest {
        product,
        chain,
        wallet,
    } = req;

    let product = product
        .map(|p| Product::new(p).ok_or(E::InvalidProduct))
        .transpose()?;
    let chain = chain
        .map(|c| c.parse::<Chain>().map_err(|_| E::InvalidChain))
        .transpose()?;
    let wallet = wallet
        .map(|w| Wallet::new(w).ok_or(E::InvalidWallet))
        .transpose()?;

    let session = service
        .execute(command::CreateSession {
            product,
            chain,
            wallet,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(CreateResponse {
        session_id: session.id,
        product: session.product.to_string(),
        chain: session.chain.to_string(),
        amount_lamports: session.amount_required,
        amount_sol: session.amount_required.to_sol(),
        receiver: session.receiver.to_string(),
    }))
}

/// `POST /x402/verify` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// ID of the session to settle.
    pub session_id: session::Id,

    /// Signature of the ledger transaction claimed to pay for the session.
    pub signature: String,
}

/// `POST /x402/verify` success response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Indicates the session is paid.
    pub ok: bool,

    /// Access token redeemable at the protected endpoint.
    pub access_token: String,

    /// Set when the session had been paid before this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_paid: Option<bool>,
}

/// `POST /x402/verify` denial response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeniedResponse {
    /// Always `false`.
    pub ok: bool,

    /// Reason the verification was denied.
    pub reason: &'static str,

    /// Amount actually received by the expected receiver, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_lamports: Option<Lamports>,
}

/// Handles `POST /x402/verify` requests by verifying the payment and
/// settling the session.
///
/// Replaying the request for an already paid session responds with the
/// originally issued token.
///
/// # Errors
///
/// Errors if the session does not exist, the ledger cannot be reached, or
/// the settlement cannot be persisted. A verification-negative outcome is
/// not an error: it is reported as a [`DeniedResponse`] and the session
/// stays retryable.
pub async fn verify(
    Extension(service): Extension<Service>,
    Json(req): Json<VerifyRequest>,
) -> Result<Response, Error> {
    use command::verify_payment::ExecutionError as E;

    let signature =
        Signature::new(req.signature).ok_or(ApiError::InvalidSignature)?;

    match service
        .execute(command::VerifyPayment {
            session_id: req.session_id,
            signature,
        })
        .await
    {
        Ok(out) => Ok(Json(VerifyResponse {
            ok: true,
            access_token: out.access_token.to_string(),
            already_paid: out.already_paid.then_some(true),
        })
        .into_response()),
        Err(e) => match e.as_ref() {
            E::Denied(denial) => Ok((
                http::StatusCode::BAD_REQUEST,
                Json(DeniedResponse {
                    ok: false,
                    reason: denial.reason(),
                    received_lamports: denial.received(),
                }),
            )
                .into_response()),
            E::Db(_)
            | E::JsonWebTokenEncodeError(_)
            | E::Ledger(_)
            | E::SessionNotExists(_)
            | E::SettlementConflict(_) => Err(e.into_error()),
        },
    }
}

impl AsError for command::create_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::verify_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Denied(_) => Some(ApiError::PaymentNotVerified.into()),
            Self::JsonWebTokenEncodeError(_) | Self::SettlementConflict(_) => {
                None
            }
            Self::Ledger(_) => Some(ApiError::LedgerUnavailable.into()),
            Self::SessionNotExists(_) => {
                Some(ApiError::SessionNotFound.into())
            }
        }
    }
}

define_error! {
    enum ApiError {
        #[code = "INVALID_PRODUCT"]
        #[status = BAD_REQUEST]
        #[message = "Invalid `product`"]
        InvalidProduct,

        #[code = "INVALID_CHAIN"]
        #[status = BAD_REQUEST]
        #[message = "Unsupported `chain`"]
        InvalidChain,

        #[code = "INVALID_WALLET"]
        #[status = BAD_REQUEST]
        #[message = "Invalid `wallet`"]
        InvalidWallet,

        #[code = "INVALID_SIGNATURE"]
        #[status = BAD_REQUEST]
        #[message = "Invalid `signature`"]
        InvalidSignature,

        #[code = "PAYMENT_NOT_VERIFIED"]
        #[status = BAD_REQUEST]
        #[message = "Payment verification failed"]
        PaymentNotVerified,

        #[code = "SESSION_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Session not found"]
        SessionNotFound,

        #[code = "LEDGER_UNAVAILABLE"]
        #[status = SERVICE_UNAVAILABLE]
        #[message = "Ledger is unavailable, retry later"]
        LedgerUnavailable,
    }
}
