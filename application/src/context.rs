//! [`Context`]-related definitions.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use service::{
    command,
    domain::session::{self, Claims},
    Command as _,
};

#[cfg(doc)]
use service::domain::Session;

use crate::{define_error, AsError, Error, Service};

/// Context of an authorized request to a protected endpoint.
///
/// Extracting it enforces the access gate: the bearer token is verified and
/// the [`Session`] it is bound to must be paid. Requests without a token are
/// rejected as unauthenticated, while tokens bound to unpaid [`Session`]s
/// are rejected as payment-required.
#[derive(Clone, Debug)]
pub struct Context {
    /// [`Claims`] of the verified access token.
    pub claims: Claims,
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service =
            parts.extensions.get::<Service>().cloned().ok_or_else(|| {
                Error::internal(&"missing `Service` extension")
            })?;

        let res = parts.extract::<TypedHeader<Authorization<Bearer>>>().await;
        match res {
            Ok(TypedHeader(Authorization(bearer))) => {
                #[expect(unsafe_code, reason = "specified in correct header")]
                let token = unsafe {
                    session::Token::new_unchecked(bearer.token().to_owned())
                };
                service
                    .execute(command::AuthorizeSession { token })
                    .await
                    .map(|claims| Self { claims })
                    .map_err(AsError::into_error)
            }
            Err(e) => {
                if e.is_missing() {
                    Err(GateError::AuthorizationRequired.into())
                } else {
                    Err(e.into_error())
                }
            }
        }
    }
}

impl AsError for command::authorize_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            // Tampered, expired and dangling tokens are deliberately not
            // distinguishable from the outside.
            Self::JsonWebTokenDecodeError(_) | Self::SessionNotExists(_) => {
                Some(GateError::InvalidToken.into())
            }
            Self::NotPaid(_) => Some(GateError::PaymentRequired.into()),
        }
    }
}

define_error! {
    enum GateError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "INVALID_TOKEN"]
        #[status = UNAUTHORIZED]
        #[message = "Invalid access token"]
        InvalidToken,

        #[code = "PAYMENT_REQUIRED"]
        #[status = PAYMENT_REQUIRED]
        #[message = "Session is not paid"]
        PaymentRequired,
    }
}
