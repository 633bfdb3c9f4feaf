//! [`Command`] definition.

pub mod ask_assistant;
pub mod authorize_session;
pub mod create_session;
pub mod verify_payment;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    ask_assistant::AskAssistant, authorize_session::AuthorizeSession,
    create_session::CreateSession, verify_payment::VerifyPayment,
};
