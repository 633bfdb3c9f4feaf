//! Assistant-related HTTP API definitions.

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::session,
    infra::assistant::{Ask, Prompt},
    Command as _,
};

use crate::{define_error, AsError, Context, Error, Service};

/// `POST /agent/run` request.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Prompt to answer.
    pub prompt: String,
}

/// `POST /agent/run` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    /// ID of the paid session the answer was produced for.
    pub session_id: session::Id,

    /// Produced answer.
    pub answer: String,
}

/// Handles `POST /agent/run` requests by forwarding the prompt to the
/// assistant.
///
/// Extraction of the [`Context`] enforces the access gate before anything
/// else happens.
///
/// # Errors
///
/// Errors if the prompt is malformed, or the assistant call fails. The call
/// is never retried automatically.
pub async fn run(
    Extension(service): Extension<Service>,
    context: Context,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, Error> {
    let prompt = Prompt::new(req.prompt).ok_or(ApiError::InvalidPrompt)?;

    let answer = service
        .execute(command::AskAssistant {
            ask: Ask { prompt },
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(RunResponse {
        session_id: context.claims.session_id,
        answer: answer.to_string(),
    }))
}

impl AsError for command::ask_assistant::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Assistant(_) => Some(ApiError::AssistantFailed.into()),
        }
    }
}

define_error! {
    enum ApiError {
        #[code = "INVALID_PROMPT"]
        #[status = BAD_REQUEST]
        #[message = "Invalid `prompt`"]
        InvalidPrompt,

        #[code = "ASSISTANT_FAILED"]
        #[status = BAD_GATEWAY]
        #[message = "Assistant failed to produce an answer"]
        AssistantFailed,
    }
}
