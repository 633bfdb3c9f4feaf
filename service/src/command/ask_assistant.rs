//! [`Command`] for asking the assistant a question.

use common::operations::Perform;
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    infra::{
        assistant::{self, Answer, Ask},
        Assistant,
    },
    Service,
};

use super::Command;

#[cfg(doc)]
use crate::domain::Session;

/// [`Command`] for asking the assistant a question.
///
/// This is the paid capability behind the access gate: callers must have
/// been authorized against a paid [`Session`] before executing it. The call
/// is never retried automatically.
#[derive(Clone, Debug, From)]
pub struct AskAssistant {
    /// Question to ask.
    pub ask: Ask,
}

impl<Db, Lg, Ai> Command<AskAssistant> for Service<Db, Lg, Ai>
where
    Ai: Assistant<Perform<Ask>, Ok = Answer, Err = Traced<assistant::Error>>,
{
    type Ok = Answer;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: AskAssistant) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AskAssistant { ask } = cmd;

        self.assistant()
            .execute(Perform(ask))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`AskAssistant`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Assistant call failed.
    #[display("`Assistant` operation failed: {_0}")]
    Assistant(assistant::Error),
}
