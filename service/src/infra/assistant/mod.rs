//! [`Assistant`]-related implementations.

pub mod openai;

use std::{str::FromStr, sync::LazyLock};

use derive_more::{AsRef, Display, Error as StdError, From};
use regex::Regex;

pub use self::openai::OpenAi;

/// Assistant operation.
pub use common::Handler as Assistant;

/// Question asked to the assistant.
#[derive(Clone, Debug)]
pub struct Ask {
    /// [`Prompt`] to answer.
    pub prompt: Prompt,
}

/// Prompt of an [`Ask`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
pub struct Prompt(String);

impl Prompt {
    /// Creates a new [`Prompt`] if the given `text` is valid.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        Self::check(&text).then_some(Self(text))
    }

    /// Checks whether the given `text` is a valid [`Prompt`].
    fn check(text: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Prompt`] invariants:
        /// - Must contain at least one non-whitespace character.
        static REGEX: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\S").expect("valid regex"));

        let text = text.as_ref();
        text.len() <= 8192 && REGEX.is_match(text)
    }
}

impl FromStr for Prompt {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Prompt`")
    }
}

/// Answer of the assistant.
#[derive(AsRef, Clone, Debug, Display, Eq, From, PartialEq)]
#[as_ref(str, String)]
#[from(&str, String)]
pub struct Answer(String);

/// [`Assistant`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// HTTP transport failed or timed out.
    #[display("HTTP request failed: {_0}")]
    Http(reqwest::Error),

    /// Assistant API responded with a non-success status.
    #[display("assistant API error {status}: {body}")]
    #[from(ignore)]
    Status {
        /// Status code of the response.
        status: u16,

        /// Body of the response.
        body: String,
    },
}
