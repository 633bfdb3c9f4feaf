//! OpenAI-compatible [`Assistant`] implementation.

use std::{sync::Arc, time::Duration};

use common::operations::Perform;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use tracerr::Traced;

use super::{Answer, Ask, Assistant, Error};

/// [`OpenAi`] configuration.
#[derive(Debug)]
pub struct Config {
    /// URL of the chat completions endpoint.
    pub url: String,

    /// API key to authenticate with.
    pub api_key: SecretString,

    /// Model generating the answers.
    pub model: String,

    /// Sampling temperature of the model.
    pub temperature: f32,

    /// System prompt shaping the answers.
    pub system_prompt: String,

    /// Timeout of a single API request.
    pub timeout: Duration,
}

/// [`Assistant`] answering via an OpenAI-compatible chat completions API.
#[derive(Clone, Debug)]
pub struct OpenAi {
    /// HTTP client to perform API requests with.
    client: reqwest::Client,

    /// Configuration of this [`OpenAi`] client.
    config: Arc<Config>,
}

impl OpenAi {
    /// Creates a new [`OpenAi`] client with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If failed to initialize the underlying HTTP client.
    pub fn new(config: Config) -> Result<Self, Traced<Error>> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(tracerr::from_and_wrap!(=> Error))?,
            config: Arc::new(config),
        })
    }
}

impl Assistant<Perform<Ask>> for OpenAi {
    type Ok = Answer;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(ask): Perform<Ask>,
    ) -> Result<Self::Ok, Self::Err> {
        let request = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": self.config.system_prompt},
                {"role": "user", "content": AsRef::<str>::as_ref(&ask.prompt)},
            ],
        });

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(tracerr::new!(Error::Status {
                status: status.as_u16(),
                body,
            }));
        }

        let completion = response
            .json::<ChatCompletion>()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(Answer::from)
            .unwrap_or_else(|| Answer::from("")))
    }
}

/// Response of the chat completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    /// Generated completion choices.
    #[serde(default)]
    choices: Vec<Choice>,
}

/// Single completion choice.
#[derive(Debug, Deserialize)]
struct Choice {
    /// Generated message.
    message: ChoiceMessage,
}

/// Message of a completion [`Choice`].
#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    /// Text content of the message.
    content: Option<String>,
}

#[cfg(test)]
mod spec {
    use super::ChatCompletion;

    #[test]
    fn parses_completion_content() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"id":"cmpl-1","choices":[
                {"index":0,"message":{"role":"assistant","content":"hi"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("hi"),
        );
    }

    #[test]
    fn tolerates_missing_content() {
        let completion: ChatCompletion =
            serde_json::from_str(r#"{"choices":[{"message":{}}]}"#).unwrap();

        assert_eq!(completion.choices[0].message.content, None);
    }
}
