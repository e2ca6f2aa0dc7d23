//! A weather assistant served over HTTP.
//!
//! Each `POST /chat` creates an assistant on Azure OpenAI with a single
//! `getWeather` tool, runs it against a fresh thread holding the user's prompt,
//! answers at most one round of tool calls and renders the reply.

use serde::Deserialize;

pub mod assistants;
pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod render;
pub mod server;
pub mod weather;

pub use client::OpenAiClient;
pub use config::Config;
pub use error::Error;
pub use orchestrator::{PollSettings, WeatherAssistant};

#[derive(Deserialize, Debug, Clone)]
pub struct OpenAiError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl OpenAiError {
    pub fn new(message: String, error_type: String) -> OpenAiError {
        OpenAiError {
            message,
            error_type,
            param: None,
            code: None,
        }
    }
}

impl std::fmt::Display for OpenAiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for OpenAiError {}

impl From<reqwest::Error> for OpenAiError {
    fn from(value: reqwest::Error) -> Self {
        OpenAiError::new(value.to_string(), "reqwest".to_string())
    }
}

pub type ApiResponseOrError<T> = Result<T, OpenAiError>;

/// Connection details for an Azure OpenAI resource.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    endpoint: String,
    api_version: String,
}

impl Credentials {
    /// `endpoint` is the resource root, e.g. `https://my-resource.openai.azure.com`.
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish()
    }
}
