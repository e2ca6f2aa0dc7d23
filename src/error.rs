use std::time::Duration;

use thiserror::Error;

use crate::OpenAiError;

/// Failures that abort a chat request.
///
/// A run that ends in a status other than `completed` is not an error; it is
/// reported to the user as text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("assistant service error: {0}")]
    Api(#[from] OpenAiError),

    #[error("run {run_id} did not finish within {timeout:?}")]
    Timeout { run_id: String, timeout: Duration },

    #[error("run {run_id} was cancelled before it finished")]
    Cancelled { run_id: String },

    #[error("tool call {call_id} has invalid arguments: {source}")]
    ToolArguments {
        call_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build tool schema: {0}")]
    ToolSchema(#[source] serde_json::Error),
}
