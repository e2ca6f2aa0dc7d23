use derive_builder::Builder;
use either::Either;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, future::Future, time::Duration};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    assistants::{messages::IncompleteDetails, Tool},
    client::OpenAiClient,
    ApiResponseOrError, Error,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Run {
    pub id: String,
    pub object: String,
    pub created_at: u64,
    /// The ID of the assistant used for this run.
    pub assistant_id: String,
    /// The ID of the thread associated with this run.
    pub thread_id: String,
    pub status: Status,
    /// Details on the action required to continue the run. Will be null if no action is required.
    pub required_action: Option<RequiredAction>,
    pub last_error: Option<LastError>,

    pub expires_at: Option<u64>,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub failed_at: Option<u64>,
    pub incomplete_details: Option<IncompleteDetails>,

    pub model: Option<String>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    pub usage: Option<Usage>,
    pub parallel_tool_calls: Option<bool>,
    pub tool_choice: Option<ToolChoice>,
    pub metadata: Option<HashMap<String, String>>,
}

impl Run {
    /// The tool calls the run is waiting on, if it stopped to ask for them.
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match &self.required_action {
            Some(RequiredAction::SubmitToolOutputs {
                submit_tool_outputs,
            }) => Some(submit_tool_outputs.tool_calls.as_slice()),
            None => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl Status {
    /// Whether polling can stop. `requires_action` counts as terminal since
    /// the run cannot make progress until tool outputs are submitted.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Status::Queued | Status::InProgress | Status::Cancelling
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum RequiredAction {
    SubmitToolOutputs {
        submit_tool_outputs: RequiredToolCalls,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequiredToolCalls {
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Must be echoed back in the matching [`ToolOutput`].
    pub id: String,
    /// Currently only `function`.
    pub r#type: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCallFunction {
    pub name: String,
    /// The arguments as generated by the model, JSON encoded. Not guaranteed
    /// to be valid JSON or to match the declared schema.
    pub arguments: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(transparent)]
pub struct ToolChoice {
    #[serde(with = "either::serde_untagged")]
    pub inner: Either<ToolChoiceStrategy, ToolChoiceFunction>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceStrategy {
    None,
    Auto,
    Required,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum ToolChoiceFunction {
    Function { function: FunctionName },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FunctionName {
    pub name: String,
}

#[derive(Serialize, Builder, Debug, Clone, Default)]
#[builder(pattern = "owned")]
#[builder(name = "CreateRunBuilder")]
#[builder(setter(strip_option, into))]
pub struct CreateRunRequest {
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub additional_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubmitToolOutputsRequest {
    pub tool_outputs: Vec<ToolOutput>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Upper bound on the best-effort cancel sent when a run is abandoned.
const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

/// How often a run is re-fetched and how long to wait for it overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Budget for the whole run, tool round included.
    pub timeout: Duration,
}

impl PollSettings {
    /// The instant a run started now must finish by.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

impl OpenAiClient {
    pub async fn create_run(
        &self,
        thread_id: &str,
        request: &CreateRunRequest,
    ) -> ApiResponseOrError<Run> {
        self.post(format!("threads/{thread_id}/runs"), request)
            .await
    }

    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run> {
        self.get(format!("threads/{thread_id}/runs/{run_id}")).await
    }

    pub async fn cancel_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run> {
        self.post(
            format!("threads/{thread_id}/runs/{run_id}/cancel"),
            serde_json::json!({}),
        )
        .await
    }

    /// Re-fetches `run` every `poll.interval` until its status is terminal.
    ///
    /// Gives up with [`Error::Timeout`] at `deadline` and with
    /// [`Error::Cancelled`] when `cancel` fires, including while a fetch is in
    /// flight. In both cases the run is cancelled on the service side, best
    /// effort.
    pub async fn poll_run(
        &self,
        mut run: Run,
        poll: &PollSettings,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Run, Error> {
        while !run.status.is_terminal() {
            let next = async {
                sleep(poll.interval).await;
                self.get_run(&run.thread_id, &run.id).await
            };
            run = self.bounded(&run, poll, deadline, cancel, next).await?;
            debug!(run_id = %run.id, status = %run.status, "polled run");
        }

        Ok(run)
    }

    /// Submits all `tool_outputs` in one batch, then polls the resumed run
    /// against the same `deadline`.
    pub async fn submit_tool_outputs_and_poll(
        &self,
        run: Run,
        request: &SubmitToolOutputsRequest,
        poll: &PollSettings,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Run, Error> {
        let submit = self.post(
            format!(
                "threads/{}/runs/{}/submit_tool_outputs",
                run.thread_id, run.id
            ),
            request,
        );
        let run: Run = self.bounded(&run, poll, deadline, cancel, submit).await?;

        self.poll_run(run, poll, deadline, cancel).await
    }

    /// Races `request` against `deadline` and `cancel`, abandoning `run` if
    /// either wins.
    async fn bounded<T, F>(
        &self,
        run: &Run,
        poll: &PollSettings,
        deadline: Instant,
        cancel: &CancellationToken,
        request: F,
    ) -> Result<T, Error>
    where
        F: Future<Output = ApiResponseOrError<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.abandon_run(run).await;
                Err(Error::Cancelled { run_id: run.id.clone() })
            }
            _ = sleep_until(deadline) => {
                self.abandon_run(run).await;
                Err(Error::Timeout {
                    run_id: run.id.clone(),
                    timeout: poll.timeout,
                })
            }
            result = request => Ok(result?),
        }
    }

    async fn abandon_run(&self, run: &Run) {
        match timeout(CANCEL_TIMEOUT, self.cancel_run(&run.thread_id, &run.id)).await {
            Ok(Ok(_)) => debug!(run_id = %run.id, "run cancelled"),
            Ok(Err(error)) => warn!(run_id = %run.id, %error, "failed to cancel run"),
            Err(_) => warn!(run_id = %run.id, "cancelling run timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_display_matches_wire_name() {
        assert_eq!(Status::Failed.to_string(), "failed");
        assert_eq!(Status::RequiresAction.to_string(), "requires_action");
        let status: Status = serde_json::from_value(json!("in_progress")).unwrap();
        assert_eq!(status, Status::InProgress);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!Status::Queued.is_terminal());
        assert!(!Status::InProgress.is_terminal());
        assert!(!Status::Cancelling.is_terminal());
        assert!(Status::RequiresAction.is_terminal());
        assert!(Status::Completed.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(Status::Expired.is_terminal());
    }

    #[test]
    fn required_action_exposes_tool_calls() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "object": "thread.run",
            "created_at": 1719000000,
            "assistant_id": "asst_1",
            "thread_id": "thread_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "getWeather", "arguments": "{\"location\":\"Paris\"}"}
                    }]
                }
            },
            "tool_choice": "auto",
            "tools": []
        }))
        .unwrap();

        let calls = run.tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "getWeather");
    }

    #[test]
    fn run_without_action_has_no_tool_calls() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "object": "thread.run",
            "created_at": 1719000000,
            "assistant_id": "asst_1",
            "thread_id": "thread_1",
            "status": "completed",
            "required_action": null,
            "tool_choice": {"type": "function", "function": {"name": "getWeather"}}
        }))
        .unwrap();
        assert!(run.tool_calls().is_none());
        assert!(matches!(
            run.tool_choice.map(|choice| choice.inner),
            Some(Either::Right(ToolChoiceFunction::Function { function })) if function.name == "getWeather"
        ));
    }

    #[test]
    fn run_request_skips_unset_fields() {
        let request = CreateRunBuilder::default()
            .assistant_id("asst_1")
            .build()
            .unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"assistant_id": "asst_1"})
        );
    }
}
