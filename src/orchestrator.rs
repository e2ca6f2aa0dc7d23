//! Drives one prompt through the assistant lifecycle: assistant, thread,
//! message, run, at most one round of tool outputs, then the reply.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    assistants::{
        messages::{CreateMessageRequest, Message, Role},
        runs::{CreateRunRequest, Status, SubmitToolOutputsRequest, ToolCall, ToolOutput},
        threads::CreateThreadRequest,
        CreateAssistantRequest, Tool,
    },
    client::{ListOrder, OpenAiClient},
    config::Config,
    weather::{get_weather_tool, GetWeatherArgs, WeatherSource, WebSearch, GET_WEATHER},
    Error,
};

pub use crate::assistants::runs::PollSettings;

pub const ASSISTANT_NAME: &str = "Weather App";
pub const INSTRUCTIONS: &str = "You are a weather assistant. Use tools when needed.";

#[derive(Debug, Clone)]
pub struct WeatherAssistant {
    client: OpenAiClient,
    deployment: String,
    tools: Vec<Tool>,
    weather: WeatherSource,
    poll: PollSettings,
    cancel: CancellationToken,
}

impl WeatherAssistant {
    pub fn new(
        client: OpenAiClient,
        deployment: impl Into<String>,
        weather: WeatherSource,
    ) -> Result<Self, Error> {
        let tool = get_weather_tool().map_err(Error::ToolSchema)?;
        Ok(Self {
            client,
            deployment: deployment.into(),
            tools: vec![tool],
            weather,
            poll: PollSettings::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = OpenAiClient::new(config.credentials.clone())?;
        let weather = match &config.search {
            Some(search) => {
                WeatherSource::Search(WebSearch::new(&search.endpoint, &search.subscription_key))
            }
            None => WeatherSource::Static,
        };
        Ok(Self::new(client, &config.deployment, weather)?.with_poll(config.poll))
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Runs stop polling with [`Error::Cancelled`] once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Answers `prompt`. The first element is what the user should see: the
    /// newest assistant text, or a status line when the run did not complete.
    ///
    /// Every call creates a new assistant, thread and run. The poll timeout
    /// covers the run from creation to its final status, tool round included.
    pub async fn run(&self, prompt: &str) -> Result<Vec<String>, Error> {
        let assistant = self
            .client
            .create_assistant(&CreateAssistantRequest {
                model: self.deployment.clone(),
                name: Some(ASSISTANT_NAME.to_string()),
                instructions: Some(INSTRUCTIONS.to_string()),
                tools: self.tools.clone(),
                ..Default::default()
            })
            .await?;
        info!(assistant_id = %assistant.id, "assistant created");

        let thread = self
            .client
            .create_thread(&CreateThreadRequest::default())
            .await?;
        info!(thread_id = %thread.id, "thread created");

        let message = self
            .client
            .create_message(
                &thread.id,
                &CreateMessageRequest {
                    role: Role::User,
                    content: prompt.to_string(),
                    attachments: None,
                    metadata: None,
                },
            )
            .await?;
        info!(message_id = %message.id, "message created");

        let run = self
            .client
            .create_run(
                &thread.id,
                &CreateRunRequest {
                    assistant_id: assistant.id.clone(),
                    ..Default::default()
                },
            )
            .await?;
        info!(run_id = %run.id, status = %run.status, "run created");

        let deadline = self.poll.deadline();
        let mut run = self
            .client
            .poll_run(run, &self.poll, deadline, &self.cancel)
            .await?;

        // One round only: whatever the run asks for after this is reported as its status.
        let tool_outputs = match run.tool_calls() {
            Some(tool_calls) => self.resolve_tool_calls(tool_calls).await?,
            None => Vec::new(),
        };
        if !tool_outputs.is_empty() {
            debug!(count = tool_outputs.len(), "submitting tool outputs");
            run = self
                .client
                .submit_tool_outputs_and_poll(
                    run,
                    &SubmitToolOutputsRequest { tool_outputs },
                    &self.poll,
                    deadline,
                    &self.cancel,
                )
                .await?;
        }

        if run.status != Status::Completed {
            warn!(run_id = %run.id, status = %run.status, "run did not complete");
            return Ok(vec![not_completed(run.status)]);
        }

        let messages = self
            .client
            .list_messages(&thread.id, ListOrder::Desc)
            .await?;
        Ok(collect_texts(&messages))
    }

    /// Produces one output per tool call. `getWeather` calls are answered by
    /// the weather source; any other function gets a placeholder so the run
    /// is not left waiting on a call id.
    pub async fn resolve_tool_calls(
        &self,
        tool_calls: &[ToolCall],
    ) -> Result<Vec<ToolOutput>, Error> {
        let mut outputs = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            let output = if call.function.name == GET_WEATHER {
                let args: GetWeatherArgs = serde_json::from_str(&call.function.arguments)
                    .map_err(|source| Error::ToolArguments {
                        call_id: call.id.clone(),
                        source,
                    })?;
                info!(call_id = %call.id, location = %args.location, "getWeather");
                self.weather.get_weather(&args.location).await
            } else {
                warn!(call_id = %call.id, name = %call.function.name, "unknown tool requested");
                format!("Unknown tool: {}", call.function.name)
            };

            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }

        Ok(outputs)
    }
}

/// Every text content value across `messages`, in the order given.
pub fn collect_texts(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .flat_map(Message::texts)
        .map(str::to_owned)
        .collect()
}

pub fn not_completed(status: Status) -> String {
    format!("Run not completed. Status: {status}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assistants::runs::ToolCallFunction, Credentials};

    fn assistant() -> WeatherAssistant {
        let client = OpenAiClient::new(Credentials::new(
            "key",
            "http://127.0.0.1:9",
            "2024-05-01-preview",
        ))
        .unwrap();
        WeatherAssistant::new(client, "gpt-4o", WeatherSource::Static).unwrap()
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            r#type: "function".to_string(),
            function: ToolCallFunction {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn static_weather_output() {
        let outputs = assistant()
            .resolve_tool_calls(&[call("call_1", "getWeather", r#"{"location": "Paris"}"#)])
            .await
            .unwrap();
        assert_eq!(
            outputs,
            [ToolOutput {
                tool_call_id: "call_1".to_string(),
                output: "It's 80 degrees F and slightly cloudy in Paris.".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn unknown_tool_gets_placeholder() {
        let outputs = assistant()
            .resolve_tool_calls(&[
                call("call_1", "getTime", "{}"),
                call("call_2", "getWeather", r#"{"location": "Oslo"}"#),
            ])
            .await
            .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].tool_call_id, "call_1");
        assert_eq!(outputs[0].output, "Unknown tool: getTime");
        assert_eq!(
            outputs[1].output,
            "It's 80 degrees F and slightly cloudy in Oslo."
        );
    }

    #[tokio::test]
    async fn malformed_arguments_are_an_error() {
        let error = assistant()
            .resolve_tool_calls(&[call("call_9", "getWeather", "{location: Paris")])
            .await
            .unwrap_err();
        assert!(matches!(error, Error::ToolArguments { call_id, .. } if call_id == "call_9"));

        let error = assistant()
            .resolve_tool_calls(&[call("call_9", "getWeather", r#"{"city": "Paris"}"#)])
            .await
            .unwrap_err();
        assert!(matches!(error, Error::ToolArguments { .. }));
    }

    #[test]
    fn status_line() {
        assert_eq!(
            not_completed(Status::Failed),
            "Run not completed. Status: failed"
        );
        assert_eq!(
            not_completed(Status::RequiresAction),
            "Run not completed. Status: requires_action"
        );
    }
}
