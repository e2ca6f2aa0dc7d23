//! Mock Azure OpenAI assistants service shared by the integration tests.
#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use weather_assistant::{
    weather::WeatherSource, Credentials, OpenAiClient, PollSettings, WeatherAssistant,
};
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, Request, ResponseTemplate,
};

pub const API_KEY: &str = "test-key";
pub const API_VERSION: &str = "2024-05-01-preview";
pub const DEPLOYMENT: &str = "gpt-4o";

pub const THREAD: &str = "/openai/threads/thread_1";
pub const RUN: &str = "/openai/threads/thread_1/runs/run_1";

pub fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

pub fn assistant_for(server: &MockServer, weather: WeatherSource) -> WeatherAssistant {
    let credentials = Credentials::new(API_KEY, server.uri(), API_VERSION);
    let client = OpenAiClient::new(credentials).unwrap();
    WeatherAssistant::new(client, DEPLOYMENT, weather)
        .unwrap()
        .with_poll(fast_poll())
}

pub fn run_json(status: &str) -> Value {
    json!({
        "id": "run_1",
        "object": "thread.run",
        "created_at": 1719000000,
        "assistant_id": "asst_1",
        "thread_id": "thread_1",
        "status": status,
        "required_action": null,
        "last_error": null,
        "model": DEPLOYMENT,
        "instructions": "You are a weather assistant. Use tools when needed.",
        "tools": [],
        "tool_choice": "auto",
        "parallel_tool_calls": true,
        "metadata": {}
    })
}

pub fn weather_call(id: &str, location: &str) -> Value {
    json!({
        "id": id,
        "type": "function",
        "function": {
            "name": "getWeather",
            "arguments": json!({ "location": location }).to_string()
        }
    })
}

pub fn run_requiring(tool_calls: Value) -> Value {
    let mut run = run_json("requires_action");
    run["required_action"] = json!({
        "type": "submit_tool_outputs",
        "submit_tool_outputs": { "tool_calls": tool_calls }
    });
    run
}

pub fn message_json(id: &str, role: &str, text: &str) -> Value {
    json!({
        "id": id,
        "object": "thread.message",
        "created_at": 1719000000,
        "thread_id": "thread_1",
        "role": role,
        "content": [{"type": "text", "text": {"value": text, "annotations": []}}],
        "assistant_id": if role == "assistant" { json!("asst_1") } else { Value::Null },
        "run_id": if role == "assistant" { json!("run_1") } else { Value::Null },
        "attachments": [],
        "metadata": {}
    })
}

pub fn api(http_method: &str, route: &str) -> wiremock::MockBuilder {
    Mock::given(method(http_method))
        .and(path(route))
        .and(query_param("api-version", API_VERSION))
        .and(header("api-key", API_KEY))
}

/// Assistant, thread and message creation.
pub async fn mount_setup(server: &MockServer) {
    api("POST", "/openai/assistants")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "asst_1",
            "object": "assistant",
            "created_at": 1719000000,
            "name": "Weather App",
            "description": null,
            "model": DEPLOYMENT,
            "instructions": "You are a weather assistant. Use tools when needed.",
            "tools": [],
            "metadata": {}
        })))
        .mount(server)
        .await;

    api("POST", "/openai/threads")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "thread_1",
            "object": "thread",
            "created_at": 1719000000,
            "metadata": {}
        })))
        .mount(server)
        .await;

    api("POST", &format!("{THREAD}/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(message_json("msg_1", "user", "prompt")),
        )
        .mount(server)
        .await;
}

/// `POST .../runs` answers with `run`.
pub async fn mount_create_run(server: &MockServer, run: Value) {
    api("POST", &format!("{THREAD}/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run))
        .mount(server)
        .await;
}

/// Successive `GET` polls of the run return `runs` in order; the last one
/// repeats.
pub async fn mount_polls(server: &MockServer, runs: Vec<Value>) {
    let last = runs.len().saturating_sub(1);
    for (i, run) in runs.into_iter().enumerate() {
        let mock = api("GET", RUN).respond_with(ResponseTemplate::new(200).set_body_json(run));
        let mock = if i == last { mock } else { mock.up_to_n_times(1) };
        mock.mount(server).await;
    }
}

pub async fn mount_submit(server: &MockServer, run: Value) {
    api("POST", &format!("{RUN}/submit_tool_outputs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run))
        .mount(server)
        .await;
}

pub async fn mount_cancel(server: &MockServer) {
    api("POST", &format!("{RUN}/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("cancelling")))
        .mount(server)
        .await;
}

/// The thread listing, newest first like the service.
pub async fn mount_messages(server: &MockServer, reply: &str, prompt: &str) {
    api("GET", &format!("{THREAD}/messages"))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                message_json("msg_2", "assistant", reply),
                message_json("msg_1", "user", prompt)
            ],
            "first_id": "msg_2",
            "last_id": "msg_1",
            "has_more": false
        })))
        .mount(server)
        .await;
}

pub async fn requests_to(server: &MockServer, http_method: &str, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() == http_method && request.url.path() == route)
        .collect()
}

/// Body of the single tool-output submission.
pub async fn submitted_outputs(server: &MockServer) -> Value {
    let requests = requests_to(server, "POST", &format!("{RUN}/submit_tool_outputs")).await;
    assert_eq!(requests.len(), 1, "expected exactly one submission");
    requests[0].body_json().unwrap()
}
