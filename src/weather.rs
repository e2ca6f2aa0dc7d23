//! The `getWeather` tool and the sources that can answer it.

use std::time::Duration;

use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::assistants::{Function, Tool};

/// Name of the only function the assistant is offered.
pub const GET_WEATHER: &str = "getWeather";

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// How long a search may take before it counts as failed.
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Get the weather in a location
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetWeatherArgs {
    /// City name like San Francisco
    pub location: String,
}

/// The tool declaration sent when creating the assistant.
pub fn get_weather_tool() -> Result<Tool, serde_json::Error> {
    Function::from_schema::<GetWeatherArgs>(GET_WEATHER).map(|function| Tool::Function { function })
}

/// Where weather answers come from. Lookups never fail; problems are turned
/// into sentences the model can relay.
#[derive(Debug, Clone)]
pub enum WeatherSource {
    /// A canned answer, no network involved.
    Static,
    /// The first web search snippet for the location.
    Search(WebSearch),
}

impl WeatherSource {
    pub async fn get_weather(&self, location: &str) -> String {
        match self {
            WeatherSource::Static => static_weather(location),
            WeatherSource::Search(search) => search.weather(location).await,
        }
    }
}

pub fn static_weather(location: &str) -> String {
    format!("It's 80 degrees F and slightly cloudy in {location}.")
}

/// Bing Web Search client.
#[derive(Clone)]
pub struct WebSearch {
    endpoint: String,
    subscription_key: String,
    timeout: Duration,
    http: Client,
}

impl std::fmt::Debug for WebSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebSearch({})", self.endpoint)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "webPages")]
    web_pages: Option<WebPages>,
}

#[derive(Debug, Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Debug, Deserialize)]
struct WebPage {
    snippet: Option<String>,
}

impl SearchResponse {
    fn first_snippet(self) -> Option<String> {
        self.web_pages?.value.into_iter().next()?.snippet
    }
}

impl WebSearch {
    pub fn new(endpoint: impl Into<String>, subscription_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            subscription_key: subscription_key.into(),
            timeout: DEFAULT_SEARCH_TIMEOUT,
            http: Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn weather(&self, location: &str) -> String {
        let query = format!("What is the weather like in {location}");
        match self.search(&query).await {
            Ok(response) => match response.first_snippet() {
                Some(snippet) => snippet,
                None => {
                    debug!(location, "search returned no results");
                    format!("Couldn't find weather information for {location}.")
                }
            },
            Err(error) => {
                warn!(location, %error, "weather search failed");
                format!("Failed to get weather for {location}.")
            }
        }
    }

    async fn search(&self, query: &str) -> Result<SearchResponse, reqwest::Error> {
        self.http
            .get(&self.endpoint)
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .query(&[("q", query)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}
