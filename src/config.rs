//! Process configuration, read once from the environment at startup.

use std::{env, num::ParseIntError, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::{assistants::runs::PollSettings, render::AnswerFormat, Credentials};

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` must be set: the endpoint, key, deployment name and API version are all required")]
    Missing(&'static str),

    #[error("environment variable `{var}` has invalid value {value:?}: {source}")]
    Invalid {
        var: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("environment variable `{0}` must be greater than zero")]
    Zero(&'static str),

    #[error("web search needs both `BING_SEARCH_KEY` and `BING_SEARCH_ENDPOINT`; only `{0}` is set")]
    PartialSearch(&'static str),
}

const OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
const OPENAI_KEY: &str = "AZURE_OPENAI_KEY";
const OPENAI_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
const OPENAI_VERSION: &str = "AZURE_OPENAI_VERSION";
const SEARCH_KEY: &str = "BING_SEARCH_KEY";
const SEARCH_ENDPOINT: &str = "BING_SEARCH_ENDPOINT";
const PORT: &str = "PORT";
const POLL_INTERVAL_MS: &str = "ASSISTANT_POLL_INTERVAL_MS";
const RUN_TIMEOUT_SECS: &str = "ASSISTANT_RUN_TIMEOUT_SECS";
const PUBLIC_DIR: &str = "PUBLIC_DIR";

#[derive(Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub subscription_key: String,
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("subscription_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Azure deployment name, sent as the assistant's model.
    pub deployment: String,
    /// Present when weather answers come from web search.
    pub search: Option<SearchConfig>,
    pub port: u16,
    pub poll: PollSettings,
    /// Directory of static assets served next to the page.
    pub public_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let credentials = Credentials::new(
            require(OPENAI_KEY)?,
            require(OPENAI_ENDPOINT)?,
            require(OPENAI_VERSION)?,
        );
        let deployment = require(OPENAI_DEPLOYMENT)?;

        let search = match (get(SEARCH_KEY), get(SEARCH_ENDPOINT)) {
            (Some(subscription_key), Some(endpoint)) => Some(SearchConfig {
                endpoint,
                subscription_key,
            }),
            (Some(_), None) => return Err(ConfigError::PartialSearch(SEARCH_KEY)),
            (None, Some(_)) => return Err(ConfigError::PartialSearch(SEARCH_ENDPOINT)),
            (None, None) => None,
        };

        let positive = |name: &'static str| -> Result<Option<u64>, ConfigError> {
            let Some(value) = get(name) else {
                return Ok(None);
            };
            match value.trim().parse::<u64>() {
                Ok(0) => Err(ConfigError::Zero(name)),
                Ok(parsed) => Ok(Some(parsed)),
                Err(source) => Err(ConfigError::Invalid {
                    var: name,
                    value,
                    source,
                }),
            }
        };

        let port = match get(PORT) {
            Some(value) => value.trim().parse::<u16>().map_err(|source| ConfigError::Invalid {
                var: PORT,
                value: value.clone(),
                source,
            })?,
            None => DEFAULT_PORT,
        };

        let defaults = PollSettings::default();
        let poll = PollSettings {
            interval: positive(POLL_INTERVAL_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            timeout: positive(RUN_TIMEOUT_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };

        let public_dir = get(PUBLIC_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("public"));

        Ok(Config {
            credentials,
            deployment,
            search,
            port,
            poll,
            public_dir,
        })
    }

    /// Search-backed deployments get Markdown rendering; the static one shows
    /// the answer as plain text.
    pub fn answer_format(&self) -> AnswerFormat {
        if self.search.is_some() {
            AnswerFormat::Markdown
        } else {
            AnswerFormat::Text
        }
    }
}
