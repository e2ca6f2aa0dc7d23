use crate::{ApiResponseOrError, Credentials, OpenAiError};
use anyhow::Result;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

#[derive(Clone)]
pub struct OpenAiClient {
    credentials: Credentials,
    client: Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenAiClient({})", self.credentials.endpoint())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiErrorWrapper {
    error: OpenAiError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ListOrder {
    Asc,
    /// Newest first. This is the service default.
    #[default]
    Desc,
}

impl OpenAiClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let mut api_key = HeaderValue::from_str(credentials.api_key())?;
        api_key.set_sensitive(true);

        let headers: HeaderMap = [
            (HeaderName::from_static("api-key"), api_key),
            (
                HeaderName::from_static("openai-beta"),
                HeaderValue::from_static("assistants=v2"),
            ),
        ]
        .into_iter()
        .collect();

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            credentials,
            client,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn url(&self, route: &str) -> String {
        format!("{}/openai/{}", self.credentials.endpoint(), route)
    }

    async fn request_inner<S, R>(
        &self,
        method: Method,
        route: R,
        query: &[(&str, String)],
        body: Option<S>,
    ) -> Result<Response, reqwest::Error>
    where
        R: Into<String>,
        S: Serialize,
    {
        let url = self.url(&route.into());
        debug!(%method, %url, "openai request");

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .query(&[("api-version", self.credentials.api_version())]);

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;

        debug!(%method, %url, status = response.status().as_u16(), "openai response");
        Ok(response)
    }

    pub async fn request<S, R, T>(
        &self,
        method: Method,
        route: R,
        query: &[(&str, String)],
        body: Option<S>,
    ) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        S: Serialize,
        T: DeserializeOwned,
    {
        let response = self.request_inner(method, route, query, body).await?;
        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }

        let status = response.status();
        let result = response.text().await?;
        if let Ok(api_response) = serde_json::from_str::<OpenAiErrorWrapper>(&result) {
            Err(api_response.error)
        } else {
            let message = if result.is_empty() {
                status.to_string()
            } else {
                result
            };
            Err(OpenAiError::new(message, "unknown".to_string()))
        }
    }

    pub async fn get<R, T>(&self, route: R) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        self.request::<(), R, T>(Method::GET, route, &[], None).await
    }

    pub async fn post<S, R, T>(&self, route: R, body: S) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        S: Serialize,
        T: DeserializeOwned,
    {
        self.request(Method::POST, route, &[], Some(body)).await
    }

    pub async fn delete<R>(&self, route: R) -> ApiResponseOrError<Deleted>
    where
        R: Into<String>,
    {
        self.request::<(), R, Deleted>(Method::DELETE, route, &[], None)
            .await
    }

    /// Fetches every page of a list endpoint, following `last_id` while
    /// `has_more` is set.
    pub async fn list<R, T>(
        &self,
        route: R,
        order: ListOrder,
        mut after: Option<String>,
    ) -> ApiResponseOrError<Vec<T>>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        let route = route.into();
        let mut data = Vec::new();

        loop {
            let mut query = vec![("order", order.to_string())];
            if let Some(after) = after.take() {
                query.push(("after", after));
            }

            let page: List<T> = self
                .request::<(), _, _>(Method::GET, route.as_str(), &query, None)
                .await?;
            data.extend(page.data);

            match page.last_id {
                Some(last_id) if page.has_more => after = Some(last_id),
                _ => break,
            }
        }

        Ok(data)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct List<T> {
    pub first_id: Option<String>,
    pub last_id: Option<String>,
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Deleted {
    pub id: String,
    pub object: String,
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(Credentials::new(
            "key",
            "https://example.openai.azure.com/",
            "2024-05-01-preview",
        ))
        .unwrap()
    }

    #[test]
    fn routes_live_under_openai_prefix() {
        assert_eq!(
            client().url("threads/thread_1/runs"),
            "https://example.openai.azure.com/openai/threads/thread_1/runs"
        );
    }

    #[test]
    fn list_order_is_snake_case() {
        assert_eq!(ListOrder::Asc.to_string(), "asc");
        assert_eq!(ListOrder::default().to_string(), "desc");
    }

    #[test]
    fn list_page_defaults_has_more() {
        let page: List<serde_json::Value> =
            serde_json::from_str(r#"{"object": "list", "data": [{}], "first_id": null, "last_id": null}"#)
                .unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(!page.has_more);
    }
}
