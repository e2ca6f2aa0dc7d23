//! HTTP front end: `GET /` shows the form, `POST /chat` answers it.
//!
//! **Public API**: [`router`], [`serve`].

use std::{path::PathBuf, sync::Arc};

use askama::Template;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    render::{AnswerFormat, IndexPage},
    Error, WeatherAssistant,
};

pub struct AppState {
    pub assistant: WeatherAssistant,
    pub format: AnswerFormat,
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub prompt: String,
}

/// Unmatched paths fall through to the static files in `public_dir`.
pub fn router(state: Arc<AppState>, public_dir: impl Into<PathBuf>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat))
        .fallback_service(ServeDir::new(public_dir.into()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` is cancelled, then drains open connections.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn index() -> Result<Html<String>, AppError> {
    Ok(Html(IndexPage::empty().render()?))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ChatForm>,
) -> Result<Html<String>, AppError> {
    info!(prompt = %form.prompt, "chat request");

    let answers = match state.assistant.run(&form.prompt).await {
        Ok(answers) => answers,
        Err(source) => {
            error!(error = %source, "chat request failed");
            let page = IndexPage::failed(&form.prompt, source.to_string()).render()?;
            return Err(AppError::Assistant { source, page });
        }
    };

    let answer = answers.first().map(String::as_str).unwrap_or_default();
    let page = IndexPage::answered(&form.prompt, answer, state.format).render()?;
    Ok(Html(page))
}

#[derive(Debug)]
pub enum AppError {
    /// The orchestrator failed; `page` is the form rendered with the error.
    Assistant { source: Error, page: String },
    Render(askama::Error),
}

impl From<askama::Error> for AppError {
    fn from(value: askama::Error) -> Self {
        AppError::Render(value)
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::Api(_) | Error::ToolArguments { .. } => StatusCode::BAD_GATEWAY,
        Error::ToolSchema(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Assistant { source, page } => (status_for(&source), Html(page)).into_response(),
            AppError::Render(error) => {
                error!(%error, "failed to render page");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpenAiError;
    use std::time::Duration;

    #[test]
    fn timeouts_and_upstream_errors_map_to_gateway_statuses() {
        let timeout = Error::Timeout {
            run_id: "run_1".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(status_for(&timeout), StatusCode::GATEWAY_TIMEOUT);

        let api = Error::Api(OpenAiError::new("bad key".to_string(), "unknown".to_string()));
        assert_eq!(status_for(&api), StatusCode::BAD_GATEWAY);

        let cancelled = Error::Cancelled {
            run_id: "run_1".to_string(),
        };
        assert_eq!(status_for(&cancelled), StatusCode::SERVICE_UNAVAILABLE);
    }
}
