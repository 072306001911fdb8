//! HTTP decision backend.
//!
//! Posts the [`DecisionRequest`] as JSON and expects an [`AgentAction`]
//! back, e.g. `{"type": "move", "to": {"x": 12, "y": 10}}`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use simstate_core::{AgentAction, DecisionError, DecisionMaker, DecisionRequest, Error, Result};

/// Decision function behind an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpDecider {
    client: Client,
    url: String,
}

impl HttpDecider {
    /// Creates a decider posting to `url`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a non-HTTP URL or when the client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Invalid decider URL '{url}'. Allowed schemes: http, https"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DecisionMaker for HttpDecider {
    async fn decide(&self, request: &DecisionRequest) -> std::result::Result<AgentAction, DecisionError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| DecisionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, body));
        }

        let action: AgentAction = response
            .json()
            .await
            .map_err(|e| DecisionError::InvalidResponse(e.to_string()))?;
        debug!(agent_id = %request.agent_id, action = action.kind(), "decision received");
        Ok(action)
    }
}

/// Server errors and throttling are transient; other failures are final.
fn classify(status: StatusCode, body: String) -> DecisionError {
    let message = format!("{status}: {body}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        DecisionError::Unavailable(message)
    } else {
        DecisionError::Rejected(message)
    }
}
