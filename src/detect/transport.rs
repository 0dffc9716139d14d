use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use zeroize::Zeroizing;

use super::error::ProviderError;
use crate::config::AppConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Seam between the retry loop and the wire.
///
/// Implementations send one `generateContent` request body and return the raw
/// response body. Provider-side failures must surface as [`ProviderError`]
/// (possibly wrapped in context) so the caller can classify them.
pub trait DetectionTransport: Send + Sync {
    fn send(&self, body: &Value) -> Result<String>;
}

/// `generateContent` over HTTPS.
pub struct GeminiTransport {
    agent: ureq::Agent,
    url: String,
    api_key: Zeroizing<String>,
}

impl GeminiTransport {
    pub fn new(config: &AppConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .build();
        Self {
            agent,
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.clone(),
        }
    }
}

impl DetectionTransport for GeminiTransport {
    fn send(&self, body: &Value) -> Result<String> {
        let payload = serde_json::to_string(body).context("serialize generateContent request")?;
        log::debug!("POST {} ({} bytes)", self.url, payload.len());

        let response = self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .set("x-goog-api-key", self.api_key.as_str())
            .send_string(&payload);

        match response {
            Ok(response) => response
                .into_string()
                .context("read generateContent response body"),
            Err(ureq::Error::Status(status, response)) => {
                let text = response.into_string().unwrap_or_default();
                Err(ProviderError::new(Some(status), error_message(&text)).into())
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(ProviderError::new(None, transport.to_string()).into())
            }
        }
    }
}

/// Prefer `error.status` + `error.message` from a JSON error body, keeping
/// the raw text when the body is not JSON.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let error = &value["error"];
    match (error["status"].as_str(), error["message"].as_str()) {
        (Some(status), Some(message)) => format!("{}: {}", status, message),
        (None, Some(message)) => message.to_string(),
        _ => body.trim().to_string(),
    }
}
