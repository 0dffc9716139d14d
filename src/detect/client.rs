use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use super::error::is_transient;
use super::prompt::{build_prompt, response_schema};
use super::response::{extract_text, parse_detection};
use super::transport::{DetectionTransport, GeminiTransport};
use crate::config::{AppConfig, RetrySettings};
use crate::model::{Detection, DetectionRequest};

/// Bounded exponential backoff for transient provider failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: settings.base_delay,
        }
    }
}

/// In-memory video payload ready for transport.
#[derive(Clone, Debug)]
pub struct VideoPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl VideoPayload {
    /// Read a video file, optionally refusing clips over `max_bytes`.
    pub fn read(path: &Path, max_bytes: Option<u64>) -> Result<Self> {
        if let Some(limit) = max_bytes {
            let size = std::fs::metadata(path)
                .with_context(|| format!("stat video {}", path.display()))?
                .len();
            if size > limit {
                return Err(anyhow!(
                    "video {} is {} bytes, over the configured limit of {} bytes",
                    path.display(),
                    size,
                    limit
                ));
            }
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("read video {}", path.display()))?;
        Ok(Self {
            mime_type: mime_type_for(path).to_string(),
            bytes,
        })
    }
}

/// Detection client: builds the request, calls the model and retries
/// transient failures with exponential backoff.
pub struct DetectionClient {
    transport: Box<dyn DetectionTransport>,
    policy: RetryPolicy,
    sleep: Box<dyn Fn(Duration) + Send + Sync>,
    max_video_bytes: Option<u64>,
}

impl DetectionClient {
    pub fn new(transport: Box<dyn DetectionTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            sleep: Box::new(std::thread::sleep),
            max_video_bytes: None,
        }
    }

    /// Client backed by the real provider, configured from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut client = Self::new(
            Box::new(GeminiTransport::new(config)),
            RetryPolicy::from(&config.retry),
        );
        client.max_video_bytes = config.max_video_bytes;
        client
    }

    /// Replace the backoff sleep (tests record delays instead of waiting).
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run detection for a validated request.
    pub fn detect_request(&self, request: &DetectionRequest) -> Result<Detection> {
        let video = VideoPayload::read(&request.video_path, self.max_video_bytes)?;
        self.detect(&video, &request.targets)
    }

    /// Send the video and target names to the model and parse the result.
    ///
    /// Returns an empty detection (raw `[]`) when nothing matched. Any
    /// terminal failure returns no partial results.
    pub fn detect(&self, video: &VideoPayload, targets: &[String]) -> Result<Detection> {
        if targets.is_empty() {
            return Err(anyhow!("at least one target name is required"));
        }
        let body = build_request_body(video, targets);
        log::info!(
            "requesting detection of [{}] in {} byte {} clip",
            targets.join(", "),
            video.bytes.len(),
            video.mime_type
        );

        let text = self.send_with_retry(&body)?;
        let detection = parse_detection(&text)?;
        log::info!("model reported {} object(s)", detection.objects.len());
        Ok(detection)
    }

    /// Send `body` until the model text comes back or a failure is terminal.
    /// Error envelopes inside a 200 body are classified like HTTP failures.
    fn send_with_retry(&self, body: &Value) -> Result<String> {
        let mut delay = self.policy.base_delay;
        let mut attempt = 1;
        loop {
            let outcome = self
                .transport
                .send(body)
                .and_then(|response| extract_text(&response));
            match outcome {
                Ok(text) => return Ok(text),
                Err(err) if is_transient(&err) && attempt < self.policy.max_attempts => {
                    log::warn!(
                        "model unavailable (attempt {}/{}): {}; retrying in {:?}",
                        attempt,
                        self.policy.max_attempts,
                        err,
                        delay
                    );
                    (self.sleep)(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err.context(format!(
                        "detection failed after {} attempt(s)",
                        attempt
                    )))
                }
            }
        }
    }
}

/// `generateContent` body: video first, then the instruction, with
/// schema-constrained JSON output.
pub fn build_request_body(video: &VideoPayload, targets: &[String]) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "inlineData": { "mimeType": video.mime_type, "data": STANDARD.encode(&video.bytes) } },
                { "text": build_prompt(targets) }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    })
}

/// MIME type from the file extension; unknown extensions go out as mp4 and
/// the provider decides.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mov" | "qt" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",
        "3gp" => "video/3gpp",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        _ => "video/mp4",
    }
}
