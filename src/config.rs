use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_JPEG_QUALITY: u8 = 90;
const DEFAULT_OUTPUT_DIR: &str = "appraisal_out";

/// Credential variables, checked in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    model: Option<String>,
    endpoint: Option<String>,
    retry: Option<RetryConfigFile>,
    output: Option<OutputConfigFile>,
    limits: Option<LimitsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RetryConfigFile {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    jpeg_quality: Option<u8>,
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct LimitsConfigFile {
    max_video_bytes: Option<u64>,
}

#[derive(Clone)]
pub struct AppConfig {
    pub api_key: Zeroizing<String>,
    pub model: String,
    pub endpoint: String,
    pub retry: RetrySettings,
    pub output: OutputSettings,
    /// No limit when unset; the whole clip is always sent.
    pub max_video_bytes: Option<u64>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .field("output", &self.output)
            .field("max_video_bytes", &self.max_video_bytes)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub jpeg_quality: u8,
    pub dir: PathBuf,
}

impl AppConfig {
    /// Load config file (`APPRAISER_CONFIG`), apply env overrides, then
    /// validate. Fails before any network call when no credential is set.
    pub fn load() -> Result<Self> {
        let api_key = api_key_from_env()?;
        let config_path = std::env::var("APPRAISER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(api_key, file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults with the given credential; used by tests and embedders that
    /// manage their own configuration.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self::from_file(Zeroizing::new(api_key.into()), AppConfigFile::default())
    }

    fn from_file(api_key: Zeroizing<String>, file: AppConfigFile) -> Self {
        let model = file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let endpoint = file
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let retry = RetrySettings {
            max_attempts: file
                .retry
                .as_ref()
                .and_then(|retry| retry.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            base_delay: Duration::from_millis(
                file.retry
                    .as_ref()
                    .and_then(|retry| retry.base_delay_ms)
                    .unwrap_or(DEFAULT_BASE_DELAY_MS),
            ),
        };
        let output = OutputSettings {
            jpeg_quality: file
                .output
                .as_ref()
                .and_then(|output| output.jpeg_quality)
                .unwrap_or(DEFAULT_JPEG_QUALITY),
            dir: file
                .output
                .and_then(|output| output.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        };
        let max_video_bytes = file.limits.and_then(|limits| limits.max_video_bytes);
        Self {
            api_key,
            model,
            endpoint,
            retry,
            output,
            max_video_bytes,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(model) = std::env::var("APPRAISER_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if let Ok(endpoint) = std::env::var("APPRAISER_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint.trim().to_string();
            }
        }
        if let Ok(attempts) = std::env::var("APPRAISER_MAX_ATTEMPTS") {
            self.retry.max_attempts = attempts
                .trim()
                .parse()
                .map_err(|_| anyhow!("APPRAISER_MAX_ATTEMPTS must be a positive integer"))?;
        }
        if let Ok(delay) = std::env::var("APPRAISER_BASE_DELAY_MS") {
            let millis: u64 = delay.trim().parse().map_err(|_| {
                anyhow!("APPRAISER_BASE_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.retry.base_delay = Duration::from_millis(millis);
        }
        if let Ok(limit) = std::env::var("APPRAISER_MAX_VIDEO_BYTES") {
            let bytes: u64 = limit
                .trim()
                .parse()
                .map_err(|_| anyhow!("APPRAISER_MAX_VIDEO_BYTES must be an integer byte count"))?;
            self.max_video_bytes = Some(bytes);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(anyhow!("output.jpeg_quality must be within 1..=100"));
        }
        if self.model.contains('/') || self.model.contains('?') {
            return Err(anyhow!("model '{}' is not a bare model id", self.model));
        }
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid endpoint '{}': {}", self.endpoint, e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "endpoint must use http(s), got '{}'",
                endpoint.scheme()
            ));
        }
        self.endpoint = self.endpoint.trim_end_matches('/').to_string();
        if self.max_video_bytes == Some(0) {
            return Err(anyhow!("limits.max_video_bytes must be greater than zero"));
        }
        Ok(())
    }
}

fn api_key_from_env() -> Result<Zeroizing<String>> {
    for var in API_KEY_VARS {
        if let Ok(key) = std::env::var(var) {
            if !key.trim().is_empty() {
                return Ok(Zeroizing::new(key.trim().to_string()));
            }
        }
    }
    Err(anyhow!(
        "missing API credential: set {} in the environment",
        API_KEY_VARS[0]
    ))
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
