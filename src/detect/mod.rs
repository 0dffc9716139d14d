//! Detection client for the external vision-language model.
//!
//! All detection and pricing happens remotely. This module packages the
//! video and instructions, classifies provider failures for retry, and
//! validates the structured response.

mod client;
mod error;
mod prompt;
mod response;
mod transport;

pub use client::{build_request_body, mime_type_for, DetectionClient, RetryPolicy, VideoPayload};
pub use error::{is_transient, ProviderError};
pub use prompt::{build_prompt, response_schema};
pub use response::{extract_text, parse_detection};
pub use transport::{DetectionTransport, GeminiTransport};
