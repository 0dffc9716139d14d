/// Failure reported by the model provider (HTTP status and/or body text).
///
/// Whether a failure is worth retrying is decided from its content, not its
/// type: the provider signals overload through status 503 or an
/// "overloaded"/"UNAVAILABLE" marker in the error body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        if self.status == Some(503) {
            return true;
        }
        let message = self.message.to_lowercase();
        message.contains("overloaded") || message.contains("unavailable")
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "provider error (HTTP {}): {}", status, self.message),
            None => write!(f, "provider error: {}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Inspect an error chain for a transient provider failure.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ProviderError>())
        .any(ProviderError::is_transient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn status_503_is_transient() {
        assert!(ProviderError::new(Some(503), "Service Unavailable").is_transient());
        assert!(ProviderError::new(Some(503), "").is_transient());
    }

    #[test]
    fn overload_markers_are_transient_regardless_of_status() {
        assert!(ProviderError::new(Some(500), "The model is overloaded. Please try again later.")
            .is_transient());
        assert!(ProviderError::new(None, r#"{"status":"UNAVAILABLE"}"#).is_transient());
    }

    #[test]
    fn client_errors_are_terminal() {
        assert!(!ProviderError::new(Some(400), "Request payload size exceeds the limit")
            .is_transient());
        assert!(!ProviderError::new(Some(429), "Resource has been exhausted").is_transient());
        assert!(!ProviderError::new(Some(403), "API key not valid").is_transient());
    }

    #[test]
    fn classification_sees_through_context() {
        let err = anyhow::Error::new(ProviderError::new(Some(503), "busy"))
            .context("generateContent");
        assert!(is_transient(&err));

        let plain: anyhow::Result<()> = Err(anyhow::anyhow!("unexpected response shape"));
        let plain = plain.context("generateContent").unwrap_err();
        assert!(!is_transient(&plain));
    }
}
