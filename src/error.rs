//! Error types for the Partner Center Sell provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// An error response returned by the Partner Center Sell API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {message}")]
pub struct ApiError {
    /// HTTP status code of the response.
    pub status: u16,
    /// Message extracted from the response body.
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Create a 404 error for the given path.
    pub fn not_found(path: &str) -> Self {
        Self::new(404, format!("{} was not found", path))
    }

    /// Whether the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Errors that can occur while managing Partner Center Sell resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A call to the Partner Center Sell API failed.
    #[error("{operation} failed: {source}")]
    Api {
        /// The API operation that failed, e.g. `UpdateProduct`.
        operation: &'static str,
        /// The error returned by the transport.
        #[source]
        source: ApiError,
    },

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Wrap a transport error with the name of the API operation that produced it.
    pub fn api(operation: &'static str, source: ApiError) -> Self {
        Self::Api { operation, source }
    }

    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Api { operation, source } => format!("{} failed: {}", operation, source),
        }
    }

    /// Whether this error means the remote object is gone.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        let summary = match &err {
            ProviderError::NotFound(_) => "Resource not found",
            ProviderError::Validation(_) => "Invalid configuration",
            ProviderError::Configuration(_) => "Provider configuration error",
            ProviderError::UnknownResource(_) => "Unknown resource type",
            ProviderError::Serialization(_) => "Malformed value",
            ProviderError::Api { .. } => "Partner Center Sell API error",
            ProviderError::FailedPrecondition(_) => "Operation not allowed",
            ProviderError::InvalidRequest(_) => "Invalid request",
        };
        Diagnostic::error(summary).with_detail(err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("custom_resource".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: custom_resource");
    }

    #[test]
    fn test_api_error_display() {
        let err = ProviderError::api("GetProduct", ApiError::new(500, "boom"));
        assert_eq!(format!("{}", err), "GetProduct failed: HTTP 500: boom");
        assert_eq!(err.message(), "GetProduct failed: HTTP 500: boom");
    }

    #[test]
    fn test_is_not_found() {
        assert!(ProviderError::api("GetProduct", ApiError::not_found("/products/x")).is_not_found());
        assert!(ProviderError::NotFound("x".to_string()).is_not_found());
        assert!(!ProviderError::api("GetProduct", ApiError::new(403, "denied")).is_not_found());
        assert!(!ProviderError::Validation("x".to_string()).is_not_found());
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::InvalidRequest("bad request".to_string());
        assert_eq!(err.message(), "bad request");
    }

    #[test]
    fn test_error_to_diagnostic() {
        let diag: Diagnostic = ProviderError::FailedPrecondition("no".to_string()).into();
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Operation not allowed");
        assert_eq!(diag.detail, Some("no".to_string()));
    }
}
