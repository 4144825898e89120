use serde_json::Value;
use thiserror::Error;

pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    LlmService,
    Processing,
    Configuration,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::LlmService => "LLM_SERVICE_ERROR",
            ErrorKind::Processing => "PROCESSING_ERROR",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
        }
    }

    /// Message that is safe to show to the caller for this kind.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Validation => "Invalid request parameters",
            ErrorKind::LlmService => "Unable to process text. Please try again.",
            ErrorKind::Processing => "Text processing failed. Please try again.",
            ErrorKind::Configuration => "Service temporarily unavailable",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{} ({}): {message}", .kind.code(), .field.as_deref().unwrap_or("-"))]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
    pub field: Option<String>,
    pub details: Option<Value>,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message).with_field(field)
    }

    pub fn llm_service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmService, message)
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Processing, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    /// Opaque code carried in `details.error_code`, falling back to the kind code.
    pub fn error_code(&self) -> &str {
        self.details
            .as_ref()
            .and_then(|d| d.get("error_code"))
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| self.kind.code())
    }

    /// Text for the caller. Validation messages are authored here and never
    /// embed user input, so they are passed through; everything else goes
    /// through the fixed lookup table.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Validation => format!("Invalid request: {}", self.message),
            other => other.user_message().to_string(),
        }
    }
}
