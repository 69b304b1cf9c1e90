//! Unified error handling system
//!
//! Every failure the client can observe is classified into one of the
//! variants below. Controllers never let these escape as fatal states: they
//! store [`BankError::user_message`] as the message of the operation that
//! failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

pub type BankResult<T> = Result<T, BankError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the Smart Bank client
#[derive(Error, Debug)]
pub enum BankError {
    /// A local precondition failed; no request was issued.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    /// Registration or login rejected, or the credential was refused.
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        context: ErrorContext,
    },

    /// Business-rule rejection from the ledger. The message is the
    /// service's own text.
    #[error("Rejected by ledger: {message}")]
    Conflict {
        message: String,
        status: u16,
        context: ErrorContext,
    },

    #[error("Resource not found: {message}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// No response was received.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Not signed in")]
    SessionRequired { context: ErrorContext },

    #[error("Operation already in progress: {operation}")]
    Busy {
        operation: String,
        context: ErrorContext,
    },

    #[error("Invalid transition: {message}")]
    InvalidTransition {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BankError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            BankError::Validation { context, .. } => Some(context),
            BankError::Authentication { context, .. } => Some(context),
            BankError::Conflict { context, .. } => Some(context),
            BankError::NotFound { context, .. } => Some(context),
            BankError::Network { context, .. } => Some(context),
            BankError::SessionRequired { context } => Some(context),
            BankError::Busy { context, .. } => Some(context),
            BankError::InvalidTransition { context, .. } => Some(context),
            BankError::Config { context, .. } => Some(context),
            BankError::Storage { context, .. } => Some(context),
            BankError::Io(_) | BankError::Serialization(_) => None,
        }
    }

    /// The text shown to the user, without the class prefix used by `Display`.
    pub fn user_message(&self) -> String {
        match self {
            BankError::Validation { message, .. }
            | BankError::Authentication { message, .. }
            | BankError::Conflict { message, .. }
            | BankError::NotFound { message, .. }
            | BankError::Network { message, .. }
            | BankError::InvalidTransition { message, .. }
            | BankError::Config { message, .. }
            | BankError::Storage { message, .. } => message.clone(),
            BankError::SessionRequired { .. } => "Please log in to continue.".to_string(),
            BankError::Busy { operation, .. } => {
                format!("{} is already in progress.", operation)
            }
            BankError::Io(e) => e.to_string(),
            BankError::Serialization(e) => e.to_string(),
        }
    }

    /// True when the failure was detected locally and nothing reached the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BankError::Validation { .. }
                | BankError::SessionRequired { .. }
                | BankError::Busy { .. }
                | BankError::InvalidTransition { .. }
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self {
            BankError::Network { .. } => {
                warn!(error_id = ?error_id, error = %self, "Ledger unreachable");
            }
            BankError::Validation { .. } | BankError::Busy { .. } => {
                warn!(error_id = ?error_id, error = %self, "Request refused locally");
            }
            BankError::Config { .. } | BankError::Storage { .. } | BankError::Io(_) => {
                error!(error_id = ?error_id, error = %self, "Configuration or storage error");
            }
            _ => {
                error!(error_id = ?error_id, error = %self, "Error occurred");
            }
        }
    }
}

/// Turns a failed response into the text shown to the user.
///
/// A non-empty `detail` string in the body is used verbatim. A structured
/// `detail` (the ledger reports schema violations as a list of objects) is
/// rendered as compact JSON instead of being dropped. Anything else falls
/// back to `fallback`, which callers set to the transport-level description.
pub fn failure_message(body: Option<&Value>, fallback: &str) -> String {
    match body.and_then(|b| b.get("detail")) {
        Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
        Some(Value::Null) | Some(Value::String(_)) | Some(Value::Bool(false)) | None => {
            fallback.to_string()
        }
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => fallback.to_string(),
        Some(structured) => structured.to_string(),
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::BankError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::BankError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'smartbank config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($msg:expr, $component:expr) => {
        $crate::BankError::NotFound {
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Refresh the account list and try again"),
        }
    };
}
