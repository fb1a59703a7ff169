//! Error handling for the checkout backend
//!
//! Every flow returns `AppResult`. An `AppError` knows its HTTP status, the
//! code clients branch on, and whether retrying can help.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::error::DatabaseError;
use crate::services::order_state::TransitionError;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "INVALID_STATE_TRANSITION")]
    InvalidStateTransition,
    #[serde(rename = "PAYMENT_DECLINED")]
    PaymentDeclined,
    #[serde(rename = "DUPLICATE_ORDER")]
    DuplicateOrder,

    // Infrastructure errors (5xx)
    #[serde(rename = "STORAGE_ERROR")]
    StorageError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 429)
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No order with the given id or reference
    OrderNotFound { order_id: String },
    /// The order's (method, status) does not permit the requested action
    InvalidStateTransition {
        order_id: String,
        action: String,
        reason: String,
    },
    /// The gateway answered a capture with a non-success status
    PaymentDeclined { order_id: String, status: String },
    /// An order with this id already exists
    DuplicateOrder { order_id: String },
}

/// Infrastructure-level errors (storage, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Order or transaction store failure
    Storage { message: String },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors (payment gateway)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Payment gateway call failed or returned an error status
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// Rate limit exceeded
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Cart missing or without line items
    EmptyCart,
    /// Required field missing or blank
    MissingField { field: String },
    /// Field present but unusable
    InvalidField { field: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn not_found(order_id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::OrderNotFound {
            order_id: order_id.into(),
        }))
    }

    pub fn conflict(
        order_id: impl Into<String>,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::InvalidStateTransition {
            order_id: order_id.into(),
            action: action.into(),
            reason: reason.into(),
        }))
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.into(),
        }))
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => 404,
                DomainError::InvalidStateTransition { .. } => 409, // Conflict
                DomainError::PaymentDeclined { .. } => 402,        // Payment Required
                DomainError::DuplicateOrder { .. } => 409,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Storage { .. } => 500,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => 502, // Bad Gateway
                ExternalError::RateLimit { .. } => 429,       // Too Many Requests
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
                DomainError::PaymentDeclined { .. } => ErrorCode::PaymentDeclined,
                DomainError::DuplicateOrder { .. } => ErrorCode::DuplicateOrder,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Storage { .. } => ErrorCode::StorageError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { order_id } => {
                    format!("Order '{}' not found", order_id)
                }
                DomainError::InvalidStateTransition {
                    order_id,
                    action,
                    reason,
                } => format!("Cannot {} order '{}': {}", action, order_id, reason),
                DomainError::PaymentDeclined { order_id, status } => format!(
                    "Payment for order '{}' was not successful (gateway status: {})",
                    order_id, status
                ),
                DomainError::DuplicateOrder { order_id } => {
                    format!("Order '{}' already exists", order_id)
                }
            },
            AppErrorKind::Infrastructure(InfrastructureError::Configuration { .. }) => {
                "Payment service configuration error".to_string()
            }
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider {
                    provider,
                    message,
                    is_retryable,
                } => {
                    if *is_retryable {
                        format!(
                            "Payment provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        format!("Payment provider ({}) rejected the request: {}", provider, message)
                    }
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!(
                            "Rate limit exceeded for {}. Please try again later",
                            service
                        )
                    }
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::EmptyCart => "Cart is required and must not be empty".to_string(),
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Storage { .. } => true,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let kind = match err {
            DatabaseError::NotFound { id } => {
                AppErrorKind::Domain(DomainError::OrderNotFound { order_id: id })
            }
            DatabaseError::Duplicate { id } => {
                AppErrorKind::Domain(DomainError::DuplicateOrder { order_id: id })
            }
            DatabaseError::StatusConflict {
                id,
                expected,
                actual,
            } => AppErrorKind::Domain(DomainError::InvalidStateTransition {
                order_id: id,
                action: "update".to_string(),
                reason: format!("expected status {} but found {}", expected, actual),
            }),
            DatabaseError::Unavailable { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Storage { message })
            }
        };
        AppError::new(kind)
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        let order_id = err.order_id().to_string();
        AppError::new(AppErrorKind::Domain(DomainError::InvalidStateTransition {
            order_id,
            action: err.action().to_string(),
            reason: err.to_string(),
        }))
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
