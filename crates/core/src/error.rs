// Central Error Type for the Application

use thiserror::Error;

use crate::application::component_manager::ComponentError;
use crate::domain::DomainError;

/// Status codes shared by stub replies, RPC errors and task outcomes
pub mod code {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_ARGUMENT: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const UNSUPPORTED_OPERATION: i32 = 4005;
    pub const NOT_SUPPORTED: i32 = 4006;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const OPERATION_FAILED: i32 = 5003;
    pub const TIMEOUT: i32 = 5004;
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable status code for this error
    pub fn code(&self) -> i32 {
        match self {
            AppError::Domain(DomainError::InvalidStateTransition { .. }) => code::CONFLICT,
            AppError::Domain(_) => code::INVALID_ARGUMENT,
            AppError::Validation(_) => code::INVALID_ARGUMENT,
            AppError::Serialization(_) => code::INVALID_ARGUMENT,
            AppError::UnsupportedOperation(_) => code::UNSUPPORTED_OPERATION,
            AppError::NotFound(_) => code::NOT_FOUND,
            AppError::Conflict(_) => code::CONFLICT,
            AppError::InvalidState(_) => code::CONFLICT,
            AppError::Timeout(_) => code::TIMEOUT,
            AppError::Component(e) => e.code(),
            AppError::Internal(_) => code::INTERNAL_ERROR,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
