// src/backend/error.rs
use crate::models::common::CodeId;
use candid::CandidType;
use serde::Deserialize;
use thiserror::Error;

/// Classification of failures reported by the Google Group APIs.
#[derive(CandidType, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupApiErrorKind {
    Authentication,
    NotFound,
    AccessDenied,
    NetworkError,
}

#[derive(CandidType, Deserialize, Error, Clone, Debug, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct GroupApiError {
    pub kind: GroupApiErrorKind,
    pub message: String,
}

impl GroupApiError {
    pub fn new(kind: GroupApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GroupApiErrorKind::NetworkError, message)
    }

    /// Maps an HTTP status returned by the Directory or Groups Settings API.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 => GroupApiErrorKind::Authentication,
            403 if body.to_ascii_lowercase().contains("insufficient") => {
                GroupApiErrorKind::Authentication
            }
            403 => GroupApiErrorKind::AccessDenied,
            404 => GroupApiErrorKind::NotFound,
            _ => GroupApiErrorKind::NetworkError,
        };
        Self::new(kind, format!("HTTP {}: {}", status, body))
    }
}

#[derive(CandidType, Deserialize, Error, Clone, Debug, PartialEq, Eq)]
pub enum SignupError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("App already exists: {0}")]
    AppAlreadyExists(String),

    #[error("Authentication required, return to {return_to}")]
    AuthenticationRequired { return_to: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Promotional code {0} was already redeemed")]
    RedemptionConflict(CodeId),

    #[error("Tester already registered: {0}")]
    TesterAlreadyExists(String),

    #[error("Group API failure ({kind:?}): {message}")]
    ExternalService {
        kind: GroupApiErrorKind,
        message: String,
    },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal canister error: {0}")]
    InternalError(String),
}

impl SignupError {
    /// Errors that are shown to the end user as distinct messages.
    /// Everything else is logged and replaced with a generic failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            SignupError::NotFound(_)
                | SignupError::AppAlreadyExists(_)
                | SignupError::AuthenticationRequired { .. }
                | SignupError::PermissionDenied(_)
                | SignupError::InvalidInput(_)
        )
    }
}

impl From<GroupApiError> for SignupError {
    fn from(err: GroupApiError) -> Self {
        SignupError::ExternalService {
            kind: err.kind,
            message: err.message,
        }
    }
}

impl From<validator::ValidationErrors> for SignupError {
    fn from(err: validator::ValidationErrors) -> Self {
        SignupError::InvalidInput(err.to_string())
    }
}
