use std::time::Duration;
use thiserror::Error;

use crate::models::MutationKind;

/// transport-level failure, already translated into a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// the request never produced an http response (dns, refused, reset, bad body)
    #[error("Client Error: {0}")]
    Client(String),
    #[error("Client Error: request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Server Error: {status} - {status_text}")]
    Server { status: u16, status_text: String },
}

impl NetworkError {
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        match err.status() {
            Some(status) => NetworkError::Server {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            },
            None => NetworkError::Client(err.to_string()),
        }
    }
}

/// a candidate file or folder name was rejected locally
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Operation {0} not found")]
pub struct OperationNotFound(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Operation cancelled by user")]
pub struct CancelledError;

/// failure reported by a transport while moving file content
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// outcome of a failed rename / move / delete / create-directory
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// `message` is the classified, user-facing text
    #[error("{message}")]
    Failed {
        operation: MutationKind,
        message: String,
    },
}

impl OperationError {
    pub fn message(&self) -> &str {
        match self {
            OperationError::Invalid(err) => &err.message,
            OperationError::Failed { message, .. } => message,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("No login is waiting for a one-time code")]
    NoPendingLogin,
    #[error("Failed to persist session: {0}")]
    Storage(#[from] std::io::Error),
}
