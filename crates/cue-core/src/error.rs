//! Error types for the CUE synthesis core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("no agent hosted on peer {0}")]
    NoAgent(String),

    #[error("consensus not initialized")]
    ConsensusNotInitialized,

    #[error("collaborator failure: {collaborator} - {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// Validation errors are fatal only to the call that raised them.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::Collaborator { .. })
    }
}
