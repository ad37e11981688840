use serde::Serialize;
use thiserror::Error;

use crate::models::Stage;

/// Every failure the client and the orchestrator can surface.
///
/// `Parse` is kept apart from `Service` so logs can tell a broken payload from
/// a refused call, but both abort a run the same way.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArtistryError {
    #[error("{0}")]
    Validation(String),
    #[error("{stage} failed: {message}")]
    Service {
        stage: Stage,
        status: Option<u16>,
        message: String,
    },
    #[error("{stage} failed: unreadable response ({message})")]
    Parse { stage: Stage, message: String },
}

pub type Result<T, E = ArtistryError> = std::result::Result<T, E>;

impl ArtistryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn service(stage: Stage, message: impl Into<String>) -> Self {
        Self::Service { stage, status: None, message: message.into() }
    }

    pub fn status(stage: Stage, status: u16, message: impl Into<String>) -> Self {
        Self::Service { stage, status: Some(status), message: message.into() }
    }

    pub fn parse(stage: Stage, message: impl Into<String>) -> Self {
        Self::Parse { stage, message: message.into() }
    }

    /// Stage the failure belongs to; validation errors happen before any stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Validation(_) => None,
            Self::Service { stage, .. } | Self::Parse { stage, .. } => Some(*stage),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// The error as shown to observers of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    pub stage: Option<Stage>,
    pub message: String,
}

impl From<&ArtistryError> for LastError {
    fn from(err: &ArtistryError) -> Self {
        Self { stage: err.stage(), message: err.to_string() }
    }
}
