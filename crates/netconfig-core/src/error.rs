use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::PendingState;

#[derive(Debug, Error)]
pub enum NetconfigError {
    #[error("not initialized: run 'netconfig init'")]
    NotInitialized,

    #[error("invalid time directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("conflicting directives: '{first}' and '{second}' cannot both be set")]
    ConflictingDirective { first: String, second: String },

    #[error("revert at {revert_at} must be strictly later than commit at {commit_at}")]
    InvalidDirectiveOrder { commit_at: String, revert_at: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("device '{device}' communication error: {reason}")]
    DeviceComm { device: String, reason: String },

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("unable to find commit #{0}")]
    UnknownOrTerminalCommit(String),

    #[error("invalid transition for commit #{commit_id} from {from}: {reason}")]
    InvalidTransition {
        commit_id: String,
        from: PendingState,
        reason: String,
    },

    #[error("pending registry error: {0}")]
    Registry(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Machine-readable category carried by failed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotInitialized,
    InvalidDirective,
    ConflictingDirective,
    TemplateError,
    DeviceCommError,
    UnknownDevice,
    UnknownOrTerminalCommit,
    InvalidTransition,
    Registry,
    Io,
}

impl NetconfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::InvalidDirective { .. } | Self::InvalidDirectiveOrder { .. } => {
                ErrorKind::InvalidDirective
            }
            Self::ConflictingDirective { .. } => ErrorKind::ConflictingDirective,
            Self::Template(_) => ErrorKind::TemplateError,
            Self::DeviceComm { .. } => ErrorKind::DeviceCommError,
            Self::UnknownDevice(_) => ErrorKind::UnknownDevice,
            Self::UnknownOrTerminalCommit(_) => ErrorKind::UnknownOrTerminalCommit,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Registry(_) => ErrorKind::Registry,
            Self::Io(_) | Self::Yaml(_) | Self::Json(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn device(device: &str, reason: impl Into<String>) -> Self {
        Self::DeviceComm {
            device: device.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_directive(directive: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDirective {
            directive: directive.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetconfigError>;
