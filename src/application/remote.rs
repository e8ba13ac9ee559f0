// Remote object traits for dashboard and widget persistence
use crate::domain::position::WidgetId;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The server holds a newer version than the one sent (HTTP 409).
    #[error("version conflict")]
    Conflict,
    #[error("permission denied")]
    PermissionDenied,
    #[error("not found")]
    NotFound,
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

impl RemoteError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            403 => RemoteError::PermissionDenied,
            404 => RemoteError::NotFound,
            409 => RemoteError::Conflict,
            _ => RemoteError::Status {
                status,
                message: message.into(),
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Conflict => Some(409),
            RemoteError::PermissionDenied => Some(403),
            RemoteError::NotFound => Some(404),
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::Transport(_) => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict)
    }
}

/// How to address a dashboard when fetching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardLookup {
    Id(i64),
    Slug(String),
}

/// Remote widget objects. Payloads and responses are wire objects carrying
/// `id`, `version` and whichever fields are being updated.
#[async_trait]
pub trait WidgetRemote: Send + Sync {
    /// Create (no id) or update a widget; returns the fields the server stored.
    async fn save_widget(&self, id: Option<WidgetId>, payload: Value) -> Result<Value, RemoteError>;

    async fn get_widget(&self, id: WidgetId) -> Result<Value, RemoteError>;
}

#[async_trait]
pub trait DashboardRemote: Send + Sync {
    /// `payload` must carry `id`, and `version` unless the update is
    /// version-agnostic.
    async fn save_dashboard(&self, payload: Value) -> Result<Value, RemoteError>;

    async fn get_dashboard(&self, lookup: &DashboardLookup) -> Result<Value, RemoteError>;

    /// Archive the dashboard. Nothing is destroyed.
    async fn archive_dashboard(&self, id: i64) -> Result<Value, RemoteError>;
}
