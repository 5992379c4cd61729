use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a PTY-backed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Starting,
    Running,
    Exited,
    Error,
}

impl SessionStatus {
    pub fn is_running(self) -> bool {
        self == SessionStatus::Running
    }
}

/// A session record as the backend publishes it.
///
/// The gateway never caches these; they are parsed for a single
/// request/response cycle and fields it does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub command: String,
    #[serde(rename = "cwd", default)]
    pub working_directory: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cols: u16,
    #[serde(default)]
    pub rows: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "updatedAt",
        alias = "lastActivityAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    /// Explicit status if the backend sent one, otherwise inferred from the
    /// `active` flag and exit code.
    pub fn effective_status(&self) -> SessionStatus {
        if let Some(status) = self.status {
            return status;
        }
        match (self.active, self.exit_code) {
            (_, Some(0)) => SessionStatus::Exited,
            (_, Some(_)) => SessionStatus::Error,
            (Some(false), None) => SessionStatus::Exited,
            _ => SessionStatus::Running,
        }
    }
}
