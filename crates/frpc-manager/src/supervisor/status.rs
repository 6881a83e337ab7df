//! Status snapshot types reported by the supervisor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::logs::LogEntry;
use crate::probe::ConnectionProbeResult;

/// How the last frpc process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRecord {
    pub exit_code: Option<i32>,
    /// Conventional name of the terminating signal, e.g. `SIGTERM`.
    pub signal: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Most recent spawn or runtime failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_exit: Option<ExitRecord>,
    pub last_error: Option<ErrorRecord>,
    pub logs: Vec<LogEntry>,
}

/// [`ProcessStatus`] plus a fresh reachability check of the configured server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusWithConnection {
    #[serde(flatten)]
    pub status: ProcessStatus,
    pub server_connection: ConnectionProbeResult,
}
