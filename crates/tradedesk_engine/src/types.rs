use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tradedesk_core::{
    MutationId, MutationOutcome, Operation, OperationId, OperationKind, OperationPatch,
    OperationStatus, WatchList,
};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    OperationStarted(Operation),
    OperationUpdated(Operation),
    OperationStartFailed {
        kind: OperationKind,
        error: String,
    },
    MutationSettled {
        mutation_id: MutationId,
        outcome: MutationOutcome,
    },
    MembersLoaded {
        list: WatchList,
        symbols: Vec<String>,
    },
    /// Observation was requested but the bot is not running.
    BotIdle,
    ObserveBotFailed {
        error: String,
    },
    BotStopped,
    StopBotFailed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == FailureKind::HttpStatus(409)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    /// The server answered 2xx but the payload does not describe a started job.
    Rejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Rejected => write!(f, "rejected"),
        }
    }
}

/// Accepted start call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAck {
    pub id: OperationId,
    pub status: OperationStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartResponse {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub process_id: Option<Value>,
}

impl StartResponse {
    pub(crate) fn into_ack(self, kind: OperationKind) -> Result<StartAck, ApiError> {
        let status = match self.status.as_deref() {
            // The bot start answer carries no status field.
            None if kind.is_log_tail() => OperationStatus::Pending,
            None => {
                return Err(ApiError::new(
                    FailureKind::Rejected,
                    "start response carried no status",
                ))
            }
            Some("started") | Some("pending") => OperationStatus::Pending,
            Some("running") => OperationStatus::Running,
            Some(other) => {
                return Err(ApiError::new(
                    FailureKind::Rejected,
                    format!("unexpected start status {other:?}"),
                ))
            }
        };

        if kind.is_log_tail() {
            let id = match self.process_id {
                Some(Value::Number(pid)) => format!("live-bot-{pid}"),
                Some(Value::String(pid)) if !pid.is_empty() => format!("live-bot-{pid}"),
                _ => crate::BOT_OBSERVER_ID.to_string(),
            };
            return Ok(StartAck { id, status });
        }

        match self.operation_id {
            Some(id) if !id.is_empty() => Ok(StartAck { id, status }),
            _ => Err(ApiError::new(
                FailureKind::Rejected,
                "start response carried no operation_id",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    pub(crate) fn into_patch(self) -> Result<OperationPatch, ApiError> {
        let status = match self.status.as_str() {
            "pending" | "started" => OperationStatus::Pending,
            "running" => OperationStatus::Running,
            "completed" => OperationStatus::Completed,
            "error" => OperationStatus::Error,
            other => {
                return Err(ApiError::new(
                    FailureKind::Decode,
                    format!("unknown operation status {other:?}"),
                ))
            }
        };
        Ok(OperationPatch {
            status: Some(status),
            progress: self.progress.map(clamp_progress),
            message: self.message,
            result: self.result,
            error: self.error,
            log: None,
        })
    }
}

fn clamp_progress(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotLogLine {
    pub timestamp: String,
    pub message: String,
}

impl BotLogLine {
    /// `[HH:MM:SS] message`, or the raw timestamp when it cannot be parsed.
    pub fn formatted(&self) -> String {
        let time = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|ts| ts.format("%H:%M:%S").to_string())
            .or_else(|_| {
                NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|ts| ts.format("%H:%M:%S").to_string())
            })
            .unwrap_or_else(|_| self.timestamp.clone());
        format!("[{time}] {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotLogs {
    pub is_running: bool,
    #[serde(default)]
    pub logs: Vec<BotLogLine>,
}

impl BotLogs {
    pub fn formatted_lines(&self) -> Vec<String> {
        self.logs.iter().map(BotLogLine::formatted).collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MembersResponse {
    #[serde(default)]
    pub stocks: Vec<MemberEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberEntry {
    pub symbol: String,
}
