use std::fmt;

use serde_json::Value;

pub type OperationId = String;

/// Remote long-running jobs the dashboard knows how to start and observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    ContinuationScan,
    ReversalScan,
    BreadthAnalysis,
    BhavcopyUpdate,
    /// Live trading bot session, observed by tailing its log endpoint.
    LiveBot,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::ContinuationScan,
        OperationKind::ReversalScan,
        OperationKind::BreadthAnalysis,
        OperationKind::BhavcopyUpdate,
        OperationKind::LiveBot,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OperationKind::ContinuationScan => "continuation scan",
            OperationKind::ReversalScan => "reversal scan",
            OperationKind::BreadthAnalysis => "breadth analysis",
            OperationKind::BhavcopyUpdate => "bhavcopy update",
            OperationKind::LiveBot => "live trading bot",
        }
    }

    /// True when progress is observed through the log endpoint instead of a status endpoint.
    pub fn is_log_tail(self) -> bool {
        matches!(self, OperationKind::LiveBot)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Error)
    }

    fn rank(self) -> u8 {
        match self {
            OperationStatus::Pending => 0,
            OperationStatus::Running => 1,
            OperationStatus::Completed | OperationStatus::Error => 2,
        }
    }

    /// `pending -> running -> (completed | error)`; staying in `running` is allowed.
    pub fn can_advance_to(self, next: OperationStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() > self.rank() || (self == OperationStatus::Running && next == self)
    }
}

/// Partial update for an [`Operation`]. Absent fields leave the current value alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationPatch {
    pub status: Option<OperationStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub log: Option<Vec<String>>,
}

impl OperationPatch {
    /// Patch carrying every field of `operation`.
    pub fn from_snapshot(operation: &Operation) -> Self {
        Self {
            status: Some(operation.status),
            progress: Some(operation.progress),
            message: Some(operation.message.clone()),
            result: operation.result.clone(),
            error: operation.error.clone(),
            log: Some(operation.log.clone()),
        }
    }
}

/// What happened to a poll response handed to [`Operation::apply_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDisposition {
    Applied,
    Unchanged,
    /// Sequence number at or below the last applied one.
    Stale,
    /// The operation already reached a terminal state.
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub progress: u8,
    pub message: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// Tail transcript for log-tailed kinds; empty otherwise.
    pub log: Vec<String>,
    last_seq: u64,
}

impl Operation {
    pub fn new(id: impl Into<OperationId>, kind: OperationKind, status: OperationStatus) -> Self {
        let status = if status.is_terminal() {
            OperationStatus::Pending
        } else {
            status
        };
        Self {
            id: id.into(),
            kind,
            status,
            progress: 0,
            message: format!("Starting {}...", kind.label()),
            result: None,
            error: None,
            log: Vec::new(),
            last_seq: 0,
        }
    }

    /// Terminal snapshot for a job whose start call was rejected. It carries no server id.
    pub fn rejected(kind: OperationKind, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            id: OperationId::new(),
            kind,
            status: OperationStatus::Error,
            progress: 0,
            message: format!("Failed to start {}", kind.label()),
            result: None,
            error: Some(error),
            log: Vec::new(),
            last_seq: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Applies the response of poll number `seq`, discarding anything older than what was
    /// already applied.
    pub fn apply_report(&mut self, seq: u64, patch: OperationPatch) -> ReportDisposition {
        if self.is_terminal() {
            return ReportDisposition::Finished;
        }
        if seq <= self.last_seq {
            return ReportDisposition::Stale;
        }
        self.last_seq = seq;
        if self.apply_patch(patch) {
            ReportDisposition::Applied
        } else {
            ReportDisposition::Unchanged
        }
    }

    /// Merges `patch` while keeping status transitions monotonic and progress non-decreasing.
    /// Returns whether anything changed.
    pub fn apply_patch(&mut self, patch: OperationPatch) -> bool {
        if self.is_terminal() {
            return false;
        }
        let before = self.clone();

        let next_status = match patch.status {
            Some(status) if self.status.can_advance_to(status) => status,
            _ => self.status,
        };
        if let Some(progress) = patch.progress {
            self.progress = self.progress.max(progress.min(100));
        }
        if let Some(message) = patch.message {
            self.message = message;
        }
        if let Some(log) = patch.log {
            self.log = log;
        }
        match next_status {
            OperationStatus::Completed => {
                if patch.result.is_some() {
                    self.result = patch.result;
                }
            }
            OperationStatus::Error => {
                self.error = Some(patch.error.unwrap_or_else(|| "Unknown error".to_string()));
            }
            OperationStatus::Pending | OperationStatus::Running => {}
        }
        self.status = next_status;

        *self != before
    }

    /// Forces a terminal error raised locally (for example after losing the server).
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        self.apply_patch(OperationPatch {
            status: Some(OperationStatus::Error),
            error: Some(error.into()),
            ..OperationPatch::default()
        })
    }
}
