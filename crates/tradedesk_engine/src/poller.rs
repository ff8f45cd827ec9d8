use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tradedesk_core::{
    Operation, OperationId, OperationKind, OperationPatch, OperationStatus, ReportDisposition,
};
use tradedesk_logging::{desk_debug, desk_error, desk_info, desk_warn};

use crate::{ApiError, BotLogs, DeskApi};

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub scan_interval: Duration,
    pub data_interval: Duration,
    pub tail_interval: Duration,
    /// Wait before the single flush poll once the bot reports it stopped.
    pub tail_flush_delay: Duration,
    pub tail_error_backoff: Duration,
    /// Consecutive failed polls tolerated before the operation is failed locally.
    pub max_consecutive_failures: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(1000),
            data_interval: Duration::from_millis(2000),
            tail_interval: Duration::from_millis(500),
            tail_flush_delay: Duration::from_millis(1000),
            tail_error_backoff: Duration::from_millis(1000),
            max_consecutive_failures: 10,
        }
    }
}

impl PollSettings {
    pub fn interval_for(&self, kind: OperationKind) -> Duration {
        match kind {
            OperationKind::ContinuationScan
            | OperationKind::ReversalScan
            | OperationKind::BreadthAnalysis => self.scan_interval,
            OperationKind::BhavcopyUpdate => self.data_interval,
            OperationKind::LiveBot => self.tail_interval,
        }
    }
}

/// Caller's view of one polled operation.
///
/// Dropping the handle does not stop polling; call [`OperationHandle::cancel`].
#[derive(Debug, Clone)]
pub struct OperationHandle {
    snapshot: watch::Receiver<Operation>,
    cancel: CancellationToken,
}

impl OperationHandle {
    pub fn snapshot(&self) -> Operation {
        self.snapshot.borrow().clone()
    }

    pub fn id(&self) -> OperationId {
        self.snapshot.borrow().id.clone()
    }

    /// Stops polling. The remote job is not told anything.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn subscribe(&self) -> watch::Receiver<Operation> {
        self.snapshot.clone()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves with the terminal snapshot, or the last one seen if polling was cancelled.
    pub async fn wait_terminal(&mut self) -> Operation {
        loop {
            let current = self.snapshot.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.snapshot.changed().await.is_err() {
                return self.snapshot.borrow().clone();
            }
        }
    }
}

pub struct OperationPoller {
    api: Arc<dyn DeskApi>,
    settings: PollSettings,
}

impl OperationPoller {
    pub fn new(api: Arc<dyn DeskApi>, settings: PollSettings) -> Self {
        Self { api, settings }
    }

    /// Calls the start endpoint and, when accepted, spawns the polling task.
    ///
    /// A rejected start yields a handle whose snapshot is already terminal; nothing is polled.
    pub async fn start(&self, kind: OperationKind, request: Value) -> OperationHandle {
        let cancel = CancellationToken::new();
        let ack = match self.api.start_operation(kind, &request).await {
            Ok(ack) => ack,
            Err(err) => {
                desk_warn!("start of {} rejected: {}", kind, err);
                let (_tx, rx) = watch::channel(Operation::rejected(kind, err.to_string()));
                return OperationHandle {
                    snapshot: rx,
                    cancel,
                };
            }
        };

        desk_info!("started {} {} ({:?})", kind, ack.id, ack.status);
        let (tx, rx) = watch::channel(Operation::new(ack.id.clone(), kind, ack.status));
        let task = PollTask {
            api: self.api.clone(),
            settings: self.settings.clone(),
            kind,
            id: ack.id,
            tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run());

        OperationHandle {
            snapshot: rx,
            cancel,
        }
    }

    /// Attaches to a bot that was started elsewhere, without calling the start endpoint.
    ///
    /// One logs poll decides: `Ok(None)` when the bot is not running, otherwise a handle whose
    /// tail polling continues from that first answer.
    pub async fn observe_bot(&self) -> Result<Option<OperationHandle>, ApiError> {
        let kind = OperationKind::LiveBot;
        let logs = self.api.bot_logs().await?;
        if !logs.is_running {
            desk_info!("{} is not running; nothing to observe", kind);
            return Ok(None);
        }

        let mut operation = Operation::new(BOT_OBSERVER_ID, kind, OperationStatus::Running);
        operation.apply_report(1, tail_patch(&logs));
        desk_info!("observing running {} ({} log lines)", kind, operation.log.len());
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(operation);
        let task = PollTask {
            api: self.api.clone(),
            settings: self.settings.clone(),
            kind,
            id: BOT_OBSERVER_ID.to_string(),
            tx,
            cancel: cancel.clone(),
        };
        let first_pause = self.settings.tail_interval;
        tokio::spawn(task.run_tail(1, first_pause));

        Ok(Some(OperationHandle {
            snapshot: rx,
            cancel,
        }))
    }
}

/// Id of a bot session attached to rather than started; the logs endpoint names no process.
pub const BOT_OBSERVER_ID: &str = "live-bot";

struct PollTask {
    api: Arc<dyn DeskApi>,
    settings: PollSettings,
    kind: OperationKind,
    id: OperationId,
    tx: watch::Sender<Operation>,
    cancel: CancellationToken,
}

impl PollTask {
    async fn run(self) {
        if self.kind.is_log_tail() {
            self.run_tail(0, Duration::ZERO).await;
        } else {
            self.run_status().await;
        }
    }

    async fn run_status(self) {
        let interval = self.settings.interval_for(self.kind);
        let mut seq: u64 = 0;
        let mut failures: u32 = 0;
        loop {
            if !self.pause(interval).await {
                return;
            }
            seq += 1;
            let response = self.api.operation_status(self.kind, &self.id).await;
            if self.discarded(seq) {
                return;
            }
            match response {
                Ok(patch) => {
                    failures = 0;
                    self.apply(seq, patch);
                }
                Err(err) => {
                    failures += 1;
                    if self.escalate(failures, &err) {
                        return;
                    }
                }
            }
            if self.finished() {
                return;
            }
        }
    }

    /// Tails the bot log. `seq` is the last poll already applied; the first poll waits
    /// `first_pause`.
    async fn run_tail(self, mut seq: u64, first_pause: Duration) {
        if !first_pause.is_zero() && !self.pause(first_pause).await {
            return;
        }
        let mut failures: u32 = 0;
        loop {
            seq += 1;
            let response = self.api.bot_logs().await;
            if self.discarded(seq) {
                return;
            }
            let logs = match response {
                Ok(logs) => logs,
                Err(err) => {
                    failures += 1;
                    if self.escalate(failures, &err) || !self.pause(self.settings.tail_error_backoff).await {
                        return;
                    }
                    continue;
                }
            };
            failures = 0;
            self.apply(seq, tail_patch(&logs));
            if logs.is_running {
                if !self.pause(self.settings.tail_interval).await {
                    return;
                }
                continue;
            }

            // Bot stopped: one trailing poll to pick up the last lines.
            if !self.pause(self.settings.tail_flush_delay).await {
                return;
            }
            seq += 1;
            let flush = self.api.bot_logs().await;
            if self.discarded(seq) {
                return;
            }
            let lines = match flush {
                Ok(logs) => Some(logs.formatted_lines()),
                Err(err) => {
                    desk_debug!("flush poll for {} failed: {}", self.id, err);
                    None
                }
            };
            self.tx.send_modify(|operation| {
                let lines = lines.unwrap_or_else(|| operation.log.clone());
                operation.apply_report(
                    seq,
                    OperationPatch {
                        status: Some(OperationStatus::Completed),
                        message: Some("Bot stopped".to_string()),
                        result: Some(Value::from(lines.clone())),
                        log: Some(lines),
                        ..OperationPatch::default()
                    },
                );
            });
            desk_info!("{} {} finished", self.kind, self.id);
            return;
        }
    }

    /// Sleeps unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn discarded(&self, seq: u64) -> bool {
        if self.cancel.is_cancelled() {
            desk_debug!("discarding poll #{} for cancelled {}", seq, self.id);
            return true;
        }
        false
    }

    fn apply(&self, seq: u64, patch: OperationPatch) {
        self.tx.send_if_modified(|operation| {
            operation.apply_report(seq, patch) == ReportDisposition::Applied
        });
    }

    /// Records a failed poll. Returns true once the failure cap forced a terminal error.
    fn escalate(&self, failures: u32, err: &ApiError) -> bool {
        let cap = self.settings.max_consecutive_failures.max(1);
        if failures < cap {
            desk_warn!(
                "poll for {} {} failed ({}/{}): {}",
                self.kind,
                self.id,
                failures,
                cap,
                err
            );
            return false;
        }
        desk_error!(
            "lost connection to {} {} after {} failed polls: {}",
            self.kind,
            self.id,
            failures,
            err
        );
        let message = format!("Lost connection to {} after {failures} failed polls", self.kind);
        self.tx.send_if_modified(|operation| operation.fail(message));
        true
    }

    fn finished(&self) -> bool {
        let operation = self.tx.borrow();
        if operation.is_terminal() {
            desk_info!("{} {} ended as {:?}", self.kind, self.id, operation.status);
            return true;
        }
        false
    }
}

fn tail_patch(logs: &BotLogs) -> OperationPatch {
    let lines = logs.formatted_lines();
    OperationPatch {
        status: Some(OperationStatus::Running),
        message: lines.last().cloned(),
        log: Some(lines),
        ..OperationPatch::default()
    }
}
