use std::time::{Duration, Instant};

use serde_json::Value;

use crate::{MutationId, MutationOutcome, Operation, OperationId, OperationKind, Severity, WatchList};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User clicked the add/remove control for `symbol` as currently displayed.
    ToggleMembership {
        list: WatchList,
        symbol: String,
        current_membership: bool,
        metadata: Value,
    },
    /// User asked to reload a watch list from the server.
    RefreshMembership { list: WatchList },
    /// Server view of a watch list.
    MembershipLoaded { list: WatchList, symbols: Vec<String> },
    /// Remote add/remove finished.
    MutationSettled {
        mutation_id: MutationId,
        outcome: MutationOutcome,
    },
    /// User asked to start a remote job.
    StartOperation { kind: OperationKind, request: Value },
    /// Engine accepted a start and began polling.
    OperationStarted(Operation),
    /// Engine observed a new snapshot for a polled operation.
    OperationUpdated(Operation),
    /// The start call was rejected; no polling happens.
    OperationStartFailed { kind: OperationKind, error: String },
    /// User no longer watches this operation.
    StopObserving { id: OperationId },
    /// Attach to a bot that may already be running, without starting one.
    ObserveBot,
    /// User clicked Stop on the live bot.
    StopBot,
    StopBotFailed { error: String },
    Notify {
        text: String,
        severity: Severity,
        ttl: Option<Duration>,
    },
    Dismiss { toast_id: String },
    /// Timer tick driving toast expiry.
    Tick { now: Instant },
    /// Fallback for placeholder wiring.
    NoOp,
}
