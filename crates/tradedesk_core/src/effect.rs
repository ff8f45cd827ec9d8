use serde_json::Value;

use crate::{MutationId, OperationId, OperationKind, WatchList};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartOperation {
        kind: OperationKind,
        request: Value,
    },
    AddMember {
        mutation_id: MutationId,
        list: WatchList,
        symbol: String,
        metadata: Value,
    },
    RemoveMember {
        mutation_id: MutationId,
        list: WatchList,
        symbol: String,
    },
    LoadMembers {
        list: WatchList,
    },
    /// Stop polling locally; the remote job keeps running.
    CancelPolling {
        id: OperationId,
    },
    /// Tail the bot log without a start call; tracked only if the bot is running.
    ObserveBot,
    StopBot,
}
