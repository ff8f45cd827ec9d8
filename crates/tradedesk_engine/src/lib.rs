//! Tradedesk engine: REST client, operation polling and effect execution.
mod client;
mod engine;
mod poller;
mod types;

pub use client::{list_path, start_path, status_path, ApiSettings, DeskApi, ReqwestDeskApi};
pub use engine::EngineHandle;
pub use poller::{OperationHandle, OperationPoller, PollSettings, BOT_OBSERVER_ID};
pub use types::{ApiError, BotLogLine, BotLogs, EngineEvent, FailureKind, StartAck};
