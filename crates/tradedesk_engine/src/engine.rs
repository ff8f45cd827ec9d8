use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tradedesk_core::{MutationId, MutationOutcome, OperationId, OperationKind, WatchList};
use tradedesk_logging::{desk_debug, desk_info, desk_warn};

use crate::poller::{OperationHandle, OperationPoller, PollSettings};
use crate::{ApiError, ApiSettings, DeskApi, EngineEvent, ReqwestDeskApi};

enum EngineCommand {
    StartOperation {
        kind: OperationKind,
        request: Value,
    },
    CancelPolling {
        id: OperationId,
    },
    ObserveBot,
    StopBot,
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
}

type PollingTable = Arc<Mutex<HashMap<OperationId, CancellationToken>>>;

/// Runs remote work on a background tokio runtime and reports back through [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(api: ApiSettings, polling: PollSettings) -> Result<Self, ApiError> {
        let api = ReqwestDeskApi::new(api)?;
        Self::with_api(Arc::new(api), polling)
    }

    pub fn with_api(api: Arc<dyn DeskApi>, polling: PollSettings) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|err| {
                ApiError::new(crate::FailureKind::Network, format!("tokio runtime: {err}"))
            })?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let poller = Arc::new(OperationPoller::new(api.clone(), polling));
        let polling_table: PollingTable = Arc::new(Mutex::new(HashMap::new()));

        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                if let EngineCommand::CancelPolling { id } = &command {
                    cancel_polling(&polling_table, id);
                    continue;
                }
                let api = api.clone();
                let poller = poller.clone();
                let table = polling_table.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(api.as_ref(), &poller, &table, command, event_tx).await;
                });
            }
            desk_debug!("engine command channel closed");
            runtime.shutdown_background();
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn start_operation(&self, kind: OperationKind, request: Value) {
        self.send(EngineCommand::StartOperation { kind, request });
    }

    pub fn cancel_polling(&self, id: impl Into<OperationId>) {
        self.send(EngineCommand::CancelPolling { id: id.into() });
    }

    pub fn observe_bot(&self) {
        self.send(EngineCommand::ObserveBot);
    }

    pub fn stop_bot(&self) {
        self.send(EngineCommand::StopBot);
    }

    pub fn add_member(
        &self,
        mutation_id: MutationId,
        list: WatchList,
        symbol: impl Into<String>,
        metadata: Value,
    ) {
        self.send(EngineCommand::AddMember {
            mutation_id,
            list,
            symbol: symbol.into(),
            metadata,
        });
    }

    pub fn remove_member(&self, mutation_id: MutationId, list: WatchList, symbol: impl Into<String>) {
        self.send(EngineCommand::RemoveMember {
            mutation_id,
            list,
            symbol: symbol.into(),
        });
    }

    pub fn load_members(&self, list: WatchList) {
        self.send(EngineCommand::LoadMembers { list });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            desk_warn!("engine thread is gone; command dropped");
        }
    }
}

fn cancel_polling(table: &PollingTable, id: &str) {
    let token = table.lock().ok().and_then(|mut table| table.remove(id));
    match token {
        Some(token) => {
            desk_info!("cancelled polling for {}", id);
            token.cancel();
        }
        None => desk_debug!("no active polling for {}", id),
    }
}

async fn handle_command(
    api: &dyn DeskApi,
    poller: &OperationPoller,
    table: &PollingTable,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::StartOperation { kind, request } => {
            let handle = poller.start(kind, request).await;
            let first = handle.snapshot();
            if first.id.is_empty() {
                let error = first.error.unwrap_or_else(|| "Unknown error".to_string());
                let _ = event_tx.send(EngineEvent::OperationStartFailed { kind, error });
                return;
            }

            follow(handle, table, &event_tx).await;
        }
        EngineCommand::CancelPolling { id } => cancel_polling(table, &id),
        EngineCommand::ObserveBot => match poller.observe_bot().await {
            Ok(Some(handle)) => follow(handle, table, &event_tx).await,
            Ok(None) => {
                let _ = event_tx.send(EngineEvent::BotIdle);
            }
            Err(err) => {
                desk_warn!("reading bot status failed: {}", err);
                let _ = event_tx.send(EngineEvent::ObserveBotFailed {
                    error: err.to_string(),
                });
            }
        },
        EngineCommand::StopBot => {
            let event = match api.stop_bot().await {
                Ok(()) => {
                    desk_info!("bot stop acknowledged");
                    EngineEvent::BotStopped
                }
                Err(err) => {
                    desk_warn!("stop bot failed: {}", err);
                    EngineEvent::StopBotFailed {
                        error: err.to_string(),
                    }
                }
            };
            let _ = event_tx.send(event);
        }
        EngineCommand::AddMember {
            mutation_id,
            list,
            symbol,
            metadata,
        } => {
            let outcome = match api.add_member(list, &symbol, &metadata).await {
                Ok(()) => MutationOutcome::Committed,
                Err(err) if err.is_conflict() => MutationOutcome::Conflict,
                Err(err) => MutationOutcome::Failed {
                    reason: err.to_string(),
                },
            };
            desk_debug!("add {} to {} settled: {:?}", symbol, list, outcome);
            let _ = event_tx.send(EngineEvent::MutationSettled {
                mutation_id,
                outcome,
            });
        }
        EngineCommand::RemoveMember {
            mutation_id,
            list,
            symbol,
        } => {
            let outcome = match api.remove_member(list, &symbol).await {
                Ok(()) => MutationOutcome::Committed,
                Err(err) => MutationOutcome::Failed {
                    reason: err.to_string(),
                },
            };
            desk_debug!("remove {} from {} settled: {:?}", symbol, list, outcome);
            let _ = event_tx.send(EngineEvent::MutationSettled {
                mutation_id,
                outcome,
            });
        }
        EngineCommand::LoadMembers { list } => match api.list_members(list).await {
            Ok(symbols) => {
                let _ = event_tx.send(EngineEvent::MembersLoaded { list, symbols });
            }
            Err(err) => desk_warn!("loading {} list failed: {}", list, err),
        },
    }
}

/// Announces a tracked operation and forwards its snapshots until it ends or is cancelled.
async fn follow(
    handle: OperationHandle,
    table: &PollingTable,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    let first = handle.snapshot();
    if let Ok(mut table) = table.lock() {
        if let Some(previous) = table.insert(first.id.clone(), handle.cancel_token()) {
            desk_debug!("replacing earlier polling for {}", first.id);
            previous.cancel();
        }
    }
    let _ = event_tx.send(EngineEvent::OperationStarted(first.clone()));

    let mut updates = handle.subscribe();
    let mut terminal = first.is_terminal();
    while !terminal && updates.changed().await.is_ok() {
        if handle.is_cancelled() {
            break;
        }
        let snapshot = updates.borrow_and_update().clone();
        terminal = snapshot.is_terminal();
        if event_tx.send(EngineEvent::OperationUpdated(snapshot)).is_err() {
            break;
        }
    }
    // A cancelled handle was already removed from the table or replaced in it.
    if !handle.is_cancelled() {
        if let Ok(mut table) = table.lock() {
            table.remove(&first.id);
        }
    }
}
