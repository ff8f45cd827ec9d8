use tradedesk_core::{Effect, Msg, Severity};
use tradedesk_engine::{EngineEvent, EngineHandle};
use tradedesk_logging::{desk_debug, desk_info};

/// Executes reducer effects on the engine and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    /// Start, observe and stop requests sent but not yet answered.
    awaiting: usize,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            awaiting: 0,
        }
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartOperation { kind, request } => {
                    desk_info!("StartOperation kind={} request={}", kind, request);
                    self.awaiting += 1;
                    self.engine.start_operation(kind, request);
                }
                Effect::AddMember {
                    mutation_id,
                    list,
                    symbol,
                    metadata,
                } => {
                    desk_debug!("AddMember mutation={} list={} symbol={}", mutation_id, list, symbol);
                    self.engine.add_member(mutation_id, list, symbol, metadata);
                }
                Effect::RemoveMember {
                    mutation_id,
                    list,
                    symbol,
                } => {
                    desk_debug!(
                        "RemoveMember mutation={} list={} symbol={}",
                        mutation_id,
                        list,
                        symbol
                    );
                    self.engine.remove_member(mutation_id, list, symbol);
                }
                Effect::LoadMembers { list } => self.engine.load_members(list),
                Effect::CancelPolling { id } => self.engine.cancel_polling(id),
                Effect::ObserveBot => {
                    desk_info!("ObserveBot");
                    self.awaiting += 1;
                    self.engine.observe_bot();
                }
                Effect::StopBot => {
                    self.awaiting += 1;
                    self.engine.stop_bot();
                }
            }
        }
    }

    /// Drains every event the engine has produced so far.
    pub fn collect(&mut self) -> Vec<Msg> {
        let mut inbox = Vec::new();
        while let Some(event) = self.engine.try_recv() {
            if answers_request(&event) {
                self.awaiting = self.awaiting.saturating_sub(1);
            }
            inbox.push(map_event(event));
        }
        inbox
    }

    pub fn awaiting(&self) -> usize {
        self.awaiting
    }
}

fn answers_request(event: &EngineEvent) -> bool {
    matches!(
        event,
        EngineEvent::OperationStarted(_)
            | EngineEvent::OperationStartFailed { .. }
            | EngineEvent::BotIdle
            | EngineEvent::ObserveBotFailed { .. }
            | EngineEvent::BotStopped
            | EngineEvent::StopBotFailed { .. }
    )
}

pub fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::OperationStarted(operation) => Msg::OperationStarted(operation),
        EngineEvent::OperationUpdated(operation) => Msg::OperationUpdated(operation),
        EngineEvent::OperationStartFailed { kind, error } => {
            Msg::OperationStartFailed { kind, error }
        }
        EngineEvent::MutationSettled {
            mutation_id,
            outcome,
        } => Msg::MutationSettled {
            mutation_id,
            outcome,
        },
        EngineEvent::MembersLoaded { list, symbols } => Msg::MembershipLoaded { list, symbols },
        EngineEvent::BotIdle => Msg::Notify {
            text: "Bot is not running".to_string(),
            severity: Severity::Warning,
            ttl: None,
        },
        EngineEvent::ObserveBotFailed { error } => Msg::Notify {
            text: format!("Failed to read bot status: {error}"),
            severity: Severity::Error,
            ttl: None,
        },
        EngineEvent::BotStopped => Msg::Notify {
            text: "Bot stopped".to_string(),
            severity: Severity::Success,
            ttl: None,
        },
        EngineEvent::StopBotFailed { error } => Msg::StopBotFailed { error },
    }
}
