use std::time::{Duration, Instant};

use serde_json::Value;
use tradedesk_core::{
    update, AppState, AppViewModel, Msg, Operation, OperationId, OperationKind, Severity,
    ToastId, WatchList,
};
use tradedesk_engine::{ApiError, EngineHandle};

use crate::config::DeskConfig;
use crate::effects::EffectRunner;

/// Owns the store and the engine; the single place where messages meet effects.
///
/// All methods run on the caller's thread. Remote results only land during [`Coordinator::pump`].
pub struct Coordinator {
    state: AppState,
    effects: EffectRunner,
}

impl Coordinator {
    pub fn new(config: &DeskConfig) -> Result<Self, ApiError> {
        let engine = EngineHandle::new(config.api_settings(), config.poll_settings())?;
        Ok(Self::with_engine(engine, config.toast_ttl()))
    }

    pub fn with_engine(engine: EngineHandle, toast_ttl: Duration) -> Self {
        Self {
            state: AppState::new().with_toast_ttl(toast_ttl),
            effects: EffectRunner::new(engine),
        }
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.effects.run(effects);
    }

    /// Applies pending engine events, then advances the clock. Returns whether the view changed.
    pub fn pump(&mut self, now: Instant) -> bool {
        for msg in self.effects.collect() {
            self.dispatch(msg);
        }
        self.dispatch(Msg::Tick { now });
        self.state.consume_dirty()
    }

    /// Flips `symbol` in `list` away from `current_membership`; the outcome arrives as a toast.
    pub fn toggle(
        &mut self,
        list: WatchList,
        symbol: impl Into<String>,
        current_membership: bool,
        metadata: Value,
    ) {
        self.dispatch(Msg::ToggleMembership {
            list,
            symbol: symbol.into(),
            current_membership,
            metadata,
        });
    }

    pub fn notify(
        &mut self,
        text: impl Into<String>,
        severity: Severity,
        ttl: Option<Duration>,
    ) -> ToastId {
        self.state.notify(text, severity, ttl)
    }

    pub fn dismiss(&mut self, toast_id: &str) {
        self.state.dismiss(toast_id);
    }

    pub fn start_operation(&mut self, kind: OperationKind, request: Value) {
        self.dispatch(Msg::StartOperation { kind, request });
    }

    pub fn stop_observing(&mut self, id: impl Into<OperationId>) {
        self.dispatch(Msg::StopObserving { id: id.into() });
    }

    /// Follows the bot log if the bot is already running. Nothing is tracked otherwise.
    pub fn observe_bot(&mut self) {
        self.dispatch(Msg::ObserveBot);
    }

    pub fn stop_bot(&mut self) {
        self.dispatch(Msg::StopBot);
    }

    pub fn refresh(&mut self, list: WatchList) {
        self.dispatch(Msg::RefreshMembership { list });
    }

    pub fn operation(&self, id: &str) -> Option<&Operation> {
        self.state.operation(id)
    }

    pub fn list(&self) -> Vec<&Operation> {
        self.state.operations()
    }

    pub fn is_member(&self, list: WatchList, symbol: &str) -> bool {
        self.state.is_member(list, symbol)
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    /// True while anything is tracked, pending or on screen.
    pub fn is_busy(&self) -> bool {
        self.effects.awaiting() > 0 || self.state.is_busy()
    }
}
