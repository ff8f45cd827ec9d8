use std::time::{Duration, Instant};

use crate::membership::MembershipSet;
use crate::registry::OperationRegistry;
use crate::toast::{Severity, ToastId, ToastScheduler};
use crate::view_model::{AppViewModel, OperationRow, ToastView};
use crate::{Operation, WatchList};

/// The whole client-side store. Each slice is mutated only through the reducer or the
/// entry points below.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    clock: Instant,
    operations: OperationRegistry,
    watchlists: MembershipSet,
    toasts: ToastScheduler,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::with_clock(Instant::now())
    }

    pub fn with_clock(now: Instant) -> Self {
        Self {
            clock: now,
            operations: OperationRegistry::new(),
            watchlists: MembershipSet::new(),
            toasts: ToastScheduler::default(),
            dirty: false,
        }
    }

    /// Overrides the default toast lifetime.
    pub fn with_toast_ttl(mut self, ttl: Duration) -> Self {
        self.toasts = ToastScheduler::new(ttl);
        self
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            operations: self
                .operations
                .list()
                .into_iter()
                .map(OperationRow::from)
                .collect(),
            toasts: self.toasts.live().iter().map(ToastView::from).collect(),
            continuation: self.watchlists.members(WatchList::Continuation),
            reversal: self.watchlists.members(WatchList::Reversal),
            dirty: self.dirty,
        }
    }

    /// Shows a notification at the current logical time.
    pub fn notify(
        &mut self,
        text: impl Into<String>,
        severity: Severity,
        ttl: Option<Duration>,
    ) -> ToastId {
        self.dirty = true;
        self.toasts.notify(text, severity, ttl, self.clock)
    }

    pub fn dismiss(&mut self, toast_id: &str) -> bool {
        let removed = self.toasts.dismiss(toast_id);
        self.dirty |= removed;
        removed
    }

    pub fn operation(&self, id: &str) -> Option<&Operation> {
        self.operations.get(id)
    }

    pub fn operations(&self) -> Vec<&Operation> {
        self.operations.list()
    }

    pub fn is_member(&self, list: WatchList, symbol: &str) -> bool {
        self.watchlists.contains(list, symbol)
    }

    pub fn toasts(&self) -> &ToastScheduler {
        &self.toasts
    }

    pub fn clock(&self) -> Instant {
        self.clock
    }

    /// True while an operation is tracked, a mutation is pending or a toast is visible.
    pub fn is_busy(&self) -> bool {
        !self.operations.is_empty() || self.watchlists.in_flight() > 0 || !self.toasts.is_empty()
    }

    /// Returns whether the state changed since the last call, resetting the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn advance_clock(&mut self, now: Instant) {
        self.clock = self.clock.max(now);
        if self.toasts.tick(self.clock) {
            self.dirty = true;
        }
    }

    pub(crate) fn operations_mut(&mut self) -> &mut OperationRegistry {
        &mut self.operations
    }

    pub(crate) fn watchlists_mut(&mut self) -> &mut MembershipSet {
        &mut self.watchlists
    }
}
