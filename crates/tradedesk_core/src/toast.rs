//! Transient notifications and their stacking slots.

use std::time::{Duration, Instant};

use tradedesk_logging::desk_debug;

pub type ToastId = String;

/// How long a toast stays up unless the caller overrides it.
pub const DEFAULT_TOAST_TTL: Duration = Duration::from_millis(3500);
/// Lead time before expiry during which a toast is marked as closing.
pub const CLOSING_LEAD: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: ToastId,
    pub text: String,
    pub severity: Severity,
    pub slot: usize,
    pub ttl: Duration,
    pub created_at: Instant,
    pub closing: bool,
}

impl Toast {
    fn closes_at(&self) -> Instant {
        self.created_at + self.ttl.saturating_sub(CLOSING_LEAD)
    }

    fn expires_at(&self) -> Instant {
        self.created_at + self.ttl
    }
}

/// Smallest non-negative integer missing from an ascending slice of occupied slots.
pub fn lowest_free_slot(occupied: &[usize]) -> usize {
    occupied
        .iter()
        .enumerate()
        .find(|(index, slot)| *index != **slot)
        .map(|(index, _)| index)
        .unwrap_or(occupied.len())
}

/// Owns every live toast. No upper bound: informational feedback is never dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastScheduler {
    toasts: Vec<Toast>,
    default_ttl: Duration,
    next_seq: u64,
}

impl Default for ToastScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_TTL)
    }
}

impl ToastScheduler {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            toasts: Vec::new(),
            default_ttl,
            next_seq: 0,
        }
    }

    pub fn notify(
        &mut self,
        text: impl Into<String>,
        severity: Severity,
        ttl: Option<Duration>,
        now: Instant,
    ) -> ToastId {
        self.next_seq += 1;
        let id = format!("toast-{}", self.next_seq);
        let slot = lowest_free_slot(&self.occupied_slots());
        let toast = Toast {
            id: id.clone(),
            text: text.into(),
            severity,
            slot,
            ttl: ttl.unwrap_or(self.default_ttl),
            created_at: now,
            closing: false,
        };
        desk_debug!("toast {} slot={} {:?}: {}", toast.id, slot, severity, toast.text);
        self.toasts.push(toast);
        id
    }

    /// Removes the toast immediately. Returns false for unknown or already expired ids.
    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.id != id);
        self.toasts.len() != before
    }

    /// Advances timers: marks toasts entering their closing window and drops expired ones.
    /// Returns whether anything visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        self.toasts.retain(|toast| {
            let alive = now < toast.expires_at();
            if !alive {
                desk_debug!("toast {} expired", toast.id);
                changed = true;
            }
            alive
        });
        for toast in self.toasts.iter_mut().filter(|toast| !toast.closing) {
            if now >= toast.closes_at() {
                toast.closing = true;
                changed = true;
            }
        }
        changed
    }

    /// Ascending slots held by live toasts.
    pub fn occupied_slots(&self) -> Vec<usize> {
        let mut slots: Vec<usize> = self.toasts.iter().map(|toast| toast.slot).collect();
        slots.sort_unstable();
        slots
    }

    pub fn get(&self, id: &str) -> Option<&Toast> {
        self.toasts.iter().find(|toast| toast.id == id)
    }

    /// Live toasts in creation order.
    pub fn live(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}
