//! Watch-list membership with optimistic toggles.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type MutationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WatchList {
    Continuation,
    Reversal,
}

impl WatchList {
    pub fn label(self) -> &'static str {
        match self {
            WatchList::Continuation => "continuation",
            WatchList::Reversal => "reversal",
        }
    }
}

impl fmt::Display for WatchList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    Add,
    Remove,
}

impl MembershipAction {
    /// The action that inverts `current_membership`.
    pub fn toggling(current_membership: bool) -> Self {
        if current_membership {
            MembershipAction::Remove
        } else {
            MembershipAction::Add
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            MembershipAction::Add => "add",
            MembershipAction::Remove => "remove",
        }
    }
}

/// Local flip awaiting confirmation from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticMutation {
    pub id: MutationId,
    pub list: WatchList,
    pub target_key: String,
    pub action: MembershipAction,
    pub prior_membership: bool,
}

impl OptimisticMutation {
    /// Compensating action captured at mutation start.
    pub fn compensation(&self) -> Compensation {
        Compensation {
            list: self.list,
            target_key: self.target_key.clone(),
            present: self.prior_membership,
        }
    }
}

/// Restores `target_key` to exactly the membership it had when the mutation began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compensation {
    pub list: WatchList,
    pub target_key: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Committed,
    /// Duplicate add; the member is present, which is what the user asked for.
    Conflict,
    Failed { reason: String },
}

/// A mutation that has settled, with what the store did about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub mutation: OptimisticMutation,
    pub outcome: MutationOutcome,
    pub rolled_back: bool,
}

/// Membership sets for every watch list plus the mutations still in flight.
///
/// Toggles on the same key are not serialized: each captures its own prior membership, so
/// interleaved failures can leave a state that differs from the latest intent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MembershipSet {
    members: BTreeMap<WatchList, BTreeSet<String>>,
    in_flight: BTreeMap<MutationId, OptimisticMutation>,
    next_id: MutationId,
}

impl MembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, list: WatchList, key: &str) -> bool {
        self.members
            .get(&list)
            .is_some_and(|members| members.contains(key))
    }

    /// Sorted members of `list`.
    pub fn members(&self, list: WatchList) -> Vec<String> {
        self.members
            .get(&list)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces `list` with the server's view.
    pub fn replace(&mut self, list: WatchList, keys: impl IntoIterator<Item = String>) {
        self.members.insert(list, keys.into_iter().collect());
    }

    /// Flips `key` away from `current_membership` and records the pending mutation.
    pub fn begin_toggle(
        &mut self,
        list: WatchList,
        key: &str,
        current_membership: bool,
    ) -> OptimisticMutation {
        self.next_id += 1;
        let mutation = OptimisticMutation {
            id: self.next_id,
            list,
            target_key: key.to_string(),
            action: MembershipAction::toggling(current_membership),
            prior_membership: current_membership,
        };
        self.set(list, key, !current_membership);
        self.in_flight.insert(mutation.id, mutation.clone());
        mutation
    }

    /// Resolves a pending mutation. Unknown ids yield `None`.
    pub fn settle(&mut self, id: MutationId, outcome: MutationOutcome) -> Option<Settlement> {
        let mutation = self.in_flight.remove(&id)?;
        let rolled_back = match outcome {
            MutationOutcome::Committed => false,
            MutationOutcome::Conflict if mutation.action == MembershipAction::Add => {
                self.set(mutation.list, &mutation.target_key, true);
                false
            }
            MutationOutcome::Conflict | MutationOutcome::Failed { .. } => {
                self.apply(&mutation.compensation());
                true
            }
        };
        Some(Settlement {
            mutation,
            outcome,
            rolled_back,
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn apply(&mut self, compensation: &Compensation) {
        self.set(compensation.list, &compensation.target_key, compensation.present);
    }

    fn set(&mut self, list: WatchList, key: &str, present: bool) {
        let members = self.members.entry(list).or_default();
        if present {
            members.insert(key.to_string());
        } else {
            members.remove(key);
        }
    }
}
