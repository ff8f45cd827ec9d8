use tradedesk_logging::{desk_debug, desk_info, desk_warn};

use crate::{
    AppState, Effect, MembershipAction, Msg, MutationOutcome, Operation, OperationPatch,
    OperationStatus, Settlement, Severity,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ToggleMembership {
            list,
            symbol,
            current_membership,
            metadata,
        } => {
            let mutation = state
                .watchlists_mut()
                .begin_toggle(list, &symbol, current_membership);
            // Optimistic: report success before the server answers.
            let text = match mutation.action {
                MembershipAction::Add => format!("Added {symbol} to {list} list"),
                MembershipAction::Remove => format!("Removed {symbol} from {list} list"),
            };
            state.notify(text, Severity::Success, None);
            desk_debug!(
                "mutation {} {} {} on {} list",
                mutation.id,
                mutation.action.verb(),
                symbol,
                list
            );
            match mutation.action {
                MembershipAction::Add => vec![Effect::AddMember {
                    mutation_id: mutation.id,
                    list,
                    symbol,
                    metadata,
                }],
                MembershipAction::Remove => vec![Effect::RemoveMember {
                    mutation_id: mutation.id,
                    list,
                    symbol,
                }],
            }
        }
        Msg::RefreshMembership { list } => vec![Effect::LoadMembers { list }],
        Msg::MembershipLoaded { list, symbols } => {
            state.watchlists_mut().replace(list, symbols);
            state.mark_dirty();
            Vec::new()
        }
        Msg::MutationSettled {
            mutation_id,
            outcome,
        } => {
            if let Some(settlement) = state.watchlists_mut().settle(mutation_id, outcome) {
                state.mark_dirty();
                report_settlement(&mut state, &settlement);
            }
            Vec::new()
        }
        Msg::StartOperation { kind, request } => {
            vec![Effect::StartOperation { kind, request }]
        }
        Msg::OperationStarted(operation) => {
            desk_info!("tracking {} {}", operation.kind, operation.id);
            let id = operation.id.clone();
            if operation.is_terminal() {
                announce_terminal(&mut state, &operation);
            }
            state.operations_mut().register(id, operation);
            state.mark_dirty();
            Vec::new()
        }
        Msg::OperationUpdated(operation) => {
            apply_operation_update(&mut state, &operation);
            Vec::new()
        }
        Msg::OperationStartFailed { kind, error } => {
            state.notify(
                format!("Failed to start {kind}: {error}"),
                Severity::Error,
                None,
            );
            Vec::new()
        }
        Msg::StopObserving { id } => {
            if state.operations_mut().unregister(&id).is_some() {
                state.mark_dirty();
            }
            vec![Effect::CancelPolling { id }]
        }
        Msg::ObserveBot => vec![Effect::ObserveBot],
        Msg::StopBot => vec![Effect::StopBot],
        Msg::StopBotFailed { error } => {
            state.notify(
                format!("Failed to stop bot: {error}"),
                Severity::Error,
                None,
            );
            Vec::new()
        }
        Msg::Notify {
            text,
            severity,
            ttl,
        } => {
            state.notify(text, severity, ttl);
            Vec::new()
        }
        Msg::Dismiss { toast_id } => {
            state.dismiss(&toast_id);
            Vec::new()
        }
        Msg::Tick { now } => {
            state.advance_clock(now);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn report_settlement(state: &mut AppState, settlement: &Settlement) {
    let mutation = &settlement.mutation;
    let symbol = &mutation.target_key;
    let list = mutation.list;
    match &settlement.outcome {
        MutationOutcome::Committed => {}
        MutationOutcome::Conflict if mutation.action == MembershipAction::Add => {
            state.notify(
                format!("{symbol} is already in the {list} list"),
                Severity::Warning,
                None,
            );
        }
        MutationOutcome::Conflict | MutationOutcome::Failed { .. } => {
            desk_warn!(
                "mutation {} failed ({:?}); restored {} to {}",
                mutation.id,
                settlement.outcome,
                symbol,
                if mutation.prior_membership { "present" } else { "absent" }
            );
            let text = match mutation.action {
                MembershipAction::Add => format!("Failed to add {symbol} to {list} list"),
                MembershipAction::Remove => format!("Failed to remove {symbol} from {list} list"),
            };
            state.notify(text, Severity::Error, None);
        }
    }
}

fn apply_operation_update(state: &mut AppState, operation: &Operation) {
    let patch = OperationPatch::from_snapshot(operation);
    let Some(change) = state.operations_mut().update(&operation.id, patch) else {
        return;
    };
    state.mark_dirty();
    if change.became_terminal() {
        announce_terminal(state, operation);
    }
}

/// The single notification for an operation reaching `completed` or `error`.
fn announce_terminal(state: &mut AppState, operation: &Operation) {
    match operation.status {
        OperationStatus::Completed => {
            desk_info!("{} {} completed", operation.kind, operation.id);
            state.notify(
                format!("{} completed", capitalize(operation.kind.label())),
                Severity::Success,
                None,
            );
        }
        OperationStatus::Error => {
            let error = operation.error.as_deref().unwrap_or("Unknown error");
            desk_warn!("{} {} failed: {}", operation.kind, operation.id, error);
            state.notify(
                format!("{} failed: {error}", capitalize(operation.kind.label())),
                Severity::Error,
                None,
            );
        }
        OperationStatus::Pending | OperationStatus::Running => {}
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
