//! Tradedesk core: pure state machine for operations, watch lists and notifications.
mod effect;
mod membership;
mod msg;
mod operation;
mod registry;
mod state;
mod toast;
mod update;
mod view_model;

pub use effect::Effect;
pub use membership::{
    Compensation, MembershipAction, MembershipSet, MutationId, MutationOutcome,
    OptimisticMutation, Settlement, WatchList,
};
pub use msg::Msg;
pub use operation::{
    Operation, OperationId, OperationKind, OperationPatch, OperationStatus, ReportDisposition,
};
pub use registry::{OperationRegistry, StatusChange};
pub use state::AppState;
pub use toast::{
    lowest_free_slot, Severity, Toast, ToastId, ToastScheduler, CLOSING_LEAD, DEFAULT_TOAST_TTL,
};
pub use update::update;
pub use view_model::{AppViewModel, OperationRow, ToastView};
