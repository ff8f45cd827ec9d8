use crate::{Operation, OperationKind, OperationStatus, Severity, Toast};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub operations: Vec<OperationRow>,
    pub toasts: Vec<ToastView>,
    pub continuation: Vec<String>,
    pub reversal: Vec<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRow {
    pub id: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    pub has_result: bool,
    pub log_lines: usize,
}

impl From<&Operation> for OperationRow {
    fn from(operation: &Operation) -> Self {
        Self {
            id: operation.id.clone(),
            kind: operation.kind,
            status: operation.status,
            progress: operation.progress,
            message: operation.message.clone(),
            error: operation.error.clone(),
            has_result: operation.result.is_some(),
            log_lines: operation.log.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastView {
    pub id: String,
    pub text: String,
    pub severity: Severity,
    pub slot: usize,
    pub closing: bool,
}

impl From<&Toast> for ToastView {
    fn from(toast: &Toast) -> Self {
        Self {
            id: toast.id.clone(),
            text: toast.text.clone(),
            severity: toast.severity,
            slot: toast.slot,
            closing: toast.closing,
        }
    }
}
