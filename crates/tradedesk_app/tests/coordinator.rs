use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tradedesk_app::{map_event, Coordinator};
use tradedesk_core::{
    Msg, MutationOutcome, Operation, OperationKind, OperationPatch, OperationStatus, Severity,
    WatchList,
};
use tradedesk_engine::{
    ApiError, BotLogs, DeskApi, EngineEvent, EngineHandle, FailureKind, PollSettings, StartAck,
};

/// Backend answering status polls from a script and mutations with a fixed result.
#[derive(Default)]
struct CannedApi {
    statuses: Mutex<VecDeque<OperationPatch>>,
    mutation: Mutex<Option<ApiError>>,
}

#[async_trait::async_trait]
impl DeskApi for CannedApi {
    async fn start_operation(
        &self,
        kind: OperationKind,
        _request: &Value,
    ) -> Result<StartAck, ApiError> {
        if kind == OperationKind::BhavcopyUpdate {
            return Err(ApiError::new(FailureKind::HttpStatus(503), "Data service down"));
        }
        Ok(StartAck {
            id: format!("{}-1", kind.label().replace(' ', "_")),
            status: OperationStatus::Pending,
        })
    }

    async fn operation_status(
        &self,
        _kind: OperationKind,
        _id: &str,
    ) -> Result<OperationPatch, ApiError> {
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::new(FailureKind::Network, "script exhausted"))
    }

    async fn bot_logs(&self) -> Result<BotLogs, ApiError> {
        Ok(BotLogs {
            is_running: false,
            logs: Vec::new(),
        })
    }

    async fn stop_bot(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn add_member(
        &self,
        _list: WatchList,
        _symbol: &str,
        _metadata: &Value,
    ) -> Result<(), ApiError> {
        match self.mutation.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn remove_member(&self, _list: WatchList, _symbol: &str) -> Result<(), ApiError> {
        match self.mutation.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn list_members(&self, _list: WatchList) -> Result<Vec<String>, ApiError> {
        Ok(vec!["INFY".to_string(), "TCS".to_string()])
    }
}

fn coordinator(api: Arc<CannedApi>) -> Coordinator {
    tradedesk_logging::initialize_for_tests();
    let polling = PollSettings {
        scan_interval: Duration::from_millis(10),
        data_interval: Duration::from_millis(10),
        tail_interval: Duration::from_millis(10),
        tail_flush_delay: Duration::from_millis(10),
        tail_error_backoff: Duration::from_millis(10),
        max_consecutive_failures: 3,
    };
    let engine = EngineHandle::with_api(api, polling).expect("engine");
    Coordinator::with_engine(engine, Duration::from_secs(60))
}

/// Pumps until `done` holds or a few seconds pass.
fn pump_until(desk: &mut Coordinator, done: impl Fn(&Coordinator) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        desk.pump(Instant::now());
        if done(desk) {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached before deadline");
}

fn toast_texts(desk: &Coordinator) -> Vec<(Severity, String)> {
    desk.view()
        .toasts
        .into_iter()
        .map(|toast| (toast.severity, toast.text))
        .collect()
}

#[test]
fn failed_add_rolls_back_and_reports() {
    let api = Arc::new(CannedApi::default());
    *api.mutation.lock().unwrap() = Some(ApiError::new(FailureKind::HttpStatus(500), "db"));
    let mut desk = coordinator(api);

    desk.toggle(WatchList::Continuation, "SBIN", false, json!({}));
    assert!(desk.is_member(WatchList::Continuation, "SBIN"));

    pump_until(&mut desk, |desk| toast_texts(desk).len() == 2);
    assert!(!desk.is_member(WatchList::Continuation, "SBIN"));
    assert_eq!(
        toast_texts(&desk),
        vec![
            (
                Severity::Success,
                "Added SBIN to continuation list".to_string()
            ),
            (
                Severity::Error,
                "Failed to add SBIN to continuation list".to_string()
            ),
        ]
    );
}

#[test]
fn duplicate_add_warns_and_keeps_member() {
    let api = Arc::new(CannedApi::default());
    *api.mutation.lock().unwrap() = Some(ApiError::new(FailureKind::HttpStatus(409), "exists"));
    let mut desk = coordinator(api);

    desk.toggle(WatchList::Reversal, "TCS", false, json!({}));
    pump_until(&mut desk, |desk| toast_texts(desk).len() == 2);

    assert!(desk.is_member(WatchList::Reversal, "TCS"));
    assert_eq!(toast_texts(&desk)[1].0, Severity::Warning);
}

#[test]
fn scan_runs_to_completion_and_notifies() {
    let api = Arc::new(CannedApi::default());
    {
        let mut statuses = api.statuses.lock().unwrap();
        statuses.push_back(OperationPatch {
            status: Some(OperationStatus::Running),
            progress: Some(40),
            ..OperationPatch::default()
        });
        statuses.push_back(OperationPatch {
            status: Some(OperationStatus::Completed),
            progress: Some(100),
            result: Some(json!(["INFY"])),
            ..OperationPatch::default()
        });
    }
    let mut desk = coordinator(api);

    desk.start_operation(OperationKind::ContinuationScan, json!({}));
    assert!(desk.is_busy());
    pump_until(&mut desk, |desk| {
        desk.operation("continuation_scan-1")
            .is_some_and(Operation::is_terminal)
    });

    let operation = desk.operation("continuation_scan-1").unwrap();
    assert_eq!(operation.result, Some(json!(["INFY"])));
    assert_eq!(
        toast_texts(&desk),
        vec![(
            Severity::Success,
            "Continuation scan completed".to_string()
        )]
    );

    desk.stop_observing("continuation_scan-1");
    assert!(desk.list().is_empty());
}

#[test]
fn rejected_start_is_one_error_toast() {
    let mut desk = coordinator(Arc::new(CannedApi::default()));

    desk.start_operation(OperationKind::BhavcopyUpdate, json!({}));
    pump_until(&mut desk, |desk| !toast_texts(desk).is_empty());

    let toasts = toast_texts(&desk);
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].0, Severity::Error);
    assert!(toasts[0].1.starts_with("Failed to start bhavcopy update"));
    assert!(desk.list().is_empty());
}

#[test]
fn refresh_seeds_membership() {
    let mut desk = coordinator(Arc::new(CannedApi::default()));

    desk.refresh(WatchList::Continuation);
    pump_until(&mut desk, |desk| desk.is_member(WatchList::Continuation, "TCS"));

    assert_eq!(
        desk.view().continuation,
        vec!["INFY".to_string(), "TCS".to_string()]
    );
}

#[test]
fn observing_an_idle_bot_warns_without_tracking() {
    let mut desk = coordinator(Arc::new(CannedApi::default()));

    desk.observe_bot();
    assert!(desk.is_busy());
    pump_until(&mut desk, |desk| !toast_texts(desk).is_empty());

    assert_eq!(
        toast_texts(&desk),
        vec![(Severity::Warning, "Bot is not running".to_string())]
    );
    assert!(desk.list().is_empty());
}

#[test]
fn manual_toasts_take_free_slots() {
    let mut desk = coordinator(Arc::new(CannedApi::default()));

    let a = desk.notify("A", Severity::Success, None);
    let _b = desk.notify("B", Severity::Success, None);
    desk.dismiss(&a);
    desk.notify("C", Severity::Warning, None);

    let slots: Vec<(String, usize)> = desk
        .view()
        .toasts
        .into_iter()
        .map(|toast| (toast.text, toast.slot))
        .collect();
    assert!(slots.contains(&("B".to_string(), 1)));
    assert!(slots.contains(&("C".to_string(), 0)));
}

#[test]
fn engine_events_map_to_messages() {
    assert_eq!(
        map_event(EngineEvent::MutationSettled {
            mutation_id: 7,
            outcome: MutationOutcome::Conflict,
        }),
        Msg::MutationSettled {
            mutation_id: 7,
            outcome: MutationOutcome::Conflict,
        }
    );
    assert_eq!(
        map_event(EngineEvent::MembersLoaded {
            list: WatchList::Reversal,
            symbols: vec!["ITC".to_string()],
        }),
        Msg::MembershipLoaded {
            list: WatchList::Reversal,
            symbols: vec!["ITC".to_string()],
        }
    );
    assert_eq!(
        map_event(EngineEvent::BotStopped),
        Msg::Notify {
            text: "Bot stopped".to_string(),
            severity: Severity::Success,
            ttl: None,
        }
    );
    assert_eq!(
        map_event(EngineEvent::BotIdle),
        Msg::Notify {
            text: "Bot is not running".to_string(),
            severity: Severity::Warning,
            ttl: None,
        }
    );
    assert_eq!(
        map_event(EngineEvent::ObserveBotFailed {
            error: "connection refused".to_string()
        }),
        Msg::Notify {
            text: "Failed to read bot status: connection refused".to_string(),
            severity: Severity::Error,
            ttl: None,
        }
    );
    assert_eq!(
        map_event(EngineEvent::StopBotFailed {
            error: "not running".to_string()
        }),
        Msg::StopBotFailed {
            error: "not running".to_string()
        }
    );
}
