#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tradedesk_core::{OperationKind, OperationPatch, OperationStatus, WatchList};
use tradedesk_engine::{ApiError, BotLogLine, BotLogs, DeskApi, FailureKind, StartAck};

/// In-memory backend answering from pre-recorded scripts.
pub struct ScriptedApi {
    start: Mutex<VecDeque<Result<StartAck, ApiError>>>,
    statuses: Mutex<VecDeque<Result<OperationPatch, ApiError>>>,
    logs: Mutex<VecDeque<Result<BotLogs, ApiError>>>,
    mutations: Mutex<VecDeque<Result<(), ApiError>>>,
    members: Mutex<Vec<String>>,
    stop_result: Mutex<Option<ApiError>>,
    status_delay: Duration,
    status_calls: Mutex<Vec<Instant>>,
    log_calls: Mutex<Vec<Instant>>,
    stop_calls: Mutex<usize>,
    start_calls: Mutex<usize>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self {
            start: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            logs: Mutex::new(VecDeque::new()),
            mutations: Mutex::new(VecDeque::new()),
            members: Mutex::new(Vec::new()),
            stop_result: Mutex::new(None),
            status_delay: Duration::ZERO,
            status_calls: Mutex::new(Vec::new()),
            log_calls: Mutex::new(Vec::new()),
            stop_calls: Mutex::new(0),
            start_calls: Mutex::new(0),
        }
    }
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting(id: &str) -> Self {
        let api = Self::new();
        api.push_start(Ok(StartAck {
            id: id.to_string(),
            status: OperationStatus::Pending,
        }));
        api
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn push_start(&self, result: Result<StartAck, ApiError>) {
        self.start.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<OperationPatch, ApiError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    pub fn push_logs(&self, result: Result<BotLogs, ApiError>) {
        self.logs.lock().unwrap().push_back(result);
    }

    pub fn push_mutation(&self, result: Result<(), ApiError>) {
        self.mutations.lock().unwrap().push_back(result);
    }

    pub fn set_members(&self, members: &[&str]) {
        *self.members.lock().unwrap() = members.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_stop(&self, err: ApiError) {
        *self.stop_result.lock().unwrap() = Some(err);
    }

    pub fn status_calls(&self) -> Vec<Instant> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn log_calls(&self) -> Vec<Instant> {
        self.log_calls.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> usize {
        *self.stop_calls.lock().unwrap()
    }

    pub fn start_calls(&self) -> usize {
        *self.start_calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl DeskApi for ScriptedApi {
    async fn start_operation(
        &self,
        _kind: OperationKind,
        _request: &Value,
    ) -> Result<StartAck, ApiError> {
        *self.start_calls.lock().unwrap() += 1;
        self.start
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(network("no start scripted")))
    }

    async fn operation_status(
        &self,
        _kind: OperationKind,
        _id: &str,
    ) -> Result<OperationPatch, ApiError> {
        self.status_calls.lock().unwrap().push(Instant::now());
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(network("status script exhausted")))
    }

    async fn bot_logs(&self) -> Result<BotLogs, ApiError> {
        self.log_calls.lock().unwrap().push(Instant::now());
        self.logs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(network("log script exhausted")))
    }

    async fn stop_bot(&self) -> Result<(), ApiError> {
        *self.stop_calls.lock().unwrap() += 1;
        match self.stop_result.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn add_member(
        &self,
        _list: WatchList,
        _symbol: &str,
        _metadata: &Value,
    ) -> Result<(), ApiError> {
        self.next_mutation()
    }

    async fn remove_member(&self, _list: WatchList, _symbol: &str) -> Result<(), ApiError> {
        self.next_mutation()
    }

    async fn list_members(&self, _list: WatchList) -> Result<Vec<String>, ApiError> {
        Ok(self.members.lock().unwrap().clone())
    }
}

impl ScriptedApi {
    fn next_mutation(&self) -> Result<(), ApiError> {
        self.mutations.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub fn network(message: &str) -> ApiError {
    ApiError::new(FailureKind::Network, message)
}

pub fn running(progress: u8, message: &str) -> OperationPatch {
    OperationPatch {
        status: Some(OperationStatus::Running),
        progress: Some(progress),
        message: Some(message.to_string()),
        ..OperationPatch::default()
    }
}

pub fn completed(result: Value) -> OperationPatch {
    OperationPatch {
        status: Some(OperationStatus::Completed),
        progress: Some(100),
        message: Some("done".to_string()),
        result: Some(result),
        ..OperationPatch::default()
    }
}

pub fn bot_logs(is_running: bool, messages: &[&str]) -> BotLogs {
    BotLogs {
        is_running,
        logs: messages
            .iter()
            .enumerate()
            .map(|(i, message)| BotLogLine {
                timestamp: format!("2026-01-10T09:15:{:02}", i),
                message: message.to_string(),
            })
            .collect(),
    }
}
