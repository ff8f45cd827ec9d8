use std::time::Duration;

use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tradedesk_core::{OperationKind, OperationPatch, WatchList};

use crate::types::{MembersResponse, StartResponse, StatusResponse};
use crate::{ApiError, BotLogs, FailureKind, StartAck};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Server origin, optionally followed by the path prefix the API is mounted under.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// REST boundary of the dashboard backend.
#[async_trait::async_trait]
pub trait DeskApi: Send + Sync {
    async fn start_operation(
        &self,
        kind: OperationKind,
        request: &Value,
    ) -> Result<StartAck, ApiError>;

    async fn operation_status(
        &self,
        kind: OperationKind,
        id: &str,
    ) -> Result<OperationPatch, ApiError>;

    async fn bot_logs(&self) -> Result<BotLogs, ApiError>;

    async fn stop_bot(&self) -> Result<(), ApiError>;

    async fn add_member(
        &self,
        list: WatchList,
        symbol: &str,
        metadata: &Value,
    ) -> Result<(), ApiError>;

    async fn remove_member(&self, list: WatchList, symbol: &str) -> Result<(), ApiError>;

    async fn list_members(&self, list: WatchList) -> Result<Vec<String>, ApiError>;
}

pub fn start_path(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::ContinuationScan => "/api/scanner/continuation",
        OperationKind::ReversalScan => "/api/scanner/reversal",
        OperationKind::BreadthAnalysis => "/api/breadth/analyze",
        OperationKind::BhavcopyUpdate => "/api/data/update-bhavcopy",
        OperationKind::LiveBot => "/api/live-trading/start",
    }
}

/// Prefix of the status endpoint; the operation id is appended as the last segment.
pub fn status_path(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::BhavcopyUpdate => "/api/data/status",
        OperationKind::LiveBot => "/api/live-trading/logs",
        OperationKind::ContinuationScan
        | OperationKind::ReversalScan
        | OperationKind::BreadthAnalysis => "/api/scanner/status",
    }
}

pub fn list_path(list: WatchList) -> &'static str {
    match list {
        WatchList::Continuation => "/api/stocks/continuation",
        WatchList::Reversal => "/api/stocks/reversal",
    }
}

const BOT_LOGS_PATH: &str = "/api/live-trading/logs";
const BOT_STOP_PATH: &str = "/api/live-trading/stop";

#[derive(Debug, Clone)]
pub struct ReqwestDeskApi {
    client: reqwest::Client,
    base: Url,
}

impl ReqwestDeskApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let mut base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        // Endpoint paths are joined relative to the base, so its path must end in a slash.
        if !base.path().ends_with('/') {
            let prefixed = format!("{}/", base.path());
            base.set_path(&prefixed);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, base })
    }

    fn url(&self, path: &str, segment: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if let Some(segment) = segment {
            url.path_segments_mut()
                .map_err(|()| ApiError::new(FailureKind::InvalidUrl, "base url cannot hold a path"))?
                .push(segment);
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                error_detail(&detail).unwrap_or_else(|| status.to_string()),
            ));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl DeskApi for ReqwestDeskApi {
    async fn start_operation(
        &self,
        kind: OperationKind,
        request: &Value,
    ) -> Result<StartAck, ApiError> {
        let url = self.url(start_path(kind), None)?;
        let response: StartResponse = self.send_json(self.client.post(url).json(request)).await?;
        response.into_ack(kind)
    }

    async fn operation_status(
        &self,
        kind: OperationKind,
        id: &str,
    ) -> Result<OperationPatch, ApiError> {
        let url = self.url(status_path(kind), Some(id))?;
        let response: StatusResponse = self.send_json(self.client.get(url)).await?;
        response.into_patch()
    }

    async fn bot_logs(&self) -> Result<BotLogs, ApiError> {
        let url = self.url(BOT_LOGS_PATH, None)?;
        self.send_json(self.client.get(url)).await
    }

    async fn stop_bot(&self) -> Result<(), ApiError> {
        let url = self.url(BOT_STOP_PATH, None)?;
        self.send(self.client.post(url)).await.map(|_| ())
    }

    async fn add_member(
        &self,
        list: WatchList,
        symbol: &str,
        metadata: &Value,
    ) -> Result<(), ApiError> {
        let url = self.url(list_path(list), None)?;
        let body = member_body(symbol, metadata);
        self.send(self.client.post(url).json(&body)).await.map(|_| ())
    }

    async fn remove_member(&self, list: WatchList, symbol: &str) -> Result<(), ApiError> {
        let url = self.url(list_path(list), Some(symbol))?;
        self.send(self.client.delete(url)).await.map(|_| ())
    }

    async fn list_members(&self, list: WatchList) -> Result<Vec<String>, ApiError> {
        let url = self.url(list_path(list), None)?;
        let response: MembersResponse = self.send_json(self.client.get(url)).await?;
        Ok(response
            .stocks
            .into_iter()
            .map(|entry| entry.symbol)
            .collect())
    }
}

/// `{ symbol, source: "scan_results", ..metadata }`; metadata keys win except `symbol`.
fn member_body(symbol: &str, metadata: &Value) -> Value {
    let mut body = Map::new();
    body.insert("source".to_string(), json!("scan_results"));
    if let Value::Object(extra) = metadata {
        for (key, value) in extra {
            body.insert(key.clone(), value.clone());
        }
    }
    body.insert("symbol".to_string(), json!(symbol));
    Value::Object(body)
}

/// FastAPI-style `{"detail": ".."}` or `{"error": ".."}` bodies.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
