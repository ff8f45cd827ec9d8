use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tradedesk_core::{OperationKind, OperationStatus, WatchList};
use tradedesk_engine::{ApiSettings, DeskApi, FailureKind, ReqwestDeskApi};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestDeskApi {
    ReqwestDeskApi::new(ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .expect("client")
}

#[tokio::test]
async fn scan_start_returns_operation_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scanner/continuation"))
        .and(body_json(json!({"min_volume": 100000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operation_id": "continuation_20260110_091500",
            "status": "started"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = api_for(&server)
        .start_operation(OperationKind::ContinuationScan, &json!({"min_volume": 100000}))
        .await
        .expect("start ok");
    assert_eq!(ack.id, "continuation_20260110_091500");
    assert_eq!(ack.status, OperationStatus::Pending);
}

#[tokio::test]
async fn status_poll_maps_payload_to_patch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/data/status/bhavcopy_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "progress": 100,
            "message": "Downloaded 3 files",
            "result": {"files": 3}
        })))
        .mount(&server)
        .await;

    let patch = api_for(&server)
        .operation_status(OperationKind::BhavcopyUpdate, "bhavcopy_1")
        .await
        .expect("status ok");
    assert_eq!(patch.status, Some(OperationStatus::Completed));
    assert_eq!(patch.progress, Some(100));
    assert_eq!(patch.message.as_deref(), Some("Downloaded 3 files"));
    assert_eq!(patch.result, Some(json!({"files": 3})));
}

#[tokio::test]
async fn unregistered_operation_is_http_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scanner/status/reversal_1"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "Operation not found"})),
        )
        .mount(&server)
        .await;

    let err = api_for(&server)
        .operation_status(OperationKind::ReversalScan, "reversal_1")
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert_eq!(err.message, "Operation not found");
}

#[tokio::test]
async fn add_member_posts_symbol_with_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stocks/continuation"))
        .and(body_json(json!({
            "symbol": "TCS",
            "source": "scan_results",
            "close": 4012.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "added"})))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server)
        .add_member(WatchList::Continuation, "TCS", &json!({"close": 4012.5}))
        .await
        .expect("add ok");
}

#[tokio::test]
async fn duplicate_add_is_a_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stocks/reversal"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"detail": "Stock already exists"})),
        )
        .mount(&server)
        .await;

    let err = api_for(&server)
        .add_member(WatchList::Reversal, "SBIN", &json!({}))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.message, "Stock already exists");
}

#[tokio::test]
async fn remove_member_deletes_by_symbol() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/stocks/continuation/INFY"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server)
        .remove_member(WatchList::Continuation, "INFY")
        .await
        .expect("remove ok");
}

#[tokio::test]
async fn members_are_read_from_stock_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stocks/continuation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stocks": [{"symbol": "INFY", "added": "2026-01-09"}, {"symbol": "TCS"}]
        })))
        .mount(&server)
        .await;

    let members = api_for(&server)
        .list_members(WatchList::Continuation)
        .await
        .expect("list ok");
    assert_eq!(members, vec!["INFY".to_string(), "TCS".to_string()]);
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/desk/api/stocks/reversal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stocks": [{"symbol": "ITC"}]
        })))
        .mount(&server)
        .await;

    let api = ReqwestDeskApi::new(ApiSettings {
        base_url: format!("{}/desk", server.uri()),
        ..ApiSettings::default()
    })
    .expect("client");
    let members = api
        .list_members(WatchList::Reversal)
        .await
        .expect("list ok");
    assert_eq!(members, vec!["ITC".to_string()]);
}

#[tokio::test]
async fn bot_start_and_logs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/live-trading/start"))
        .and(body_json(json!({"mode": "continuation"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Live trading started",
            "process_id": 3117,
            "mode": "continuation"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/live-trading/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_running": true,
            "logs": [{"timestamp": "2026-01-10T09:15:02", "message": "Connected"}]
        })))
        .mount(&server)
        .await;

    let api = api_for(&server);
    let ack = api
        .start_operation(OperationKind::LiveBot, &json!({"mode": "continuation"}))
        .await
        .expect("start ok");
    assert_eq!(ack.id, "live-bot-3117");

    let logs = api.bot_logs().await.expect("logs ok");
    assert!(logs.is_running);
    assert_eq!(logs.formatted_lines(), vec!["[09:15:02] Connected".to_string()]);
}

#[tokio::test]
async fn slow_status_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scanner/status/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "running"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let api = ReqwestDeskApi::new(ApiSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(100),
        ..ApiSettings::default()
    })
    .expect("client");
    let err = api
        .operation_status(OperationKind::ContinuationScan, "slow")
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[test]
fn invalid_base_url_is_reported() {
    let err = ReqwestDeskApi::new(ApiSettings {
        base_url: "not a url".to_string(),
        ..ApiSettings::default()
    })
    .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
