//! Integration tests for ordr-rv API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use helpers::*;
use ordr_rv::services::{FetchError, OrderSource};
use ordr_rv::{build_router, AppState};

fn stub(behavior: StubBehavior) -> Arc<dyn OrderSource> {
    Arc::new(StubOrderSource::new(behavior))
}

async fn create_test_app(source: Arc<dyn OrderSource>) -> (axum::Router, AppState) {
    let harness = TestHarness::new()
        .with_rows(
            1,
            vec![
                Some(vec!["Publisher ID", "Ordertoken/OrderID", "SubID"]),
                Some(vec!["P1", "A1", "S1"]),
                Some(vec!["P2", "A2", "S2"]),
            ],
        )
        .await;
    let state = AppState::new(harness.service(source, fast_config()));
    (build_router(state.clone()), state)
}

fn validation_body() -> Body {
    Body::from(
        json!({"campaign_id": "campaign-1", "from": "2024-05-01", "to": "2024-05-31"}).to_string(),
    )
}

fn post(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app(Arc::new(StubOrderSource::records(vec![]))).await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "ordr-rv");
}

#[tokio::test]
async fn test_run_validation_returns_report() {
    let source = Arc::new(StubOrderSource::records(vec![order_with(
        "A1",
        "paidout",
        &[("subid", "S1-net")],
    )]));
    let (app, _) = create_test_app(source).await;

    let response = app
        .clone()
        .oneshot(post("/validations/1/run", validation_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = json_body(response).await;
    assert_eq!(report["document_id"], 1);
    let first = &report["rows"][0];
    assert_eq!(first["outcome"]["outcome"], "matched");
    assert_eq!(first["outcome"]["status"], "ausgezahlt");
    assert_eq!(first["cells"]["SubID"]["value"], "S1-net");
    assert_eq!(first["cells"]["SubID"]["status"], "ok");
    assert_eq!(first["remark_advertiser"], "Bereits im Netzwerk");
    assert_eq!(report["rows"][1]["outcome"]["outcome"], "no-match");

    let response = app.clone().oneshot(get("/validations/1/rows/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let row = json_body(response).await;
    assert_eq!(row["status"], "ausgezahlt");
    assert_eq!(row["locked"], true);

    let response = app.oneshot(get("/validations/1/rows/0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failure_reasons_map_to_distinct_codes() {
    let cases: Vec<(Arc<dyn OrderSource>, StatusCode, &str)> = vec![
        (
            stub(StubBehavior::Fail(FetchError::Timeout("slow".into()))),
            StatusCode::GATEWAY_TIMEOUT,
            "REMOTE_TIMEOUT",
        ),
        (
            stub(StubBehavior::Fail(FetchError::Transport("down".into()))),
            StatusCode::BAD_GATEWAY,
            "REMOTE_TRANSPORT",
        ),
        (
            stub(StubBehavior::Records(vec![])),
            StatusCode::UNPROCESSABLE_ENTITY,
            "NO_DATA",
        ),
    ];

    for (source, status, code) in cases {
        let (app, _) = create_test_app(source).await;
        let response = app.oneshot(post("/validations/1/run", validation_body())).await.unwrap();
        assert_eq!(response.status(), status);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], code);
    }
}

#[tokio::test]
async fn test_report_lifecycle() {
    let (app, _) = create_test_app(Arc::new(StubOrderSource::records(vec![order("A2", "1")]))).await;

    let response = app.clone().oneshot(get("/validations/1/report")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(post("/validations/1/run", validation_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/validations/1/report")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["rows"][1]["outcome"]["status"], "bestätigt");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/validations/1/report")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/validations/1/report")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_background_session_and_cancel() {
    let (app, state) = create_test_app(Arc::new(StubOrderSource::new(StubBehavior::Hang))).await;

    let response = app
        .clone()
        .oneshot(post("/validations/1", validation_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let started = json_body(response).await;
    let session_id = started["session_id"].as_str().unwrap().to_string();

    let handle = state
        .service
        .session(session_id.parse().unwrap())
        .await
        .unwrap();
    wait_for_fetching(&handle).await;

    let response = app
        .clone()
        .oneshot(post(&format!("/sessions/{}/cancel", session_id), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["cancelled"], true);

    wait_for_terminal(&handle).await;

    let response = app
        .clone()
        .oneshot(get(&format!("/sessions/{}", session_id)))
        .await
        .unwrap();
    let snapshot = json_body(response).await;
    assert_eq!(snapshot["state"], "failed");
    assert_eq!(snapshot["failure"], "cancelled");
    assert_eq!(snapshot["percent"], 0);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (app, _) = create_test_app(Arc::new(StubOrderSource::records(vec![]))).await;
    let id = uuid::Uuid::new_v4();

    let response = app.clone().oneshot(get(&format!("/sessions/{}", id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(post(&format!("/sessions/{}/cancel", id), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_campaign_is_400() {
    let (app, _) = create_test_app(Arc::new(StubOrderSource::records(vec![]))).await;
    let body = Body::from(
        json!({"campaign_id": "c", "from_date": "2024-06-01", "to_date": "2024-05-01"}).to_string(),
    );

    let response = app.oneshot(post("/validations/1/run", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failure_tracker_feeds_health() {
    let (app, state) = create_test_app(Arc::new(StubOrderSource::records(vec![]))).await;
    let _tracker = state.track_failures();

    let response = app
        .clone()
        .oneshot(post("/validations/1/run", validation_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let mut last_error = None;
    for _ in 0..50 {
        last_error = state.last_error.read().await.clone();
        if last_error.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(last_error.unwrap().contains("no-data"));

    let body = json_body(app.oneshot(get("/health")).await.unwrap()).await;
    assert!(body["last_error"].as_str().unwrap().contains("document 1"));
}
