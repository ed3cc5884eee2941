mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use common::{scenario_a, scenario_b};
use ride_reliability::server::{self, AppState, PREDICT_ROUTE};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    server::router(AppState::new(Arc::new(common::engine()), true))
}

async fn post_raw(app: Router, body: String) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(PREDICT_ROUTE)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post(app: Router, body: Value) -> (StatusCode, Value) {
    post_raw(app, body.to_string()).await
}

#[tokio::test]
async fn scenario_a_over_http() {
    let (status, body) = post(app(), scenario_a()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bucket"], "Low");
    assert_eq!(
        body["reasons"],
        json!([
            "heavy_rain_reported",
            "low_driver_density",
            "long_trip_distance",
            "high_demand_airport_route"
        ])
    );
    let p = body["probability"].as_f64().unwrap();
    assert!((0.0..0.5).contains(&p));
}

#[tokio::test]
async fn scenario_b_over_http() {
    let (status, body) = post(app(), scenario_b()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bucket"], "High");
    assert_eq!(body["reasons"], json!([]));
}

#[tokio::test]
async fn validation_failure_lists_every_field() {
    let mut payload = scenario_b();
    let obj = payload.as_object_mut().unwrap();
    obj.remove("hour_of_day");
    obj.insert("month".into(), json!(13));
    obj.insert("is_raining".into(), json!("no"));

    let (status, body) = post(app(), payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(
        body["fields"],
        json!([
            { "field": "hour_of_day", "problem": "missing" },
            { "field": "month", "problem": "out_of_domain", "domain": "1..=12" },
            { "field": "is_raining", "problem": "wrong_type", "expected": "0/1 or boolean" }
        ])
    );
}

#[tokio::test]
async fn non_object_body_is_a_validation_error() {
    let (status, body) = post(app(), json!([1, 2, 3])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"][0]["problem"], "not_an_object");
}

#[tokio::test]
async fn unparseable_json_never_reaches_the_scorer() {
    let (status, _) = post_raw(app(), "{\"hour_of_day\": ".to_string()).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn status_reports_versions() {
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value =
        serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["model_version"], "fixture-3-stumps");
    assert_eq!(body["contract_version"], 1);
    assert_eq!(body["features"][0], "hour_of_day");
}

#[tokio::test]
async fn concurrent_requests_share_one_engine() {
    let app = app();
    let calls = (0..32).map(|i| {
        let body = if i % 2 == 0 { scenario_a() } else { scenario_b() };
        post(app.clone(), body)
    });
    let results = futures::future::join_all(calls).await;

    let (_, first_a) = &results[0];
    let (_, first_b) = &results[1];
    for (i, (status, body)) in results.iter().enumerate() {
        assert_eq!(*status, StatusCode::OK);
        let expected = if i % 2 == 0 { first_a } else { first_b };
        assert_eq!(body, expected);
    }
}
