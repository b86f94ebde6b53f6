// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::convert::Infallible;
use std::time::Duration;

use apilytics::Config;
use apilytics_tower::ApilyticsLayer;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use tokio::time::{sleep, timeout};
use tower::{service_fn, Layer, ServiceExt};

const INGEST_PATH: &str = "/api/v1/middleware";

fn test_config(server: &ServerGuard) -> Config {
    Config {
        endpoint: format!("{}{INGEST_PATH}", server.url()),
        cpu_sample_window: Duration::from_millis(10),
        ..Config::with_api_key("dummy-key")
    }
}

async fn handler(_request: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("x-handler", "yes")
        .body(Full::new(Bytes::from_static(b"created")))
        .unwrap())
}

async fn wait_until_matched(mock: &Mock) {
    timeout(Duration::from_secs(10), async {
        while !mock.matched_async().await {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for event");
    // Catch any extra sends.
    sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn middleware_reports_request_and_response() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", INGEST_PATH)
        .match_header("content-type", "application/json")
        .match_header("x-api-key", "dummy-key")
        .match_header(
            "apilytics-version",
            Matcher::Regex(r"^apilytics-rust-tower/[^;]+;rust/[^;]+;axum/0\.7\.5;\w+$".to_string()),
        )
        .match_body(Matcher::PartialJson(json!({
            "path": "/users/42",
            "method": "POST",
            "query": "expand=1",
            "requestSize": 5,
            "responseSize": 7,
            "statusCode": 201,
            "userAgent": "curl/8.0",
            "ip": "203.0.113.7",
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let layer = ApilyticsLayer::new(test_config(&server))
        .unwrap()
        .with_integrated_library("axum/0.7.5");
    let service = layer.layer(service_fn(handler));

    let request = Request::post("/users/42?expand=1")
        .header("user-agent", "curl/8.0")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(Full::new(Bytes::from_static(b"hello")))
        .unwrap();
    let response = service.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-handler"], "yes");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"created"));

    wait_until_matched(&mock).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn middleware_reports_failed_requests_without_status() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", INGEST_PATH)
        .match_body(Matcher::PartialJson(json!({
            "path": "/error",
            "method": "GET",
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let service = ApilyticsLayer::new(test_config(&server))
        .unwrap()
        .layer(service_fn(|_request: Request<Full<Bytes>>| async {
            Err::<Response<Full<Bytes>>, _>("handler failed")
        }));

    let request = Request::get("/error").body(Full::default()).unwrap();
    let result = service.oneshot(request).await;
    assert_eq!(result.unwrap_err(), "handler failed");

    wait_until_matched(&mock).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn dropped_response_future_still_reports() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", INGEST_PATH)
        .match_body(Matcher::PartialJson(json!({"path": "/cancelled"})))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let service = ApilyticsLayer::new(test_config(&server))
        .unwrap()
        .layer(service_fn(|_request: Request<Full<Bytes>>| async {
            sleep(Duration::from_secs(60)).await;
            Ok::<_, Infallible>(Response::new(Full::<Bytes>::default()))
        }));

    let request = Request::get("/cancelled").body(Full::default()).unwrap();
    let cancelled = timeout(Duration::from_millis(20), service.oneshot(request)).await;
    assert!(cancelled.is_err());

    wait_until_matched(&mock).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn disabled_middleware_forwards_without_reporting() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let layer = ApilyticsLayer::new(Config {
        api_key: None,
        ..test_config(&server)
    })
    .unwrap();
    assert!(!layer.is_enabled());

    for _ in 0..20 {
        let service = layer.layer(service_fn(handler));
        let request = Request::get("/").body(Full::default()).unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    sleep(Duration::from_millis(300)).await;
    mock.assert_async().await;
}
