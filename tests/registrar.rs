//! End-to-end tests for the `/api/app/` bridge to the backend socket.

use reqwest::header;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;

const ERROR_BODY: &str = r#"{"status":"error"}"#;

#[tokio::test]
async fn reply_body_is_forwarded_byte_for_byte() {
    let dir = common::public_dir(&[]);
    let config = common::config_for(dir.path());
    let socket = dir.path().join("registrar.sock");

    common::start_mock_registrar(&socket, |query| async move {
        if query.topic == "api.frontend" && query.payload == serde_json::json!({ "q": "hello" }) {
            r#"{ "results" : [1, 2,3],"q":"hello" }"#.to_string()
        } else {
            r#"{"unexpected":true}"#.to_string()
        }
    })
    .await;

    let gateway = common::start_gateway(dir, config).await;
    gateway.wait_connected().await;

    let response = common::client()
        .get(gateway.url("/api/app/search?q=hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(
        response.text().await.unwrap(),
        r#"{ "results" : [1, 2,3],"q":"hello" }"#
    );
    assert_eq!(gateway.registrar.pending_count(), 0);
}

#[tokio::test]
async fn slow_backend_yields_error_body() {
    let dir = common::public_dir(&[]);
    let mut config = common::config_for(dir.path());
    config.registrar.timeout_ms = 50;
    let socket = dir.path().join("registrar.sock");
    common::start_echo_registrar(&socket, Duration::from_millis(500)).await;

    let gateway = common::start_gateway(dir, config).await;
    gateway.wait_connected().await;

    let response = common::client()
        .get(gateway.url("/api/app/slow"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), ERROR_BODY);
    assert_eq!(gateway.registrar.pending_count(), 0);

    // The late reply lands after the waiter is gone and is dropped quietly.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(gateway.registrar.is_connected());
}

#[tokio::test]
async fn missing_backend_yields_error_body() {
    let dir = common::public_dir(&[]);
    let config = common::config_for(dir.path());
    let gateway = common::start_gateway(dir, config).await;

    let response = common::client()
        .get(gateway.url("/api/app/search?q=x"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), ERROR_BODY);
}

#[tokio::test]
async fn concurrent_queries_are_correlated() {
    let dir = common::public_dir(&[]);
    let config = common::config_for(dir.path());
    let socket = dir.path().join("registrar.sock");

    // Earlier queries answer later so replies arrive out of order.
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    common::start_mock_registrar(&socket, move |query| {
        let order = counter.fetch_add(1, Ordering::SeqCst) as u64;
        async move {
            tokio::time::sleep(Duration::from_millis(100u64.saturating_sub(order * 10))).await;
            serde_json::json!({ "echo": query.payload["n"] }).to_string()
        }
    })
    .await;

    let gateway = common::start_gateway(dir, config).await;
    gateway.wait_connected().await;
    let client = common::client();

    let requests = (0..8).map(|n| {
        let client = client.clone();
        let url = gateway.url(&format!("/api/app/echo?n={n}"));
        tokio::spawn(async move {
            let body = client.get(url).send().await.unwrap().text().await.unwrap();
            (n, body)
        })
    });

    for handle in futures_util::future::join_all(requests).await {
        let (n, body) = handle.unwrap();
        assert_eq!(body, format!(r#"{{"echo":"{n}"}}"#));
    }
    assert_eq!(seen.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn connects_once_backend_appears() {
    let dir = common::public_dir(&[]);
    let config = common::config_for(dir.path());
    let gateway = common::start_gateway(dir, config).await;

    assert!(!gateway.registrar.is_connected());

    common::start_echo_registrar(&gateway.socket_path(), Duration::ZERO).await;
    gateway.wait_connected().await;

    let response = common::client()
        .get(gateway.url("/api/app/ping?x=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"payload":{"x":"1"},"status":"ok"}"#
    );
}
