//! Failure injection tests: retries, relayed client errors, unreachable
//! backends, and the circuit breaker lifecycle end to end.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;

#[tokio::test]
async fn retries_until_backend_recovers() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let backend = start_programmable_backend(move |_head| {
        let calls = calls_clone.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                (503, "still warming up".to_string())
            } else {
                (200, "recovered".to_string())
            }
        }
    })
    .await;

    let mut config = gateway_config("orders", &[(backend, 1)], "/api/orders");
    config.services[0].retry.max_retries = 3;
    config.services[0].retry.base_delay_ms = 10;
    let (addr, shutdown) = spawn_gateway(config).await;

    let response = test_client()
        .get(format!("http://{}/api/orders/list", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    shutdown.trigger();
}

#[tokio::test]
async fn exhausted_retries_relay_the_backend_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let backend = start_programmable_backend(move |_head| {
        let calls = calls_clone.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            (503, "down".to_string())
        }
    })
    .await;

    let mut config = gateway_config("orders", &[(backend, 1)], "/api/orders");
    config.services[0].retry.max_retries = 2;
    config.services[0].retry.base_delay_ms = 10;
    // Keep the single instance eligible through all attempts.
    config.health_check.failure_threshold = 100;
    let (addr, shutdown) = spawn_gateway(config).await;

    let response = test_client()
        .get(format!("http://{}/api/orders/list", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    assert_eq!(response.text().await.unwrap(), "down");
    assert_eq!(calls.load(Ordering::SeqCst), 3, "initial attempt + 2 retries");
    shutdown.trigger();
}

#[tokio::test]
async fn client_errors_relay_without_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let backend = start_programmable_backend(move |_head| {
        let calls = calls_clone.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            (404, "no such order".to_string())
        }
    })
    .await;

    let mut config = gateway_config("orders", &[(backend, 1)], "/api/orders");
    config.services[0].retry.max_retries = 3;
    let (addr, shutdown) = spawn_gateway(config).await;

    let response = test_client()
        .get(format!("http://{}/api/orders/42", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), "no such order");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "4xx is the backend's final answer");
    shutdown.trigger();
}

#[tokio::test]
async fn unreachable_backend_returns_unreachable_envelope() {
    // Bind then drop so the port is known-closed.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let mut config = gateway_config("orders", &[(dead, 1)], "/api/orders");
    config.services[0].retry.max_retries = 0;
    let (addr, shutdown) = spawn_gateway(config).await;

    let response = test_client()
        .get(format!("http://{}/api/orders/list", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UPSTREAM_UNREACHABLE");
    shutdown.trigger();
}

#[tokio::test]
async fn circuit_opens_after_consecutive_failures_and_short_circuits() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let backend = start_programmable_backend(move |_head| {
        let calls = calls_clone.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            (500, "boom".to_string())
        }
    })
    .await;

    let mut config = gateway_config("payments", &[(backend, 1)], "/api/payments");
    config.services[0].retry.max_retries = 0;
    config.circuit_breaker.failure_threshold = 5;
    config.circuit_breaker.reset_timeout_secs = 60;
    // Instance health must not mask the breaker in this test.
    config.health_check.failure_threshold = 100;
    let (addr, shutdown) = spawn_gateway(config).await;

    let client = test_client();
    for _ in 0..5 {
        let response = client
            .get(format!("http://{}/api/payments/charge", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 500, "failures relay while the breaker counts");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    // Sixth request: rejected before any network attempt.
    let response = client
        .get(format!("http://{}/api/payments/charge", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CIRCUIT_OPEN");
    assert_eq!(
        calls.load(Ordering::SeqCst),
        5,
        "open breaker must not reach the backend"
    );

    let circuits: serde_json::Value = client
        .get(format!("http://{}/__gateway/circuits", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(circuits[0]["service"], "payments");
    assert_eq!(circuits[0]["state"], "open");

    // Five relayed failures plus the short-circuited sixth.
    let snapshot: serde_json::Value = client
        .get(format!("http://{}/__gateway/metrics", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["total_requests"], 6);
    assert_eq!(snapshot["failure_count"], 6);
    shutdown.trigger();
}

#[tokio::test]
async fn circuit_closes_again_after_successful_trial() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let backend = start_programmable_backend(move |_head| {
        let calls = calls_clone.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                (500, "boom".to_string())
            } else {
                (200, "back".to_string())
            }
        }
    })
    .await;

    let mut config = gateway_config("payments", &[(backend, 1)], "/api/payments");
    config.services[0].retry.max_retries = 0;
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.reset_timeout_secs = 1;
    config.health_check.failure_threshold = 100;
    let (addr, shutdown) = spawn_gateway(config).await;

    let client = test_client();
    for _ in 0..2 {
        client
            .get(format!("http://{}/api/payments/charge", addr))
            .send()
            .await
            .unwrap();
    }

    let rejected = client
        .get(format!("http://{}/api/payments/charge", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 503);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    // Half-open trial goes through and closes the breaker.
    let trial = client
        .get(format!("http://{}/api/payments/charge", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(trial.status(), 200);

    let after = client
        .get(format!("http://{}/api/payments/charge", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), 200);
    shutdown.trigger();
}
