//! End-to-end dispatch tests: route resolution, forwarding, load
//! distribution, and the operator endpoints.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use gateway_dispatch::config::Algorithm;

use common::*;

#[tokio::test]
async fn forwards_request_to_backend() {
    let backend = start_mock_backend("hello from backend").await;
    let config = gateway_config("orders", &[(backend, 1)], "/api/orders");
    let (addr, shutdown) = spawn_gateway(config).await;

    let response = test_client()
        .get(format!("http://{}/api/orders/list", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "hello from backend");
    shutdown.trigger();
}

#[tokio::test]
async fn strips_matched_prefix_when_configured() {
    let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let backend = start_programmable_backend(move |head| {
        let seen = seen_clone.clone();
        async move {
            if let Some(line) = head.lines().next() {
                seen.lock().await.push(line.to_string());
            }
            (200, "ok".to_string())
        }
    })
    .await;

    let mut config = gateway_config("orders", &[(backend, 1)], "/api/orders");
    config.routes[0].strip_path_prefix = true;
    let (addr, shutdown) = spawn_gateway(config).await;

    let response = test_client()
        .get(format!("http://{}/api/orders/list?page=2", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let lines = seen.lock().await;
    assert_eq!(lines.len(), 1);
    assert!(
        lines[0].starts_with("GET /list?page=2 "),
        "unexpected request line: {}",
        lines[0]
    );
    shutdown.trigger();
}

#[tokio::test]
async fn unmatched_path_returns_route_not_found_envelope() {
    let backend = start_mock_backend("unused").await;
    let config = gateway_config("orders", &[(backend, 1)], "/api/orders");
    let (addr, shutdown) = spawn_gateway(config).await;

    let response = test_client()
        .get(format!("http://{}/nope", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "ROUTE_NOT_FOUND");
    shutdown.trigger();
}

#[tokio::test]
async fn service_without_instances_returns_no_healthy_instance() {
    let config = gateway_config("orders", &[], "/api/orders");
    let (addr, shutdown) = spawn_gateway(config).await;

    let client = test_client();
    let response = client
        .get(format!("http://{}/api/orders/list", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NO_HEALTHY_INSTANCE");

    // The rejection still counts as a failed request in the snapshot.
    let snapshot: serde_json::Value = client
        .get(format!("http://{}/__gateway/metrics", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["total_requests"], 1);
    assert_eq!(snapshot["failure_count"], 1);
    assert_eq!(snapshot["services"]["orders"]["failure_count"], 1);
    shutdown.trigger();
}

#[tokio::test]
async fn weighted_round_robin_distributes_by_weight() {
    let count_a = Arc::new(AtomicU32::new(0));
    let count_b = Arc::new(AtomicU32::new(0));

    let a = count_a.clone();
    let backend_a = start_programmable_backend(move |_head| {
        let a = a.clone();
        async move {
            a.fetch_add(1, Ordering::SeqCst);
            (200, "a".to_string())
        }
    })
    .await;

    let b = count_b.clone();
    let backend_b = start_programmable_backend(move |_head| {
        let b = b.clone();
        async move {
            b.fetch_add(1, Ordering::SeqCst);
            (200, "b".to_string())
        }
    })
    .await;

    let mut config = gateway_config("orders", &[(backend_a, 1), (backend_b, 3)], "/api/orders");
    config.load_balancer.algorithm = Algorithm::WeightedRoundRobin;
    let (addr, shutdown) = spawn_gateway(config).await;

    let client = test_client();
    for _ in 0..100 {
        let response = client
            .get(format!("http://{}/api/orders/list", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    // Sequential requests make the rotation exact: 1 in 4 to A, 3 in 4 to B.
    assert_eq!(count_a.load(Ordering::SeqCst), 25);
    assert_eq!(count_b.load(Ordering::SeqCst), 75);
    shutdown.trigger();
}

#[tokio::test]
async fn metrics_endpoint_reflects_traffic() {
    let backend = start_mock_backend("ok").await;
    let config = gateway_config("orders", &[(backend, 1)], "/api/orders");
    let (addr, shutdown) = spawn_gateway(config).await;

    let client = test_client();
    for _ in 0..3 {
        client
            .get(format!("http://{}/api/orders/list", addr))
            .send()
            .await
            .unwrap();
    }

    let snapshot: serde_json::Value = client
        .get(format!("http://{}/__gateway/metrics", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(snapshot["total_requests"], 3);
    assert_eq!(snapshot["success_count"], 3);
    assert_eq!(snapshot["failure_count"], 0);
    assert_eq!(snapshot["services"]["orders"]["total_requests"], 3);
    shutdown.trigger();
}

#[tokio::test]
async fn health_endpoint_lists_instances() {
    let backend = start_mock_backend("ok").await;
    let config = gateway_config("orders", &[(backend, 1)], "/api/orders");
    let (addr, shutdown) = spawn_gateway(config).await;

    let client = test_client();
    client
        .get(format!("http://{}/api/orders/list", addr))
        .send()
        .await
        .unwrap();

    let records: serde_json::Value = client
        .get(format!("http://{}/__gateway/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["service"], "orders");
    assert_eq!(records[0]["healthy"], true);
    shutdown.trigger();
}
