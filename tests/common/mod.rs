//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gateway_dispatch::config::{GatewayConfig, InstanceConfig, RouteConfig, ServiceConfig};
use gateway_dispatch::lifecycle::Shutdown;
use gateway_dispatch::HttpServer;

/// Start a mock backend returning a fixed 200 response.
/// Returns the ephemeral address it listens on.
#[allow(dead_code)]
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_head| async move { (200, body.to_string()) }).await
}

/// Start a programmable mock backend. The closure receives the raw
/// request head (request line + headers) and returns (status, body).
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let mut head = Vec::new();
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => break,
                                Ok(n) => {
                                    head.extend_from_slice(&buf[..n]);
                                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                                Err(_) => return,
                            }
                        }
                        let head = String::from_utf8_lossy(&head).to_string();
                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Build a single-service, single-route config pointed at the given
/// backends, with health polling disabled for deterministic tests.
#[allow(dead_code)]
pub fn gateway_config(
    service: &str,
    backends: &[(SocketAddr, u32)],
    path_prefix: &str,
) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.health_check.enabled = false;
    config.services.push(ServiceConfig {
        name: service.into(),
        health_check_path: "/health".into(),
        base_timeout_secs: None,
        retry: Default::default(),
        instances: backends
            .iter()
            .map(|(addr, weight)| InstanceConfig {
                id: None,
                url: format!("http://{}", addr),
                weight: *weight,
            })
            .collect(),
    });
    config.routes.push(RouteConfig {
        path_prefix: path_prefix.into(),
        service: service.into(),
        method: None,
        requires_auth: false,
        strip_path_prefix: false,
        timeout_secs: None,
        rate_limit: None,
    });
    config
}

/// Spawn a gateway on an ephemeral port and wait until it accepts.
#[allow(dead_code)]
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.clone();

    tokio::spawn(async move {
        let _ = server.run(listener, &server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}

/// Non-pooling client so every request opens a fresh connection.
#[allow(dead_code)]
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
