//! Active health polling.
//!
//! # Responsibilities
//! - Periodically probe every registered instance's health path
//! - Feed probe outcomes through the shared health transition rule
//!
//! # Design Decisions
//! - Probes run with bounded concurrency per poll cycle
//! - Non-2xx or timeout counts as a failure; the body is opaque
//! - A failed probe never surfaces to request handling, it only
//!   updates internal state

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use futures_util::stream::{self, StreamExt};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::health::HealthTracker;
use crate::registry::{ServiceDefinition, ServiceInstance, ServiceRegistry};

/// Outcome of a single out-of-band health probe.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub latency: Duration,
}

/// Background loop probing instance health on an interval.
pub struct HealthPoller {
    registry: Arc<ServiceRegistry>,
    tracker: Arc<HealthTracker>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthPoller {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        tracker: Arc<HealthTracker>,
        config: HealthCheckConfig,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            registry,
            tracker,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            concurrency = self.config.probe_concurrency,
            "Health poller starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every registered instance, at most `probe_concurrency` at a time.
    pub async fn check_all(&self) {
        let targets = self.registry.all_instances();

        stream::iter(targets)
            .for_each_concurrent(self.config.probe_concurrency, |(definition, instance)| {
                let this = &*self;
                async move {
                    let result = this.check_health(&definition, &instance).await;
                    this.tracker
                        .record_probe(&instance, result.healthy, result.latency);
                    crate::observability::metrics::record_instance_health(
                        &instance.id,
                        this.tracker.is_healthy(&instance.id),
                    );
                }
            })
            .await;
    }

    /// Issue one GET to the instance's health path with a bounded timeout.
    pub async fn check_health(
        &self,
        definition: &ServiceDefinition,
        instance: &ServiceInstance,
    ) -> HealthCheckResult {
        let started = Instant::now();
        let uri = format!(
            "{}{}",
            instance.url.as_str().trim_end_matches('/'),
            definition.health_check_path
        );

        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "gateway-dispatch-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(instance = %instance.id, error = %e, "Failed to build health check request");
                return HealthCheckResult {
                    healthy: false,
                    latency: started.elapsed(),
                };
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let healthy = match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(
                        instance = %instance.id,
                        status = %response.status(),
                        "Health check failed: non-success status"
                    );
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(instance = %instance.id, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(instance = %instance.id, "Health check failed: timeout");
                false
            }
        };

        HealthCheckResult {
            healthy,
            latency: started.elapsed(),
        }
    }
}
