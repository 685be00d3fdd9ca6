//! HTTP server wiring for the gateway.
//!
//! # Responsibilities
//! - Construct the dispatch core (registry, balancer, breakers, proxy,
//!   metrics) once at startup and inject it into the handlers
//! - Route every unmatched request through the dispatch handler
//! - Expose the read-only operator endpoints
//! - Serve with request-id propagation, tracing, and graceful shutdown

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::FutureExt;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{HealthTracker, InstanceHealthView, LoadBalancer};
use crate::observability::{self, MetricsAggregator, RequestMetricsSnapshot};
use crate::proxy::{DispatchError, ProxyExecutor};
use crate::registry::{HealthPoller, ServiceRegistry};
use crate::resilience::{CircuitBreakerRegistry, CircuitState};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub tracker: Arc<HealthTracker>,
    pub balancer: Arc<LoadBalancer>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub proxy: Arc<ProxyExecutor>,
    pub aggregator: Arc<MetricsAggregator>,
}

/// The gateway HTTP server.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Build the dispatch core from validated configuration.
    ///
    /// This is the composition root: every component is constructed once
    /// here and passed by reference, no hidden singletons.
    pub fn new(config: GatewayConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::from_config(&config));
        let tracker = Arc::new(HealthTracker::new(
            config.health_check.failure_threshold,
            config.health_check.recovery_threshold,
        ));
        let balancer = Arc::new(LoadBalancer::new(
            registry.clone(),
            tracker.clone(),
            &config.load_balancer,
        ));
        let breakers = Arc::new(CircuitBreakerRegistry::new(&config.circuit_breaker));
        let aggregator = Arc::new(MetricsAggregator::new());
        let proxy = Arc::new(ProxyExecutor::new(
            registry.clone(),
            balancer.clone(),
            breakers.clone(),
            aggregator.clone(),
            config.proxy.clone(),
        ));

        let state = AppState {
            registry,
            tracker,
            balancer,
            breakers,
            proxy,
            aggregator,
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        // Outer safety net above the executor's own deadlines: the
        // longest configured route budget plus a grace second.
        let longest_budget = config
            .routes
            .iter()
            .filter_map(|r| r.timeout_secs)
            .chain(config.services.iter().filter_map(|s| s.base_timeout_secs))
            .chain(std::iter::once(config.proxy.default_timeout_secs))
            .max()
            .unwrap_or(config.proxy.default_timeout_secs);

        Router::new()
            .route("/__gateway/metrics", get(metrics_snapshot))
            .route("/__gateway/health", get(instance_health))
            .route("/__gateway/circuits", get(circuit_states))
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(longest_budget + 1)))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway server starting");

        if self.config.health_check.enabled {
            let poller = HealthPoller::new(
                self.state.registry.clone(),
                self.state.tracker.clone(),
                self.config.health_check.clone(),
            );
            let poller_shutdown = shutdown.subscribe();
            tokio::spawn(async move {
                poller.run(poller_shutdown).await;
            });
        }

        let mut rx = shutdown.subscribe();
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = rx.recv().await;
        })
        .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The constructed dispatch core, for embedding and tests.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Main dispatch handler: resolve route, forward, relay or map errors.
async fn dispatch_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let route = match state.registry.resolve_route(&path, &method) {
        Some(route) => route,
        None => {
            tracing::debug!(method = %method, path = %path, "No route matched");
            observability::metrics::record_dispatch("none", 404, start);
            return DispatchError::RouteNotFound {
                method: method.to_string(),
                path,
            }
            .into_response();
        }
    };

    let client_key = client_key(&request, addr);

    // Panics inside dispatch must never leak a stack trace to the
    // client; they become the generic envelope instead.
    let result = AssertUnwindSafe(state.proxy.forward(request, &route, client_key.as_deref()))
        .catch_unwind()
        .await;

    let response = match result {
        Ok(Ok(response)) => response.into_response(),
        Ok(Err(error)) => {
            tracing::warn!(
                service = %route.service,
                path = %path,
                error = %error,
                "Dispatch failed"
            );
            error.into_response()
        }
        Err(_) => {
            tracing::error!(service = %route.service, path = %path, "Panic during dispatch");
            DispatchError::Internal.into_response()
        }
    };

    observability::metrics::record_dispatch(&route.service, response.status().as_u16(), start);
    response
}

/// Client key for affinity and hashing: the first X-Forwarded-For hop
/// when present, the peer address otherwise.
fn client_key(request: &Request<Body>, addr: SocketAddr) -> Option<String> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| Some(addr.ip().to_string()))
}

/// Operator endpoint: point-in-time request metrics.
async fn metrics_snapshot(State(state): State<AppState>) -> Json<RequestMetricsSnapshot> {
    Json(state.aggregator.snapshot())
}

/// Operator endpoint: per-instance health records.
async fn instance_health(State(state): State<AppState>) -> Json<Vec<InstanceHealthView>> {
    let pairs: Vec<(String, _)> = state
        .registry
        .all_instances()
        .into_iter()
        .map(|(definition, instance)| (definition.name.clone(), instance))
        .collect();
    Json(state.tracker.views(&pairs))
}

#[derive(serde::Serialize)]
struct CircuitView {
    service: String,
    state: CircuitState,
}

/// Operator endpoint: per-service circuit breaker states. The gauge is
/// recorded at the breaker's own transition points; this is a pure view.
async fn circuit_states(State(state): State<AppState>) -> Json<Vec<CircuitView>> {
    let views = state
        .breakers
        .states()
        .into_iter()
        .map(|(service, state)| CircuitView { service, state })
        .collect();
    Json(views)
}
