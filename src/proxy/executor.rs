//! Request forwarding with retries, backoff, and deadline enforcement.
//!
//! # Responsibilities
//! - Resolve a target instance and gate on the service's circuit breaker
//! - Rewrite and forward the request, relay the response
//! - Retry retryable failures with exponential backoff, re-selecting an
//!   instance each attempt to route around a just-failed one
//! - Report outcomes: health record per attempt, breaker and request
//!   metrics once per request
//!
//! # Design Decisions
//! - Admission is an RAII breaker permit: a dispatch future dropped
//!   mid-flight settles the permit as a failure instead of stranding it
//! - The request body is buffered up front so retries can replay it
//! - 5xx/429 and transport errors are retryable; other 4xx relay untouched
//! - The deadline bounds the whole request including backoff sleeps;
//!   expiry mid-attempt aborts instead of draining remaining retries

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{request::Parts, Request, Response, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::{self, Instant as Deadline};

use crate::config::ProxySettings;
use crate::load_balancer::LoadBalancer;
use crate::observability::{MetricsAggregator, Outcome};
use crate::proxy::error::DispatchError;
use crate::proxy::headers::strip_hop_by_hop;
use crate::registry::{RetryPolicy, Route, ServiceInstance, ServiceRegistry};
use crate::resilience::{retry_delay, CircuitBreakerRegistry};

/// Forwards requests to resolved backend instances.
pub struct ProxyExecutor {
    registry: Arc<ServiceRegistry>,
    balancer: Arc<LoadBalancer>,
    breakers: Arc<CircuitBreakerRegistry>,
    aggregator: Arc<MetricsAggregator>,
    client: Client<HttpConnector, Body>,
    settings: ProxySettings,
}

impl ProxyExecutor {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        balancer: Arc<LoadBalancer>,
        breakers: Arc<CircuitBreakerRegistry>,
        aggregator: Arc<MetricsAggregator>,
        settings: ProxySettings,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            registry,
            balancer,
            breakers,
            aggregator,
            client,
            settings,
        }
    }

    /// Forward a request along a resolved route.
    ///
    /// Returns either a relayed backend response (including relayed 4xx
    /// and exhausted-retry 5xx) or a `DispatchError` for failures with no
    /// backend response to relay.
    pub async fn forward(
        &self,
        request: Request<Body>,
        route: &Route,
        client_key: Option<&str>,
    ) -> Result<Response<Body>, DispatchError> {
        let service = route.service.as_str();
        let definition = self.registry.definition(service);
        let retry_policy = definition
            .as_ref()
            .map(|d| d.retry_policy.clone())
            .unwrap_or_default();
        let budget = route
            .timeout
            .or(definition.as_ref().and_then(|d| d.base_timeout))
            .unwrap_or(Duration::from_secs(self.settings.default_timeout_secs));

        let started = Instant::now();

        let mut instance = match self.balancer.select_instance(service, client_key) {
            Some(instance) => instance,
            None => {
                self.aggregator.record_rejection(service, started.elapsed());
                return Err(DispatchError::NoHealthyInstance {
                    service: service.to_string(),
                });
            }
        };

        // Buffer the body before the breaker gate: a half-open trial slot
        // must not leak if the client streams a bad body.
        let (parts, body) = request.into_parts();
        let body_bytes = match axum::body::to_bytes(body, self.settings.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Failed to buffer request body");
                self.aggregator.record_rejection(service, started.elapsed());
                return Err(DispatchError::Internal);
            }
        };

        let breaker = self.breakers.breaker(service);
        let permit = match breaker.acquire() {
            Some(permit) => permit,
            None => {
                tracing::debug!(service = %service, "Circuit open, rejecting without attempt");
                self.aggregator.record_rejection(service, started.elapsed());
                return Err(DispatchError::CircuitOpen {
                    service: service.to_string(),
                });
            }
        };

        let deadline = Deadline::now() + budget;
        let mut last_error: Option<DispatchError> = None;

        for attempt in 0..=retry_policy.max_retries {
            if attempt > 0 {
                // Route around the instance that just failed when possible.
                match self.balancer.select_instance(service, client_key) {
                    Some(next) => instance = next,
                    None => {
                        last_error = Some(DispatchError::NoHealthyInstance {
                            service: service.to_string(),
                        });
                        break;
                    }
                }
            }

            let outbound = match self.build_outbound(&parts, &body_bytes, route, &instance) {
                Ok(req) => req,
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            };

            let _guard = self.balancer.track_connection(&instance);
            let attempt_started = Instant::now();

            tracing::debug!(
                service = %service,
                instance = %instance.id,
                attempt,
                "Forwarding request"
            );

            match time::timeout_at(deadline, self.client.request(outbound)).await {
                Err(_) => {
                    // Deadline expired mid-attempt: abort, no more retries.
                    self.balancer
                        .record_failure(&instance, attempt_started.elapsed());
                    last_error = Some(DispatchError::UpstreamTimeout {
                        service: service.to_string(),
                    });
                    break;
                }
                Ok(Err(e)) => {
                    self.balancer
                        .record_failure(&instance, attempt_started.elapsed());
                    tracing::warn!(
                        service = %service,
                        instance = %instance.id,
                        attempt,
                        error = %e,
                        "Upstream transport error"
                    );
                    last_error = Some(DispatchError::UpstreamUnreachable {
                        service: service.to_string(),
                        reason: e.to_string(),
                    });
                    if attempt < retry_policy.max_retries
                        && self.backoff(attempt, &retry_policy, deadline).await
                    {
                        continue;
                    }
                    break;
                }
                Ok(Ok(response)) => {
                    let status = response.status();
                    if is_retryable_status(status) {
                        self.balancer
                            .record_failure(&instance, attempt_started.elapsed());
                        tracing::warn!(
                            service = %service,
                            instance = %instance.id,
                            attempt,
                            status = %status,
                            "Upstream server error"
                        );
                        if attempt < retry_policy.max_retries
                            && self.backoff(attempt, &retry_policy, deadline).await
                        {
                            continue;
                        }
                        // Retries exhausted: the backend's answer is
                        // relayed as-is, but the request still failed.
                        permit.record_failure();
                        self.aggregator.record(
                            service,
                            &instance.id,
                            Outcome::Failure,
                            started.elapsed(),
                        );
                        return Ok(relay(response));
                    }

                    // The backend responded (2xx-4xx): that is a success
                    // signal regardless of what it said.
                    self.balancer
                        .record_success(&instance, attempt_started.elapsed());
                    permit.record_success();
                    self.aggregator.record(
                        service,
                        &instance.id,
                        Outcome::Success,
                        started.elapsed(),
                    );
                    return Ok(relay(response));
                }
            }
        }

        permit.record_failure();
        let error = last_error.unwrap_or(DispatchError::Internal);
        self.aggregator
            .record(service, &instance.id, Outcome::Failure, started.elapsed());
        Err(error)
    }

    /// Sleep the exponential backoff for a failed attempt. Returns false
    /// when the remaining deadline budget cannot cover the delay.
    async fn backoff(&self, attempt: u32, policy: &RetryPolicy, deadline: Deadline) -> bool {
        let delay = retry_delay(attempt, policy.base_delay, policy.max_delay);
        if Deadline::now() + delay >= deadline {
            return false;
        }
        time::sleep(delay).await;
        true
    }

    /// Build the outbound request for one attempt: rewritten URI,
    /// sanitized headers, replayed body.
    fn build_outbound(
        &self,
        parts: &Parts,
        body: &Bytes,
        route: &Route,
        instance: &ServiceInstance,
    ) -> Result<Request<Body>, DispatchError> {
        let path = parts.uri.path();
        let mut target = if route.strip_path_prefix && path.starts_with(&route.path_prefix) {
            let rest = &path[route.path_prefix.len()..];
            if rest.is_empty() {
                "/".to_string()
            } else if rest.starts_with('/') {
                rest.to_string()
            } else {
                format!("/{}", rest)
            }
        } else {
            path.to_string()
        };
        if let Some(query) = parts.uri.query() {
            target.push('?');
            target.push_str(query);
        }

        let uri: Uri = format!("{}{}", instance.url.as_str().trim_end_matches('/'), target)
            .parse()
            .map_err(|e| {
                tracing::error!(instance = %instance.id, error = %e, "Failed to build outbound URI");
                DispatchError::Internal
            })?;

        let mut outbound = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .body(Body::from(body.clone()))
            .map_err(|e| {
                tracing::error!(instance = %instance.id, error = %e, "Failed to build outbound request");
                DispatchError::Internal
            })?;
        *outbound.headers_mut() = parts.headers.clone();
        strip_hop_by_hop(outbound.headers_mut());

        Ok(outbound)
    }
}

/// 5xx and 429 mean the fleet is struggling; everything else the backend
/// says is its final answer.
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Relay a backend response to the caller, minus hop-by-hop headers.
fn relay(response: Response<hyper::body::Incoming>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
