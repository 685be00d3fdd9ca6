//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     GatewayConfig
//!     → instance.rs (ServiceDefinition + ServiceInstance construction)
//!     → route.rs (route table compilation)
//!     → ServiceRegistry (source of truth for services and routes)
//!
//! Per request:
//!     resolve_route(path, method) → Route or no match
//!     instances(service) → live instance list for the load balancer
//!
//! Background:
//!     poller.rs probes every instance on an interval
//!     → HealthTracker transition rule → instance status
//! ```
//!
//! # Design Decisions
//! - Registration is idempotent: same name replaces the prior definition
//! - `instances` never errors; unknown services return an empty list
//! - Failed health checks only update internal state, never surface
//! - Per-service DashMap entries keep unrelated services uncontended

pub mod instance;
pub mod poller;
pub mod route;

pub use instance::{InstanceStatus, RetryPolicy, ServiceDefinition, ServiceInstance};
pub use poller::{HealthCheckResult, HealthPoller};
pub use route::{Route, RouteTable};

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use dashmap::DashMap;
use url::Url;

use crate::config::GatewayConfig;

#[derive(Debug, Clone)]
struct ServiceEntry {
    definition: Arc<ServiceDefinition>,
    instances: Vec<Arc<ServiceInstance>>,
}

/// Source of truth for which services and instances exist and which
/// route an inbound request maps to.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, ServiceEntry>,
    routes: RouteTable,
}

impl ServiceRegistry {
    pub fn new(routes: RouteTable) -> Self {
        Self {
            services: DashMap::new(),
            routes,
        }
    }

    /// Build a registry from validated configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let registry = Self::new(RouteTable::from_config(&config.routes));

        for service in &config.services {
            let definition = ServiceDefinition {
                name: service.name.clone(),
                health_check_path: service.health_check_path.clone(),
                base_timeout: service.base_timeout_secs.map(Duration::from_secs),
                retry_policy: RetryPolicy {
                    max_retries: service.retry.max_retries,
                    base_delay: Duration::from_millis(service.retry.base_delay_ms),
                    max_delay: Duration::from_millis(service.retry.max_delay_ms),
                },
            };

            let mut instances = Vec::new();
            for (index, ic) in service.instances.iter().enumerate() {
                let url = match Url::parse(&ic.url) {
                    Ok(url) => url,
                    Err(e) => {
                        // Validation rejects these at startup; a dynamically
                        // registered bad URL is skipped rather than fatal.
                        tracing::warn!(service = %service.name, url = %ic.url, error = %e, "Skipping instance with invalid URL");
                        continue;
                    }
                };
                let id = ic.id.clone().unwrap_or_else(|| {
                    format!("{}-{}", service.name, instance_suffix(&url, index))
                });
                instances.push(Arc::new(ServiceInstance::new(id, url, ic.weight)));
            }

            registry.register_service(definition, instances);
        }

        registry
    }

    /// Register a service with its instances. Idempotent: a prior
    /// definition with the same name is replaced wholesale.
    pub fn register_service(
        &self,
        definition: ServiceDefinition,
        instances: Vec<Arc<ServiceInstance>>,
    ) {
        let name = definition.name.clone();
        tracing::info!(
            service = %name,
            instance_count = instances.len(),
            "Registering service"
        );
        self.services.insert(
            name,
            ServiceEntry {
                definition: Arc::new(definition),
                instances,
            },
        );
    }

    /// The definition for a service, if registered.
    pub fn definition(&self, service: &str) -> Option<Arc<ServiceDefinition>> {
        self.services.get(service).map(|e| e.definition.clone())
    }

    /// Live instance list for a service; empty if the service is unknown.
    pub fn instances(&self, service: &str) -> Vec<Arc<ServiceInstance>> {
        self.services
            .get(service)
            .map(|e| e.instances.clone())
            .unwrap_or_default()
    }

    /// Resolve the most specific route for a path/method pair.
    pub fn resolve_route(&self, path: &str, method: &Method) -> Option<Arc<Route>> {
        self.routes.resolve(path, method)
    }

    /// Every registered instance paired with its service definition,
    /// for the health poller and the operator API.
    pub fn all_instances(&self) -> Vec<(Arc<ServiceDefinition>, Arc<ServiceInstance>)> {
        self.services
            .iter()
            .flat_map(|entry| {
                let definition = entry.definition.clone();
                entry
                    .instances
                    .iter()
                    .map(move |i| (definition.clone(), i.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

fn instance_suffix(url: &Url, index: usize) -> String {
    match (url.host_str(), url.port_or_known_default()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => index.to_string(),
    }
}
