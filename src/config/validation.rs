//! Configuration validation.
//!
//! Semantic checks on top of serde's syntactic ones: referential integrity
//! (routes reference existing services), value ranges (thresholds and
//! timeouts above zero), and URL well-formedness. Returns all errors, not
//! just the first, and runs once before the config is accepted.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("duplicate service name: {0}")]
    DuplicateService(String),

    #[error("service {service}: invalid instance url {url}: {reason}")]
    InvalidInstanceUrl {
        service: String,
        url: String,
        reason: String,
    },

    #[error("service {service}: instance weight must be >= 1")]
    ZeroWeight { service: String },

    #[error("service {service}: health check path must start with '/'")]
    BadHealthPath { service: String },

    #[error("route {path}: references unknown service {service}")]
    UnknownService { path: String, service: String },

    #[error("route {path}: path prefix must start with '/'")]
    BadPathPrefix { path: String },

    #[error("route {path}: invalid method {method}")]
    BadMethod { path: String, method: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    for service in &config.services {
        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if !service.health_check_path.starts_with('/') {
            errors.push(ValidationError::BadHealthPath {
                service: service.name.clone(),
            });
        }
        for instance in &service.instances {
            if let Err(e) = Url::parse(&instance.url) {
                errors.push(ValidationError::InvalidInstanceUrl {
                    service: service.name.clone(),
                    url: instance.url.clone(),
                    reason: e.to_string(),
                });
            }
            if instance.weight == 0 {
                errors.push(ValidationError::ZeroWeight {
                    service: service.name.clone(),
                });
            }
        }
    }

    for route in &config.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::BadPathPrefix {
                path: route.path_prefix.clone(),
            });
        }
        if !names.contains(route.service.as_str()) {
            errors.push(ValidationError::UnknownService {
                path: route.path_prefix.clone(),
                service: route.service.clone(),
            });
        }
        if let Some(method) = &route.method {
            if method.parse::<axum::http::Method>().is_err() {
                errors.push(ValidationError::BadMethod {
                    path: route.path_prefix.clone(),
                    method: method.clone(),
                });
            }
        }
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "health_check.interval_secs",
        });
    }
    if config.health_check.failure_threshold == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "health_check.failure_threshold",
        });
    }
    if config.health_check.recovery_threshold == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "health_check.recovery_threshold",
        });
    }
    if config.health_check.probe_concurrency == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "health_check.probe_concurrency",
        });
    }
    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "circuit_breaker.failure_threshold",
        });
    }
    if config.circuit_breaker.reset_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "circuit_breaker.reset_timeout_secs",
        });
    }
    if config.proxy.default_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue {
            field: "proxy.default_timeout_secs",
        });
    }
    if config.load_balancer.sticky_sessions.enabled
        && config.load_balancer.sticky_sessions.ttl_secs == 0
    {
        errors.push(ValidationError::ZeroValue {
            field: "load_balancer.sticky_sessions.ttl_secs",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
