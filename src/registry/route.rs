//! Route table and matching.
//!
//! # Responsibilities
//! - Store compiled routes, immutable after construction
//! - Match inbound path/method to a target service
//!
//! # Design Decisions
//! - Longest prefix wins; declaration order breaks ties (first match wins)
//! - Method filter is optional; absent matches any method
//! - No regex in the hot path, prefix matching only

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;

use crate::config::RouteConfig;

/// A compiled routing rule.
#[derive(Debug, Clone)]
pub struct Route {
    /// Path prefix matched against the inbound request path.
    pub path_prefix: String,
    /// Target service name.
    pub service: String,
    /// Method filter; `None` matches any method.
    pub method: Option<Method>,
    /// Carried for the surrounding auth middleware; not enforced here.
    pub requires_auth: bool,
    /// Strip the matched prefix before forwarding.
    pub strip_path_prefix: bool,
    /// Per-route deadline override.
    pub timeout: Option<Duration>,
    /// Carried for the surrounding rate-limit middleware; not enforced here.
    pub rate_limit: Option<u32>,
}

impl Route {
    fn matches(&self, path: &str, method: &Method) -> bool {
        if let Some(expected) = &self.method {
            if expected != method {
                return false;
            }
        }
        // The prefix must end on a segment boundary: /api matches /api
        // and /api/x but never /apifoo.
        match path.strip_prefix(self.path_prefix.as_str()) {
            Some(rest) => {
                rest.is_empty() || rest.starts_with('/') || self.path_prefix.ends_with('/')
            }
            None => false,
        }
    }
}

/// Immutable, ordered route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    /// Compile a route table from configuration. Declaration order is
    /// preserved for tie-breaking.
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let routes = configs
            .iter()
            .filter_map(|rc| {
                let method = match &rc.method {
                    Some(m) => match m.parse::<Method>() {
                        Ok(parsed) => Some(parsed),
                        Err(_) => {
                            tracing::warn!(method = %m, path = %rc.path_prefix, "Skipping route with invalid method");
                            return None;
                        }
                    },
                    None => None,
                };
                Some(Arc::new(Route {
                    path_prefix: rc.path_prefix.clone(),
                    service: rc.service.clone(),
                    method,
                    requires_auth: rc.requires_auth,
                    strip_path_prefix: rc.strip_path_prefix,
                    timeout: rc.timeout_secs.map(Duration::from_secs),
                    rate_limit: rc.rate_limit,
                }))
            })
            .collect();
        Self { routes }
    }

    /// Resolve the most specific route for a path/method pair.
    ///
    /// Longest matching prefix wins; among equally long prefixes the first
    /// declared route is returned.
    pub fn resolve(&self, path: &str, method: &Method) -> Option<Arc<Route>> {
        let mut best: Option<&Arc<Route>> = None;
        for route in &self.routes {
            if !route.matches(path, method) {
                continue;
            }
            match best {
                // Strictly longer prefix replaces; equal keeps the earlier one.
                Some(current) if route.path_prefix.len() <= current.path_prefix.len() => {}
                _ => best = Some(route),
            }
        }
        best.cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_config(prefix: &str, service: &str, method: Option<&str>) -> RouteConfig {
        RouteConfig {
            path_prefix: prefix.into(),
            service: service.into(),
            method: method.map(Into::into),
            requires_auth: false,
            strip_path_prefix: false,
            timeout_secs: None,
            rate_limit: None,
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::from_config(&[
            route_config("/api", "generic", None),
            route_config("/api/orders", "orders", None),
        ]);

        let route = table.resolve("/api/orders/42", &Method::GET).unwrap();
        assert_eq!(route.service, "orders");

        let route = table.resolve("/api/users", &Method::GET).unwrap();
        assert_eq!(route.service, "generic");
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let table = RouteTable::from_config(&[
            route_config("/api", "first", None),
            route_config("/api", "second", None),
        ]);
        let route = table.resolve("/api/x", &Method::GET).unwrap();
        assert_eq!(route.service, "first");
    }

    #[test]
    fn method_filter_applies() {
        let table = RouteTable::from_config(&[
            route_config("/api", "reads", Some("GET")),
            route_config("/api", "writes", Some("POST")),
        ]);
        assert_eq!(table.resolve("/api", &Method::GET).unwrap().service, "reads");
        assert_eq!(table.resolve("/api", &Method::POST).unwrap().service, "writes");
        assert!(table.resolve("/api", &Method::DELETE).is_none());
    }

    #[test]
    fn prefix_match_requires_segment_boundary() {
        let table = RouteTable::from_config(&[route_config("/api", "svc", None)]);
        assert!(table.resolve("/api", &Method::GET).is_some());
        assert!(table.resolve("/api/x", &Method::GET).is_some());
        assert!(
            table.resolve("/apifoo", &Method::GET).is_none(),
            "prefix must not match inside a path segment"
        );

        let root = RouteTable::from_config(&[route_config("/", "svc", None)]);
        assert!(root.resolve("/anything", &Method::GET).is_some());
    }

    #[test]
    fn no_match_returns_none() {
        let table = RouteTable::from_config(&[route_config("/api", "svc", None)]);
        assert!(table.resolve("/other", &Method::GET).is_none());
    }
}
