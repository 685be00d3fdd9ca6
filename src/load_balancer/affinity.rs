//! Sticky session bindings.
//!
//! # Responsibilities
//! - Bind a client key to an instance id with a TTL
//! - Refresh the TTL on every selection for that key
//! - Expire entries lazily on lookup
//!
//! # Design Decisions
//! - Entries self-expire; no background sweeper is needed because a
//!   stale entry is dropped the next time its key is looked up

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct AffinityEntry {
    instance_id: String,
    expires_at: Instant,
}

/// Client-key → instance-id table with TTL semantics.
#[derive(Debug)]
pub struct SessionAffinity {
    entries: DashMap<String, AffinityEntry>,
    ttl: Duration,
}

impl SessionAffinity {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// The bound instance id for a key, dropping the entry if expired.
    pub fn lookup(&self, client_key: &str) -> Option<String> {
        let expired = match self.entries.get(client_key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.instance_id.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(client_key);
        }
        None
    }

    /// Bind (or rebind) a key to an instance, refreshing the TTL.
    pub fn bind(&self, client_key: &str, instance_id: &str) {
        self.entries.insert(
            client_key.to_string(),
            AffinityEntry {
                instance_id: instance_id.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
