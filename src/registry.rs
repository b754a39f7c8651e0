//! Zone Registry
//!
//! Thread-safe mapping from zone name to zone state. The same registry is
//! read by the DNS query path, so every access is a single atomic lookup,
//! upsert or snapshot; no lock outlives the call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::zone::Zone;

/// Registry entry the server keeps for its own identity zone. It is not an
/// operator-managed zone and never shows up in listings.
pub const SENTINEL_ZONE: &str = "pgeodns";

/// Name-keyed zone storage shared between the control plane and the DNS path
#[async_trait]
pub trait ZoneRegistry: Send + Sync {
    /// Point-in-time snapshot of every zone name, sentinel included
    async fn zone_names(&self) -> Vec<String>;

    /// Look up a zone by name
    async fn get(&self, name: &str) -> Option<Zone>;

    /// Add or replace a zone
    async fn upsert(&self, name: &str, zone: Zone);
}

/// In-memory registry guarded by a single map lock
pub struct MemoryRegistry {
    zones: Arc<RwLock<HashMap<String, Zone>>>,
}

impl MemoryRegistry {
    /// Create a registry holding only the sentinel zone
    pub fn new() -> Self {
        let mut zones = HashMap::new();
        zones.insert(SENTINEL_ZONE.to_string(), Zone::new(SENTINEL_ZONE));
        Self {
            zones: Arc::new(RwLock::new(zones)),
        }
    }

    /// Total number of entries, sentinel included
    pub async fn len(&self) -> usize {
        self.zones.read().await.len()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ZoneRegistry for MemoryRegistry {
    async fn zone_names(&self) -> Vec<String> {
        let zones = self.zones.read().await;
        zones.keys().cloned().collect()
    }

    async fn get(&self, name: &str) -> Option<Zone> {
        let zones = self.zones.read().await;
        zones.get(name).cloned()
    }

    async fn upsert(&self, name: &str, zone: Zone) {
        let mut zones = self.zones.write().await;
        zones.insert(name.to_string(), zone);
    }
}
