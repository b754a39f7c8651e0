//! Zone Entity
//!
//! A named zone as held in the registry. The wire format is an untyped JSON
//! object; the fields the DNS path needs are absorbed into typed fields while
//! the whole document is kept for re-serialization.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default record TTL for a new zone
pub const DEFAULT_TTL: u32 = 120;

/// Default number of hosts returned per answer
pub const DEFAULT_MAX_HOSTS: u32 = 2;

/// A DNS zone and the document it was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    /// The zone name (e.g., "example.com")
    pub name: String,
    /// SOA serial
    pub serial: u32,
    /// Default TTL for records without their own
    pub ttl: u32,
    /// Maximum hosts returned in one answer
    pub max_hosts: u32,
    /// SOA contact mailbox
    pub contact: String,
    /// Targeting expression applied to the zone's labels
    pub targeting: String,
    /// Label name -> raw record data
    pub labels: BTreeMap<String, Value>,
    /// Last document applied to this zone
    pub document: Map<String, Value>,
}

impl Zone {
    /// Create an empty zone bound to `name`
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            contact: format!("hostmaster.{}", name),
            name,
            serial: 0,
            ttl: DEFAULT_TTL,
            max_hosts: DEFAULT_MAX_HOSTS,
            targeting: "@".to_string(),
            labels: BTreeMap::new(),
            document: Map::new(),
        }
    }

    /// Absorb a zone document.
    ///
    /// The zone is rebuilt from defaults first, so the result depends only on
    /// the name and `doc`. Known keys with the expected type overwrite the
    /// typed fields; anything else keeps the default.
    pub fn apply_document(&mut self, doc: &Map<String, Value>) {
        let name = std::mem::take(&mut self.name);
        *self = Zone::new(name);

        if let Some(serial) = doc.get("serial").and_then(as_u32) {
            self.serial = serial;
        }
        if let Some(ttl) = doc.get("ttl").and_then(as_u32) {
            self.ttl = ttl;
        }
        if let Some(max_hosts) = doc.get("max_hosts").and_then(as_u32) {
            self.max_hosts = max_hosts;
        }
        if let Some(contact) = doc.get("contact").and_then(Value::as_str) {
            self.contact = contact.to_string();
        }
        if let Some(targeting) = doc.get("targeting").and_then(Value::as_str) {
            self.targeting = targeting.to_string();
        }
        if let Some(data) = doc.get("data").and_then(Value::as_object) {
            self.labels = data
                .iter()
                .map(|(label, value)| (label.clone(), value.clone()))
                .collect();
        }

        self.document = doc.clone();
    }

    /// Number of labels in the zone
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}
