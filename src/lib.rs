//! Zone Control Plane
//!
//! Authenticated HTTP management interface for the zones loaded in a running
//! DNS server.
//!
//! ## Architecture
//!
//! ```text
//! Operator → HTTP → Bearer check → Zone handlers → Zone Registry ← DNS query path
//!                                        ↓
//!                                  Zone files (<zones_dir>/<name>.json)
//! ```
//!
//! ## Components
//!
//! - `config`: TOML configuration for the HTTP control interface
//! - `auth`: Bearer token check applied to every request
//! - `zone`: Zone entity built from an untyped JSON document
//! - `registry`: Shared name-keyed zone storage
//! - `persistence`: One JSON file per zone, reloaded at startup
//! - `api`: List, get and create-or-replace handlers
//! - `server`: Listener lifecycle, connection timeouts and graceful shutdown

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod persistence;
pub mod registry;
pub mod server;
pub mod zone;

pub use api::{ApiResponse, ControlApi};
pub use auth::BearerAuth;
pub use config::{ControlConfig, HttpConfig};
pub use error::{ApiError, ControlError};
pub use persistence::ZoneFiles;
pub use registry::{MemoryRegistry, ZoneRegistry, SENTINEL_ZONE};
pub use server::{ControlServer, ServerState, ServerTimeouts};
pub use zone::Zone;
