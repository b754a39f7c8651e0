//! Zone File Persistence
//!
//! One JSON document per zone at `<zones_dir>/<name>.json`. Zones are written
//! before they are published to the registry, and reloaded from the same
//! directory at startup.

use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::registry::ZoneRegistry;
use crate::zone::Zone;

/// File mode for persisted zone documents
pub const ZONE_FILE_MODE: u32 = 0o644;

const ZONE_FILE_EXTENSION: &str = "json";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Filesystem storage for zone documents
#[derive(Debug, Clone)]
pub struct ZoneFiles {
    dir: PathBuf,
}

impl ZoneFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the zone files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the document for `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, ZONE_FILE_EXTENSION))
    }

    /// Write `data` as the document for `name`, replacing any previous content.
    ///
    /// The bytes go to a temporary file in the same directory which is synced
    /// and then renamed over the zone file, so readers see either the old or
    /// the new document in full.
    pub async fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path_for(name);
        let tmp = self.temp_path_for(name);

        if let Err(e) = replace_file(&tmp, &path, data).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(e);
        }

        // The new document is in place from here on; a failed directory sync
        // must not turn the write into an error
        #[cfg(unix)]
        {
            if let Err(e) = sync_dir(&self.dir).await {
                warn!("Failed to sync {}: {}", self.dir.display(), e);
            }
        }

        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    /// Scratch location for an in-progress write of `name`. Never carries the
    /// zone file extension, so `load_all` ignores leftovers.
    fn temp_path_for(&self, name: &str) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{}.{}.{}-{}.tmp",
            name,
            ZONE_FILE_EXTENSION,
            std::process::id(),
            seq
        ))
    }

    /// Load every readable zone document in the directory.
    ///
    /// Unreadable or malformed files are logged and skipped.
    pub async fn load_all(&self) -> io::Result<Vec<Zone>> {
        let mut zones = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ZONE_FILE_EXTENSION) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping zone file with non UTF-8 name: {}", path.display());
                continue;
            };

            match read_document(&path).await {
                Ok(doc) => {
                    let mut zone = Zone::new(name);
                    zone.apply_document(&doc);
                    zones.push(zone);
                }
                Err(e) => warn!("Skipping zone file {}: {}", path.display(), e),
            }
        }

        Ok(zones)
    }

    /// Load all zone documents and publish them into `registry`
    pub async fn restore_to(&self, registry: &dyn ZoneRegistry) -> io::Result<usize> {
        let zones = self.load_all().await?;
        let count = zones.len();
        for zone in zones {
            let name = zone.name.clone();
            registry.upsert(&name, zone).await;
        }
        Ok(count)
    }
}

async fn replace_file(tmp: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(ZONE_FILE_MODE);

    let mut file = options.open(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(tmp, path).await
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

async fn read_document(path: &Path) -> io::Result<Map<String, Value>> {
    let data = tokio::fs::read(path).await?;
    serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
