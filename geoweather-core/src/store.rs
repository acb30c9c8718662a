//! Persistence of the most recent snapshot under one fixed key.
//!
//! The snapshot is wrapped in a versioned JSON envelope. Reads that fail for
//! any reason (missing, unreadable, corrupt, other version) are cache misses;
//! writes replace the previous value and are serialized so the last writer wins.

use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{WeatherSnapshot, error::StoreError};

/// Key the latest snapshot is stored under.
pub const SNAPSHOT_KEY: &str = "weather_response_data";

/// Envelope version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Byte-oriented key-value backing for the snapshot store.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the value under `key`.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// In-process backing, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;

        // Each writer gets its own temp file, renamed over the target when complete.
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{key}."))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(io_err)?;
        tmp.write_all(value).map_err(io_err)?;
        tmp.persist(self.path_for(key)).map_err(|e| io_err(e.error))?;

        Ok(())
    }
}

/// Platform data directory, e.g. `~/.local/share/geoweather`.
pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("dev", "geoweather", "geoweather")
        .ok_or_else(|| anyhow::anyhow!("Could not determine platform data directory"))?;

    Ok(dirs.data_dir().to_path_buf())
}

#[derive(Debug, Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    snapshot: &'a WeatherSnapshot,
}

#[derive(Debug, Deserialize)]
struct EnvelopeHeader {
    version: u32,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    saved_at: DateTime<Utc>,
    snapshot: WeatherSnapshot,
}

/// A snapshot read back from the store, with the time it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub snapshot: WeatherSnapshot,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    backing: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotStore {
    pub fn new(backing: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backing,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Serialize and write `snapshot`, replacing whatever was stored before.
    pub fn save(&self, snapshot: &WeatherSnapshot) -> Result<(), StoreError> {
        let envelope = EnvelopeRef {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            snapshot,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let _guard = self.write_lock.lock();
        self.backing.put(SNAPSHOT_KEY, &bytes)?;

        info!(
            place = %snapshot.place,
            observed_at = snapshot.observed_at,
            "Saved weather snapshot"
        );
        Ok(())
    }

    /// Latest snapshot, or `None` when nothing usable is stored.
    pub fn load(&self) -> Option<WeatherSnapshot> {
        self.load_cached().map(|cached| cached.snapshot)
    }

    /// Like [`load`](Self::load), keeping the write timestamp.
    pub fn load_cached(&self) -> Option<CachedSnapshot> {
        match self.try_load() {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cached snapshot");
                None
            }
        }
    }

    /// Read the stored envelope, reporting why it could not be used.
    pub fn try_load(&self) -> Result<Option<CachedSnapshot>, StoreError> {
        let Some(bytes) = self.backing.get(SNAPSHOT_KEY)? else {
            debug!("No cached snapshot");
            return Ok(None);
        };

        let header: EnvelopeHeader = serde_json::from_slice(&bytes)?;
        if header.version != SNAPSHOT_VERSION {
            return Err(StoreError::Version {
                found: header.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        Ok(Some(CachedSnapshot {
            snapshot: envelope.snapshot,
            saved_at: envelope.saved_at,
        }))
    }
}
