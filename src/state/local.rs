//! Local file-based template store.
//!
//! One pretty-printed JSON file per `(name, spec hash)` pair, so lookups go
//! straight to a path instead of depending on directory iteration order.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SpecHasher;
use crate::error::{PodrunError, Result, StateError};

use super::lock::{LOCK_TTL_SECS, LockRecord, current_holder};
use super::store::TemplateStore;
use super::types::StoredTemplate;

/// Lock file name.
const LOCK_FILE: &str = ".lock";

/// Number of hash characters used in record file names.
const FILE_HASH_LEN: usize = 16;

/// Attempts made to acquire the lock before giving up.
const LOCK_ATTEMPTS: u32 = 20;

/// Delay between lock attempts in milliseconds.
const LOCK_RETRY_MS: u64 = 50;

/// Local file-based template store.
#[derive(Debug)]
pub struct LocalTemplateStore {
    /// Directory holding the records.
    base_dir: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalTemplateStore {
    /// Creates a store rooted at `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            lock_path,
        }
    }

    /// Returns the store directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the record path for a name and spec hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the name cannot be used as a file name.
    pub fn record_path(&self, name: &str, spec_hash: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || !spec_hash.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(PodrunError::State(StateError::write(format!(
                "Invalid template key: {name}/{spec_hash}"
            ))));
        }

        let short: String = spec_hash.chars().take(FILE_HASH_LEN).collect();
        Ok(self.base_dir.join(format!("{name}.{short}.json")))
    }

    /// Ensures the store directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating template directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                StateError::write(format!("Failed to create template directory: {e}"))
            })?;
        }
        Ok(())
    }

    /// Reads and parses a record file.
    async fn read_record(path: &Path) -> Result<StoredTemplate> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            PodrunError::State(StateError::Corrupted {
                message: format!("Failed to read {}: {e}", path.display()),
            })
        })?;

        serde_json::from_str(&content).map_err(|e| {
            PodrunError::State(StateError::Corrupted {
                message: format!("Failed to parse {}: {e}", path.display()),
            })
        })
    }

    /// Returns all record files sorted by file name.
    async fn record_files(&self) -> Result<Vec<PathBuf>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Acquires the store lock, waiting briefly for other writers.
    async fn acquire_lock(&self) -> Result<LockRecord> {
        self.ensure_dir().await?;

        let lock_info = LockRecord::acquire_for(&current_holder());
        let content = serde_json::to_string_pretty(&lock_info)
            .map_err(|e| StateError::serialization(format!("Failed to serialize lock: {e}")))?;

        let mut last_error = None;

        for attempt in 0..LOCK_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(LOCK_RETRY_MS)).await;
            }

            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(content.as_bytes()).await.map_err(|e| {
                        StateError::LockFailed {
                            message: format!("Failed to write lock file: {e}"),
                        }
                    })?;
                    debug!("Acquired template store lock: {}", lock_info.lock_id);
                    return Ok(lock_info);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    last_error = self.break_stale_lock().await?;
                }
                Err(e) => {
                    return Err(PodrunError::State(StateError::LockFailed {
                        message: format!("Failed to create lock file: {e}"),
                    }));
                }
            }
        }

        Err(PodrunError::State(last_error.unwrap_or_else(|| {
            StateError::LockFailed {
                message: String::from("Lock attempts exhausted"),
            }
        })))
    }

    /// Clears the lock file if its holder abandoned it.
    ///
    /// Returns the error to report when the lock is still held.
    async fn break_stale_lock(&self) -> Result<Option<StateError>> {
        match inspect_lock(&self.lock_path).await {
            LockState::Missing => Ok(None),
            LockState::Abandoned => self.set_aside_lock().await,
            live => Ok(live.held_error()),
        }
    }

    /// Atomically moves the lock file aside and discards it if it is abandoned.
    ///
    /// Another writer may have replaced the stale lock with a live one since
    /// it was inspected; in that case the live lock is linked back in place.
    async fn set_aside_lock(&self) -> Result<Option<StateError>> {
        let aside = self.base_dir.join(format!(
            "{LOCK_FILE}.{}.stale",
            Uuid::new_v4().simple()
        ));

        match fs::rename(&self.lock_path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PodrunError::State(StateError::LockFailed {
                    message: format!("Failed to move stale lock aside: {e}"),
                }));
            }
        }

        let state = inspect_lock(&aside).await;
        let held = state.held_error();

        if held.is_some() {
            warn!("Template store lock changed hands during takeover, restoring it");
            if let Err(e) = fs::hard_link(&aside, &self.lock_path).await {
                warn!("Failed to restore template store lock: {e}");
            }
        } else {
            debug!("Removed stale template store lock");
        }

        if let Err(e) = fs::remove_file(&aside).await {
            warn!("Failed to remove {}: {e}", aside.display());
        }

        Ok(held)
    }

    /// Reads the lock file, if present and parseable.
    async fn read_lock_file(&self) -> Option<LockRecord> {
        let content = fs::read_to_string(&self.lock_path).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Releases the lock if it is still ours.
    async fn release_lock(&self, lock: &LockRecord) {
        match self.read_lock_file().await {
            Some(existing) if existing.is_same_acquisition(lock) => {
                if let Err(e) = fs::remove_file(&self.lock_path).await {
                    warn!("Failed to remove template store lock: {e}");
                }
            }
            _ => debug!("Template store lock {} no longer held", lock.lock_id),
        }
    }

    /// Writes a record atomically. Must be called with the lock held.
    async fn write_record(&self, path: &Path, record: &StoredTemplate, lock: &LockRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| StateError::serialization(format!("Failed to serialize template: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = path.with_extension(format!("tmp-{}", &lock.lock_id[..8]));

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StateError::write(format!("Failed to create temp file: {e}")))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StateError::write(format!("Failed to write template record: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| StateError::write(format!("Failed to sync template record: {e}")))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StateError::write(format!("Failed to rename template record: {e}")))?;

        Ok(())
    }
}

/// What a lock file on disk currently means.
#[derive(Debug)]
enum LockState {
    /// No lock file.
    Missing,
    /// A live lock.
    Held(LockRecord),
    /// Unparseable but recently modified, so probably still being written.
    Writing,
    /// Past its TTL, or unparseable and old.
    Abandoned,
}

impl LockState {
    /// Returns the error to report if the lock is live.
    fn held_error(self) -> Option<StateError> {
        match self {
            Self::Held(lock) => Some(StateError::LockedByOther {
                holder: lock.holder,
                since: lock.acquired_at.to_rfc3339(),
            }),
            Self::Writing => Some(StateError::LockedByOther {
                holder: String::from("unknown"),
                since: String::from("just now"),
            }),
            Self::Missing | Self::Abandoned => None,
        }
    }
}

/// Classifies the lock file at `path`.
async fn inspect_lock(path: &Path) -> LockState {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LockState::Missing,
        Err(_) => String::new(),
    };

    match serde_json::from_str::<LockRecord>(&content) {
        Ok(lock) if lock.is_stale() => LockState::Abandoned,
        Ok(lock) => LockState::Held(lock),
        Err(_) if modified_within_ttl(path).await => LockState::Writing,
        Err(_) => LockState::Abandoned,
    }
}

/// True if `path` was modified less than one lock TTL ago.
async fn modified_within_ttl(path: &Path) -> bool {
    let ttl = Duration::from_secs(LOCK_TTL_SECS.unsigned_abs());
    fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .is_ok_and(|modified| modified.elapsed().unwrap_or_default() < ttl)
}

#[async_trait]
impl TemplateStore for LocalTemplateStore {
    async fn load(&self, name: &str, spec_hash: &str) -> Result<Option<StoredTemplate>> {
        let path = self.record_path(name, spec_hash)?;
        if !path.exists() {
            debug!("No stored template at: {}", path.display());
            return Ok(None);
        }

        let record = Self::read_record(&path).await?;

        // File names carry a truncated hash; confirm the full one
        if record.name != name || !SpecHasher::hashes_match(&record.spec_hash, spec_hash) {
            warn!(
                "Stored template {} does not match the requested spec, ignoring it",
                path.display()
            );
            return Ok(None);
        }

        debug!("Loaded stored template {} ({})", record.name, record.template_id());
        Ok(Some(record))
    }

    async fn save(&self, record: &StoredTemplate) -> Result<()> {
        let path = self.record_path(&record.name, &record.spec_hash)?;
        let lock = self.acquire_lock().await?;

        let result = self.write_record(&path, record, &lock).await;
        self.release_lock(&lock).await;
        result?;

        info!("Template saved to {}", path.display());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredTemplate>> {
        let mut records = Vec::new();

        for path in self.record_files().await? {
            match Self::read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable template record: {e}"),
            }
        }

        Ok(records)
    }

    async fn remove_by_template_id(&self, template_id: &str) -> Result<usize> {
        let lock = self.acquire_lock().await?;
        let mut removed = 0;

        let result: Result<()> = async {
            for path in self.record_files().await? {
                let Ok(record) = Self::read_record(&path).await else {
                    continue;
                };
                if record.template_id() == template_id {
                    fs::remove_file(&path).await?;
                    info!("Removed template record {}", path.display());
                    removed += 1;
                }
            }
            Ok(())
        }
        .await;

        self.release_lock(&lock).await;
        result?;
        Ok(removed)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
