use crate::domain::{LocalId, StoreError, SubscriptionRecord};
use crate::ports::outbound::SubscriptionStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory-backed record store.
///
/// One `{local_id}.json` document per record. Writes go to a temp file that
/// is synced and renamed over the target, so a crash leaves either the old or
/// the new record, never a torn one.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) the store directory.
    ///
    /// # Errors
    /// `Io` if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Subscription store opened");
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, local_id: LocalId) -> PathBuf {
        self.dir.join(format!("{local_id}.json"))
    }
}

impl SubscriptionStore for JsonFileStore {
    fn save(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        let path = self.path_for(record.local_id);
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Corrupt {
            key: record.local_id.to_string(),
            reason: e.to_string(),
        })?;

        let temp_path = path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            match serde_json::from_slice::<SubscriptionRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // Skip it rather than refuse to start.
                    warn!(path = %path.display(), error = %e, "Skipping unreadable subscription record");
                }
            }
        }
        records.sort_by_key(|r| r.local_id);
        Ok(records)
    }

    fn remove(&self, local_id: LocalId) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(local_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
