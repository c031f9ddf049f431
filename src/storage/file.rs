//! JSON-file session store: one `<id>.json` per session under a data
//! directory. Writes go to a temp file that is then renamed over the record.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{check_revision, SessionStore, StoreError};
use crate::interview::CandidateSession;

pub struct JsonFileSessionStore {
    dir: PathBuf,
    /// Serializes the read-check-write of a save.
    write_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    /// Open the store, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read(&self, path: &Path) -> Result<Option<CandidateSession>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn load_session(&self, id: Uuid) -> Result<Option<CandidateSession>, StoreError> {
        self.read(&self.path_for(id)).await
    }

    async fn save_session(&self, session: &CandidateSession) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(session.id);

        let stored = self.read(&path).await?.map(|s| s.revision);
        check_revision(session.id, stored, session.revision)?;

        let json = serde_json::to_string_pretty(session)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", session.id));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;

        debug!("Saved session {} (revision {})", session.id, session.revision);
        Ok(())
    }
}
