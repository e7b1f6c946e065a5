//! Registration record persisted as a JSON file.

use crate::file::JsonFile;
use async_trait::async_trait;
use push_engine::ports::PreferencesStore;
use push_engine::{RecordPatch, RegistrationRecord, StoreError};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// File-backed [`PreferencesStore`].
///
/// The record is cached after the first load. Patches are applied to a copy
/// which replaces the file and the cache only once it has been written, so a
/// failed write leaves both untouched.
pub struct FilePreferencesStore {
    file: JsonFile,
    cache: RwLock<Option<RegistrationRecord>>,
}

impl FilePreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl PreferencesStore for FilePreferencesStore {
    async fn load(&self) -> Result<RegistrationRecord, StoreError> {
        if let Some(record) = self.cache.read().await.as_ref() {
            return Ok(record.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(record) = cache.as_ref() {
            return Ok(record.clone());
        }
        let record: RegistrationRecord = self.file.load().await?;
        *cache = Some(record.clone());
        Ok(record)
    }

    async fn apply(&self, patch: RecordPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut cache = self.cache.write().await;
        let mut record = match cache.as_ref() {
            Some(record) => record.clone(),
            None => self.file.load().await?,
        };
        record.apply(&patch);

        self.file.save(&record).await?;
        *cache = Some(record);

        debug!(
            path = ?self.file.path(),
            fields = patch.fields().len(),
            "Preferences patch committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use push_engine::{RecordField, SyncTimestamp, TagSet};
    use secrecy::SecretString;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_store_loads_default_record() {
        let dir = TempDir::new().unwrap();
        let store = FilePreferencesStore::new(dir.path().join("prefs.json"));

        assert_eq!(store.load().await.unwrap(), RegistrationRecord::default());
    }

    #[tokio::test]
    async fn test_patch_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");

        let store = FilePreferencesStore::new(&path);
        store
            .apply(
                RecordPatch::new()
                    .set(RecordField::BackendId(Some("device-1".into())))
                    .set(RecordField::Tags(["News", "sports"].into_iter().collect()))
                    .set(RecordField::LastGeofenceUpdate(SyncTimestamp::from_millis(42))),
            )
            .await
            .unwrap();

        let reopened = FilePreferencesStore::new(&path);
        let record = reopened.load().await.unwrap();
        assert_eq!(record.backend_id.as_deref(), Some("device-1"));
        assert_eq!(record.tags, ["news", "sports"].into_iter().collect::<TagSet>());
        assert_eq!(record.last_geofence_update.as_millis(), 42);
    }

    #[tokio::test]
    async fn test_clear_backend_patch_persists_nulls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        let store = FilePreferencesStore::new(&path);

        store
            .apply(
                RecordPatch::new()
                    .set(RecordField::BackendId(Some("device-1".into())))
                    .set(RecordField::PlatformToken(Some(SecretString::new("token".into())))),
            )
            .await
            .unwrap();
        store.apply(RecordPatch::clear_backend()).await.unwrap();

        let record = FilePreferencesStore::new(&path).load().await.unwrap();
        assert!(record.backend_id.is_none());
        assert_eq!(record.platform_token(), Some("token"));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cached_record() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the file makes the rename fail.
        let path = dir.path().join("prefs.json");
        std::fs::create_dir_all(path.join("blocker")).unwrap();
        let store = FilePreferencesStore {
            file: JsonFile::new(&path),
            cache: RwLock::new(Some(RegistrationRecord::default())),
        };

        let result = store
            .apply(RecordPatch::new().set(RecordField::BackendId(Some("device-1".into()))))
            .await;

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.load().await.unwrap().backend_id.is_none());
    }

    #[tokio::test]
    async fn test_secrets_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        let store = FilePreferencesStore::new(&path);
        store
            .apply(
                RecordPatch::new()
                    .set(RecordField::PlatformSecret(Some(SecretString::new("s3cret".into()))))
                    .set(RecordField::BackendToken(Some(SecretString::new("token".into())))),
            )
            .await
            .unwrap();

        let record = FilePreferencesStore::new(&path).load().await.unwrap();
        assert_eq!(record.platform_secret(), Some("s3cret"));
        assert_eq!(record.backend_token(), Some("token"));
    }
}
