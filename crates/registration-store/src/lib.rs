//! File-backed persistence for the push registration record and the
//! registered geofence set.
//!
//! Both stores keep one JSON document each and replace it atomically
//! (temp file + rename), so a crash mid-write never leaves a partial record.

mod file;
mod geofences;
mod preferences;

pub use geofences::FileGeofenceStore;
pub use preferences::FilePreferencesStore;

#[cfg(test)]
mod tests {
    use super::*;
    use push_engine::ports::PreferencesStore;
    use push_engine::{RecordField, RecordPatch, RegistrationRecord};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persisted_record_uses_snake_case_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        let store = FilePreferencesStore::new(&path);

        store
            .apply(
                RecordPatch::new()
                    .set(RecordField::PlatformUuid(Some("variant".into())))
                    .set(RecordField::GeofencesEnabled(true)),
            )
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["platform_uuid"], "variant");
        assert_eq!(raw["geofences_enabled"], true);
        assert_eq!(raw["last_geofence_update"], 0);
    }

    #[tokio::test]
    async fn test_partial_document_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, br#"{"backend_id": "device-9"}"#).unwrap();

        let record = FilePreferencesStore::new(&path).load().await.unwrap();
        assert_eq!(
            record,
            RegistrationRecord {
                backend_id: Some("device-9".into()),
                ..Default::default()
            }
        );
    }
}
