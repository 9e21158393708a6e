use std::{collections::BTreeSet, sync::Arc};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    detection::{BarcodeFormat, ConfirmationPolicy},
    error::ScanError,
    storage::{Storage, SETTINGS_KEY},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerSettings {
    pub audio_feedback: bool,
    pub auto_search: bool,
    pub require_multiple_detections: bool,
    pub min_detections: u32,
    pub detection_timeout_ms: u64,
    pub enabled_formats: BTreeSet<BarcodeFormat>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            audio_feedback: true,
            auto_search: true,
            require_multiple_detections: true,
            min_detections: 2,
            detection_timeout_ms: 1000,
            enabled_formats: BarcodeFormat::ALL.into_iter().collect(),
        }
    }
}

impl ScannerSettings {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.min_detections < 1 {
            return Err(ScanError::InvalidSettings(
                "minDetections must be at least 1".into(),
            ));
        }
        if self.detection_timeout_ms == 0 {
            return Err(ScanError::InvalidSettings(
                "detectionTimeoutMs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            require_multiple: self.require_multiple_detections,
            min_detections: self.min_detections,
            timeout_ms: i64::try_from(self.detection_timeout_ms).unwrap_or(i64::MAX),
        }
    }

    pub fn is_format_enabled(&self, format: BarcodeFormat) -> bool {
        self.enabled_formats.contains(&format)
    }
}

/// Scanner preferences backed by the persistence adapter. Loaded once,
/// written through on every update.
pub struct SettingsStore {
    storage: Arc<dyn Storage>,
    data: ScannerSettings,
}

impl SettingsStore {
    pub async fn load(storage: Arc<dyn Storage>) -> Self {
        let data = match storage.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<ScannerSettings>(&raw) {
                Ok(parsed) if parsed.validate().is_ok() => parsed,
                Ok(_) => {
                    warn!("Stored scanner settings out of range; using defaults");
                    ScannerSettings::default()
                }
                Err(err) => {
                    warn!("Stored scanner settings unreadable ({err}); using defaults");
                    ScannerSettings::default()
                }
            },
            Ok(None) => ScannerSettings::default(),
            Err(err) => {
                warn!("Failed to load scanner settings: {err}");
                ScannerSettings::default()
            }
        };

        Self { storage, data }
    }

    pub fn current(&self) -> &ScannerSettings {
        &self.data
    }

    pub async fn update(&mut self, settings: ScannerSettings) -> Result<(), ScanError> {
        settings.validate()?;
        self.data = settings;
        self.persist().await;
        Ok(())
    }

    async fn persist(&self) {
        let serialized = match serde_json::to_string(&self.data) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!("Failed to serialize scanner settings: {err}");
                return;
            }
        };
        if let Err(err) = self.storage.set(SETTINGS_KEY, &serialized).await {
            warn!("Failed to persist scanner settings: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn enabled_formats_survive_reload() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = SettingsStore::load(storage.clone()).await;

        let mut updated = store.current().clone();
        updated.enabled_formats = [BarcodeFormat::Qr, BarcodeFormat::Ean13, BarcodeFormat::Itf]
            .into_iter()
            .collect();
        updated.min_detections = 3;
        store.update(updated.clone()).await.unwrap();

        let reloaded = SettingsStore::load(storage).await;
        assert_eq!(reloaded.current(), &updated);
        assert_eq!(reloaded.current().enabled_formats, updated.enabled_formats);
    }

    #[tokio::test]
    async fn corrupt_blob_falls_back_to_defaults() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.set(SETTINGS_KEY, "{not json").await.unwrap();
        let store = SettingsStore::load(storage).await;
        assert_eq!(store.current(), &ScannerSettings::default());
    }

    #[tokio::test]
    async fn missing_fields_take_defaults() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage
            .set(SETTINGS_KEY, r#"{"audioFeedback":false}"#)
            .await
            .unwrap();
        let store = SettingsStore::load(storage).await;
        assert!(!store.current().audio_feedback);
        assert_eq!(store.current().min_detections, 2);
        assert_eq!(store.current().enabled_formats.len(), BarcodeFormat::ALL.len());
    }

    #[tokio::test]
    async fn rejects_out_of_range_updates() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = SettingsStore::load(storage).await;

        let mut bad = store.current().clone();
        bad.min_detections = 0;
        assert!(matches!(
            store.update(bad).await,
            Err(ScanError::InvalidSettings(_))
        ));

        let mut bad = store.current().clone();
        bad.detection_timeout_ms = 0;
        assert!(store.update(bad).await.is_err());
        assert_eq!(store.current(), &ScannerSettings::default());
    }
}
