mod common;

use std::sync::Arc;

use codescan_lib::{
    storage::{SqliteStorage, Storage, HISTORY_KEY, SETTINGS_KEY},
    BarcodeFormat, ScanSource, ScannerSettings,
};
use common::{HarnessBuilder, StubLookup};

#[tokio::test]
async fn history_and_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("codescan.sqlite3");

    let record_id = {
        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(db_path.clone()).unwrap());
        let h = HarnessBuilder::new()
            .storage(storage)
            .lookup(StubLookup::empty().with_product("3017620422003", "Acme", "Spread"))
            .build()
            .await;

        let mut settings = h.controller.settings().await;
        settings.min_detections = 3;
        settings.enabled_formats = [BarcodeFormat::Ean13, BarcodeFormat::Qr]
            .into_iter()
            .collect();
        h.controller.update_settings(settings).await.unwrap();

        let record = h
            .controller
            .submit_manual_code("3017620422003", BarcodeFormat::Ean13)
            .await
            .unwrap();
        h.controller.await_pending_lookup().await;
        record.id
    };

    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(db_path).unwrap());
    let h = HarnessBuilder::new().storage(storage).build().await;

    let settings = h.controller.settings().await;
    assert_eq!(settings.min_detections, 3);
    assert!(settings.is_format_enabled(BarcodeFormat::Qr));
    assert!(!settings.is_format_enabled(BarcodeFormat::UpcA));

    let history = h.controller.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, record_id);
    assert_eq!(history[0].source, ScanSource::Manual);
    assert_eq!(history[0].product.as_deref(), Some("Acme Spread"));
}

#[tokio::test]
async fn corrupt_blobs_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> =
        Arc::new(SqliteStorage::open(dir.path().join("codescan.sqlite3")).unwrap());
    storage.set(SETTINGS_KEY, "{not json").await.unwrap();
    storage.set(HISTORY_KEY, "[1, 2, 3]").await.unwrap();

    let h = HarnessBuilder::new().storage(storage).build().await;
    assert_eq!(h.controller.settings().await, ScannerSettings::default());
    assert!(h.controller.history().await.is_empty());
}

#[tokio::test]
async fn history_blob_uses_camel_case_records() {
    let h = HarnessBuilder::new().build().await;
    h.controller
        .submit_manual_code("96385074", BarcodeFormat::Ean8)
        .await
        .unwrap();
    h.controller.await_pending_lookup().await;

    let raw = h.storage.get(HISTORY_KEY).await.unwrap().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let first = &parsed[0];
    assert_eq!(first["code"], "96385074");
    assert_eq!(first["format"], "EAN-8");
    assert!(first["timestamp"].as_str().unwrap().starts_with("2024-01-01T"));
    assert!(first["id"].is_string());
}
