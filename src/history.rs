use std::{collections::VecDeque, sync::Arc};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    detection::BarcodeFormat,
    storage::{Storage, HISTORY_KEY},
};

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ScanSource {
    #[default]
    Camera,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub code: String,
    pub format: BarcodeFormat,
    /// RFC 3339, UTC.
    pub timestamp: String,
    #[serde(default)]
    pub source: ScanSource,
    #[serde(default)]
    pub product: Option<String>,
}

/// Most-recent-first ring of scan records, written through to storage on
/// every mutation. Storage failures are logged and the in-memory copy wins.
pub struct HistoryStore {
    storage: Arc<dyn Storage>,
    records: VecDeque<ScanRecord>,
    capacity: usize,
}

impl HistoryStore {
    pub async fn load(storage: Arc<dyn Storage>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut records: VecDeque<ScanRecord> = match storage.get(HISTORY_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("Stored scan history unreadable ({err}); starting empty");
                VecDeque::new()
            }),
            Ok(None) => VecDeque::new(),
            Err(err) => {
                warn!("Failed to load scan history: {err}");
                VecDeque::new()
            }
        };
        records.truncate(capacity);

        Self {
            storage,
            records,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn head(&self) -> Option<&ScanRecord> {
        self.records.front()
    }

    pub fn snapshot(&self) -> Vec<ScanRecord> {
        self.records.iter().cloned().collect()
    }

    /// Inserts at the head, evicting the oldest record past capacity.
    pub async fn push(&mut self, record: ScanRecord) {
        self.records.push_front(record);
        while self.records.len() > self.capacity {
            self.records.pop_back();
        }
        self.persist().await;
    }

    /// Sets `product` on the head record, only if the head is still the
    /// record identified by `record_id` and `code`.
    pub async fn backfill_head_product(
        &mut self,
        record_id: &str,
        code: &str,
        product: String,
    ) -> bool {
        match self.records.front_mut() {
            Some(head) if head.id == record_id && head.code == code => {
                head.product = Some(product);
            }
            _ => return false,
        }
        self.persist().await;
        true
    }

    pub async fn clear(&mut self) {
        self.records.clear();
        self.persist().await;
    }

    async fn persist(&self) {
        let serialized = match serde_json::to_string(&self.records) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!("Failed to serialize scan history: {err}");
                return;
            }
        };
        if let Err(err) = self.storage.set(HISTORY_KEY, &serialized).await {
            warn!("Failed to persist scan history: {err}");
        }
    }
}
