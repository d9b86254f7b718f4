use kitting_core::{AnchorHistoryCollection, AnchorRecord, Clock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::kv::KeyValueStore;
use crate::StoreError;

/// Key the history blob is stored under.
pub const STORAGE_KEY: &str = "PersistentCloudAnchors";

/// Retention settings of the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Records kept after a save; the oldest are evicted.
    pub capacity: usize,
    /// Records older than this many whole days are purged on load.
    pub expiry_days: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 40,
            expiry_days: 365,
        }
    }
}

/// Persisted anchor records and scenario names.
///
/// All operations load the whole collection, change it and write it back.
/// Nothing is cached between calls.
#[derive(Debug)]
pub struct AnchorHistoryStore<S, C> {
    kv: S,
    clock: C,
    config: StoreConfig,
}

impl<S: KeyValueStore, C: Clock> AnchorHistoryStore<S, C> {
    /// Store over `kv`, using `clock` for expiry checks.
    pub fn new(kv: S, clock: C, config: StoreConfig) -> Self {
        Self { kv, clock, config }
    }

    /// Retention settings.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Clock used for expiry checks.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Backend.
    pub fn backend(&self) -> &S {
        &self.kv
    }

    fn read_raw(&self) -> Result<Option<AnchorHistoryCollection>, StoreError> {
        match self.kv.get(STORAGE_KEY)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn write(&mut self, history: &AnchorHistoryCollection) -> Result<(), StoreError> {
        let text = serde_json::to_string(history)?;
        self.kv.set(STORAGE_KEY, &text)
    }

    /// Load the collection, purging expired records and writing the purge back.
    ///
    /// Records whose timestamp cannot be read are kept as they are.
    pub fn load(&mut self) -> Result<AnchorHistoryCollection, StoreError> {
        let Some(mut history) = self.read_raw()? else {
            return Ok(AnchorHistoryCollection::default());
        };

        let now = self.clock.now();
        let expiry_days = self.config.expiry_days;
        let before = history.records.len();
        history.records.retain(|record| match record.created_time() {
            Some(created) => (now - created).num_days() <= expiry_days,
            None => {
                warn!(
                    cloud_anchor_id = %record.cloud_anchor_id,
                    time = %record.serialized_time,
                    "keeping anchor record with unreadable timestamp"
                );
                true
            }
        });
        let purged = before - history.records.len();
        if purged > 0 {
            info!(purged, "purged expired anchor records");
        }

        self.write(&history)?;
        Ok(history)
    }

    /// Add a newly hosted record, keeping only the newest `capacity` records.
    ///
    /// A stored record with the same cloud id is replaced.
    pub fn save(&mut self, record: AnchorRecord) -> Result<(), StoreError> {
        let mut history = self.load()?;
        info!(
            cloud_anchor_id = %record.cloud_anchor_id,
            scenario = %record.scenario_name,
            objects = record.objects.len(),
            "saving anchor record"
        );
        let before = history.records.len();
        history
            .records
            .retain(|r| r.cloud_anchor_id != record.cloud_anchor_id);
        if history.records.len() != before {
            warn!(
                cloud_anchor_id = %record.cloud_anchor_id,
                "cloud anchor id already stored, replacing record"
            );
        }
        history.records.push(record);
        history.sort_newest_first();

        if history.records.len() > self.config.capacity {
            let evicted = history.records.len() - self.config.capacity;
            history.records.truncate(self.config.capacity);
            debug!(evicted, "evicted oldest anchor records");
        }

        self.write(&history)
    }

    /// Replace the record with the same cloud id.
    ///
    /// The stored name and creation time are kept; objects and scenario come
    /// from `record`. An unknown id is appended as is. Capacity is not applied
    /// here. Returns whether an existing record was replaced.
    pub fn update(&mut self, mut record: AnchorRecord) -> Result<bool, StoreError> {
        let mut history = self.load()?;
        let existing = history
            .records
            .iter()
            .position(|r| r.cloud_anchor_id == record.cloud_anchor_id);

        let replaced = match existing {
            Some(index) => {
                let previous = history.records.remove(index);
                record.name = previous.name;
                record.serialized_time = previous.serialized_time;
                true
            }
            None => {
                debug!(cloud_anchor_id = %record.cloud_anchor_id, "update for unknown anchor, appending");
                false
            }
        };

        info!(
            cloud_anchor_id = %record.cloud_anchor_id,
            objects = record.objects.len(),
            replaced,
            "updating anchor record"
        );
        history.records.push(record);
        history.sort_newest_first();
        self.write(&history)?;
        Ok(replaced)
    }

    /// Number of records currently stored (after expiry).
    pub fn record_count(&mut self) -> Result<usize, StoreError> {
        Ok(self.load()?.len())
    }

    /// Records of `scenario`, newest first.
    pub fn records_for_scenario(&mut self, scenario: &str) -> Result<Vec<AnchorRecord>, StoreError> {
        let history = self.load()?;
        Ok(history.records_for_scenario(scenario).cloned().collect())
    }

    /// Scenario names in insertion order.
    pub fn list_scenarios(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_raw()?.map(|h| h.scenarios).unwrap_or_default())
    }

    /// Add a scenario name. Returns false if it already exists.
    pub fn add_scenario(&mut self, name: &str) -> Result<bool, StoreError> {
        let mut history = self.load()?;
        if history.scenarios.iter().any(|s| s == name) {
            debug!(scenario = %name, "scenario already listed");
            return Ok(false);
        }
        history.scenarios.push(name.to_string());
        self.write(&history)?;
        info!(scenario = %name, "added scenario");
        Ok(true)
    }

    /// Remove a scenario name. Its records are kept. Returns whether it existed.
    pub fn remove_scenario(&mut self, name: &str) -> Result<bool, StoreError> {
        let mut history = self.load()?;
        let Some(index) = history.scenarios.iter().position(|s| s == name) else {
            return Ok(false);
        };
        history.scenarios.remove(index);
        self.write(&history)?;
        info!(scenario = %name, "removed scenario");
        Ok(true)
    }

    /// Delete every record of `scenario`. Returns how many were deleted.
    pub fn clear_scenario(&mut self, name: &str) -> Result<usize, StoreError> {
        let mut history = self.load()?;
        let before = history.records.len();
        history.records.retain(|r| r.scenario_name != name);
        let removed = before - history.records.len();
        if removed == 0 {
            debug!(scenario = %name, "no anchors to clear");
            return Ok(0);
        }
        self.write(&history)?;
        info!(scenario = %name, removed, "cleared scenario anchors");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use kitting_core::{AttachedObjectRecord, PieceInfo};

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn store() -> AnchorHistoryStore<MemoryStore, FixedClock> {
        AnchorHistoryStore::new(MemoryStore::new(), FixedClock(now()), StoreConfig::default())
    }

    fn record(id: &str, created: NaiveDateTime, scenario: &str) -> AnchorRecord {
        AnchorRecord::new(AnchorRecord::sequential_name(0), id, created, scenario, Vec::new())
    }

    #[test]
    fn empty_backend_loads_empty_collection() {
        let mut store = store();
        assert!(store.load().unwrap().is_empty());
        assert!(store.list_scenarios().unwrap().is_empty());
        assert!(!store.backend().has_key(STORAGE_KEY).unwrap());
    }

    #[test]
    fn save_keeps_forty_newest() {
        let mut store = store();
        for i in 0..41 {
            let created = now() - Duration::minutes(41 - i);
            store.save(record(&format!("id{i}"), created, "Line3")).unwrap();
        }

        let history = store.load().unwrap();
        assert_eq!(history.len(), 40);
        assert!(history.find("id0").is_none());
        assert_eq!(history.records[0].cloud_anchor_id, "id40");
        assert_eq!(history.records[39].cloud_anchor_id, "id1");
        for pair in history.records.windows(2) {
            assert!(pair[0].created_time() > pair[1].created_time());
        }
    }

    #[test]
    fn load_purges_after_365_days() {
        let mut store = store();
        store.save(record("old", now() - Duration::days(366), "s")).unwrap();
        store.save(record("young", now() - Duration::days(364), "s")).unwrap();
        store.save(record("edge", now() - Duration::days(365), "s")).unwrap();

        let history = store.load().unwrap();
        assert!(history.find("old").is_none());
        assert!(history.find("young").is_some());
        assert!(history.find("edge").is_some());

        // The purge was written back.
        let raw = store.backend().get(STORAGE_KEY).unwrap().unwrap();
        assert!(!raw.contains("\"old\""));
    }

    fn store_with_blob(
        records: Vec<AnchorRecord>,
        scenarios: Vec<String>,
    ) -> AnchorHistoryStore<MemoryStore, FixedClock> {
        let blob = serde_json::to_string(&AnchorHistoryCollection { records, scenarios }).unwrap();
        let mut kv = MemoryStore::new();
        kv.set(STORAGE_KEY, &blob).unwrap();
        AnchorHistoryStore::new(kv, FixedClock(now()), StoreConfig::default())
    }

    #[test]
    fn unreadable_timestamp_is_kept() {
        let mut broken = record("broken", now(), "s");
        broken.serialized_time = "yesterday".into();
        let mut store = store_with_blob(vec![broken], vec![]);

        let history = store.load().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.records[0].serialized_time, "yesterday");
        let raw = store.backend().get(STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains("\"broken\""));
    }

    #[test]
    fn twelve_hour_timestamp_survives_load() {
        let mut written = record("ua-en-us", now(), "Line3");
        written.serialized_time = "6/14/2025 9:30:00 AM".into();
        let mut store = store_with_blob(vec![written], vec!["Line3".into()]);

        let history = store.load().unwrap();
        assert_eq!(history.len(), 1);
        let created = history.records[0].created_time().unwrap();
        assert_eq!((now() - created).num_days(), 1);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn save_replaces_record_with_same_cloud_id() {
        let mut store = store();
        store.save(record("ua-0001", now() - Duration::days(1), "Line3")).unwrap();
        let mut again = record("ua-0001", now(), "Line4");
        again.name = "CloudAnchor1".into();
        store.save(again).unwrap();

        let history = store.load().unwrap();
        assert_eq!(history.len(), 1);
        let stored = history.find("ua-0001").unwrap();
        assert_eq!(stored.scenario_name, "Line4");
        assert_eq!(stored.name, "CloudAnchor1");
    }

    #[test]
    fn update_keeps_creation_time_and_skips_capacity() {
        let mut store = AnchorHistoryStore::new(
            MemoryStore::new(),
            FixedClock(now()),
            StoreConfig {
                capacity: 2,
                ..StoreConfig::default()
            },
        );
        let created = now() - Duration::days(3);
        store.save(record("a", created, "Line3")).unwrap();
        store.save(record("b", now() - Duration::days(2), "Line3")).unwrap();

        let object = AttachedObjectRecord::new_box(
            glam::Vec3::ZERO,
            vec![],
            glam::Vec3::ONE,
            PieceInfo::new("REF1", "Bolt", "A1"),
        );
        let mut replacement = AnchorRecord::new("CloudAnchor9", "a", now(), "Line3", vec![object]);
        replacement.objects[0].piece_info.name = "Bolt M6".into();
        assert!(store.update(replacement).unwrap());

        let history = store.load().unwrap();
        let updated = history.find("a").unwrap();
        assert_eq!(updated.created_time(), Some(created));
        assert_eq!(updated.name, "CloudAnchor0");
        assert_eq!(updated.objects.len(), 1);
        assert_eq!(updated.objects[0].piece_info.name, "Bolt M6");

        // Unknown ids are appended without truncation.
        assert!(!store.update(record("c", now(), "Line3")).unwrap());
        assert_eq!(store.load().unwrap().len(), 3);
    }

    #[test]
    fn scenario_management() {
        let mut store = store();
        assert!(store.add_scenario("Line3").unwrap());
        assert!(store.add_scenario("Line4").unwrap());
        assert!(!store.add_scenario("Line3").unwrap());
        assert_eq!(store.list_scenarios().unwrap(), vec!["Line3", "Line4"]);

        store.save(record("x", now(), "Line3")).unwrap();
        store.save(record("y", now(), "Line4")).unwrap();
        assert_eq!(store.records_for_scenario("Line3").unwrap().len(), 1);

        assert_eq!(store.clear_scenario("Line3").unwrap(), 1);
        assert_eq!(store.clear_scenario("Line3").unwrap(), 0);
        assert!(store.records_for_scenario("Line3").unwrap().is_empty());
        assert_eq!(store.records_for_scenario("Line4").unwrap().len(), 1);

        assert!(store.remove_scenario("Line3").unwrap());
        assert!(!store.remove_scenario("Line3").unwrap());
        assert_eq!(store.list_scenarios().unwrap(), vec!["Line4"]);
    }

    #[test]
    fn corrupt_blob_is_an_error() {
        let mut kv = MemoryStore::new();
        kv.set(STORAGE_KEY, "{not json").unwrap();
        let mut store = AnchorHistoryStore::new(kv, FixedClock(now()), StoreConfig::default());
        assert!(matches!(store.load(), Err(StoreError::Parse(_))));
    }
}
