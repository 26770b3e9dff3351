use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::energy_integrator::AccumulatorSnapshot;
use crate::reading_assembler::CounterReading;

/// Durable keyed storage for counter readings and simulated-counter state.
///
/// Writes are last-write-wins; everything written under a counter key can be
/// read back after a process restart. The energy integrator persists its
/// accumulator through the same store that receives the per-cycle readings.
pub trait CounterStore: Send + Sync {
    fn set_reading(&self, counter_key: &str, reading: &CounterReading) -> anyhow::Result<()>;
    fn latest_reading(&self, counter_key: &str) -> anyhow::Result<Option<CounterReading>>;
    fn save_accumulator(
        &self,
        counter_key: &str,
        snapshot: &AccumulatorSnapshot,
    ) -> anyhow::Result<()>;
    fn load_accumulator(&self, counter_key: &str) -> anyhow::Result<Option<AccumulatorSnapshot>>;
}

/// File-per-key JSON store rooted at one state directory.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Cannot create state directory {}", root.display()))?;
        Ok(Self { root })
    }

    fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> anyhow::Result<()> {
        let path = self.root.join(file_name);
        let tmp = self.root.join(format!("{file_name}.tmp"));
        let encoded = serde_json::to_vec(value)?;
        fs::write(&tmp, encoded).with_context(|| format!("Cannot write {}", tmp.display()))?;
        // Rename so readers never observe a half-written value.
        fs::rename(&tmp, &path).with_context(|| format!("Cannot replace {}", path.display()))?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> anyhow::Result<Option<T>> {
        let path = self.root.join(file_name);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", path.display()));
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // An unreadable state file counts as no prior state.
                eprintln!("Discarding unreadable state file {}: {e}", path.display());
                Ok(None)
            }
        }
    }
}

impl CounterStore for JsonFileStore {
    fn set_reading(&self, counter_key: &str, reading: &CounterReading) -> anyhow::Result<()> {
        self.write_json(&format!("{counter_key}.reading.json"), reading)
    }

    fn latest_reading(&self, counter_key: &str) -> anyhow::Result<Option<CounterReading>> {
        self.read_json(&format!("{counter_key}.reading.json"))
    }

    fn save_accumulator(
        &self,
        counter_key: &str,
        snapshot: &AccumulatorSnapshot,
    ) -> anyhow::Result<()> {
        self.write_json(&format!("{counter_key}.energy.json"), snapshot)
    }

    fn load_accumulator(&self, counter_key: &str) -> anyhow::Result<Option<AccumulatorSnapshot>> {
        self.read_json(&format!("{counter_key}.energy.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (JsonFileStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "http_meter_bridge_store_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        (JsonFileStore::new(&dir).unwrap(), dir)
    }

    #[test]
    fn test_reading_roundtrip() {
        let (store, dir) = temp_store();
        let reading = CounterReading {
            power: -300.0,
            imported: 1200.5,
            exported: 80.25,
            currents: Some([1.1, 2.2, 3.3]),
        };

        store.set_reading("meter1_grid", &reading).unwrap();
        let restored = store.latest_reading("meter1_grid").unwrap();

        assert_eq!(restored, Some(reading));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_accumulator_roundtrip() {
        let (store, dir) = temp_store();
        let snapshot = AccumulatorSnapshot {
            imported_wh: 500.0,
            exported_wh: 12.5,
        };

        store.save_accumulator("meter1_grid", &snapshot).unwrap();
        let restored = store.load_accumulator("meter1_grid").unwrap();

        assert_eq!(restored, Some(snapshot));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_absent_keys_read_as_none() {
        let (store, dir) = temp_store();

        assert_eq!(store.latest_reading("nothing_here").unwrap(), None);
        assert_eq!(store.load_accumulator("nothing_here").unwrap(), None);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_last_write_wins() {
        let (store, dir) = temp_store();
        let first = AccumulatorSnapshot {
            imported_wh: 1.0,
            exported_wh: 0.0,
        };
        let second = AccumulatorSnapshot {
            imported_wh: 2.0,
            exported_wh: 0.5,
        };

        store.save_accumulator("k", &first).unwrap();
        store.save_accumulator("k", &second).unwrap();

        assert_eq!(store.load_accumulator("k").unwrap(), Some(second));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_corrupted_state_file_reads_as_none() {
        let (store, dir) = temp_store();
        fs::write(dir.join("broken.energy.json"), b"{ not json").unwrap();

        assert_eq!(store.load_accumulator("broken").unwrap(), None);
        fs::remove_dir_all(dir).ok();
    }
}
