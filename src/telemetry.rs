//! Key-value telemetry/config store interface.
//!
//! The store is an external collaborator (a NetworkTables-style service on a
//! robot network). The pipeline only depends on this trait: exposure control
//! reads/writes numbers, the detection worker publishes target arrays, and
//! the daemon writes coarse lifecycle-state strings.
//!
//! `InMemoryTelemetryStore` is the local implementation used by tests and by
//! deployments without a backing service. A networked implementation returns
//! `ConfigUnavailable`-style errors when the service is unreachable; callers
//! skip the affected operation for that iteration and never escalate.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Value shapes the store supports.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Number(f64),
    Text(String),
    NumberArray(Vec<f64>),
}

pub trait TelemetryStore: Send + Sync {
    /// Read a number, falling back to `default` when the key is absent or
    /// holds a non-numeric value.
    fn get_number(&self, key: &str, default: f64) -> Result<f64>;

    fn put_number(&self, key: &str, value: f64) -> Result<()>;

    fn put_string(&self, key: &str, value: &str) -> Result<()>;

    fn put_number_array(&self, key: &str, values: &[f64]) -> Result<()>;
}

/// Local store backed by a hash map. Always succeeds.
#[derive(Default)]
pub struct InMemoryTelemetryStore {
    entries: Mutex<HashMap<String, TelemetryValue>>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw read, mostly for tests and diagnostics.
    pub fn get(&self, key: &str) -> Option<TelemetryValue> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// JSON snapshot of the whole store for diagnostics.
    pub fn snapshot(&self) -> Result<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(serde_json::to_string_pretty(&*entries)?)
    }
}

impl TelemetryStore for InMemoryTelemetryStore {
    fn get_number(&self, key: &str, default: f64) -> Result<f64> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(TelemetryValue::Number(value)) => Ok(*value),
            _ => Ok(default),
        }
    }

    fn put_number(&self, key: &str, value: f64) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), TelemetryValue::Number(value));
        Ok(())
    }

    fn put_string(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), TelemetryValue::Text(value.to_string()));
        Ok(())
    }

    fn put_number_array(&self, key: &str, values: &[f64]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            TelemetryValue::NumberArray(values.to_vec()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_number_falls_back_to_default() -> Result<()> {
        let store = InMemoryTelemetryStore::new();
        assert_eq!(store.get_number("cam0/exposure", 0.01)?, 0.01);

        store.put_number("cam0/exposure", 3.0)?;
        assert_eq!(store.get_number("cam0/exposure", 0.01)?, 3.0);

        // A string under the key is not a number; default applies.
        store.put_string("state", "starting")?;
        assert_eq!(store.get_number("state", -1.0)?, -1.0);
        Ok(())
    }

    #[test]
    fn arrays_round_trip() -> Result<()> {
        let store = InMemoryTelemetryStore::new();
        store.put_number_array("targets/pos_x", &[0.25, 0.75])?;
        assert_eq!(
            store.get("targets/pos_x"),
            Some(TelemetryValue::NumberArray(vec![0.25, 0.75]))
        );
        Ok(())
    }

    #[test]
    fn snapshot_serializes_entries() -> Result<()> {
        let store = InMemoryTelemetryStore::new();
        store.put_string("state", "processing")?;
        let snapshot = store.snapshot()?;
        assert!(snapshot.contains("processing"));
        Ok(())
    }
}
