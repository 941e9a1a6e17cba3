use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SchedulerError};
use crate::types::FacultyId;

pub const DEFAULT_LEDGER_FILE: &str = "substitution_load.json";

/// Persistent per-faculty substitution counters. Read at repair start,
/// written at repair end; the running balance is what spreads substitution
/// duty fairly across repair runs.
#[derive(Debug, Clone)]
pub struct SubstitutionLedger {
    path: PathBuf,
    counts: BTreeMap<FacultyId, u64>,
}

impl SubstitutionLedger {
    /// Load the ledger. A missing or unreadable file is an empty ledger;
    /// the repair must not fail because bookkeeping is absent.
    pub fn load(path: &Path) -> Self {
        let counts = fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            counts,
        }
    }

    pub fn count(&self, faculty: &FacultyId) -> u64 {
        self.counts.get(faculty).copied().unwrap_or(0)
    }

    pub fn record(&mut self, faculty: &FacultyId) {
        *self.counts.entry(faculty.clone()).or_insert(0) += 1;
    }

    /// Atomic whole-file rewrite: serialize to a sibling temp file, then
    /// rename over the target so a concurrent reader sees either the old or
    /// the new ledger, never a torn one
    pub fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.counts)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| SchedulerError::LedgerIo {
            op: "write".to_string(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| SchedulerError::LedgerIo {
            op: "rename".to_string(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SubstitutionLedger::load(&dir.path().join("nope.json"));
        assert_eq!(ledger.count(&FacultyId("F1".to_string())), 0);
    }

    #[test]
    fn test_corrupt_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("substitution_load.json");
        fs::write(&path, "{not json").unwrap();
        let ledger = SubstitutionLedger::load(&path);
        assert_eq!(ledger.count(&FacultyId("F1".to_string())), 0);
    }

    #[test]
    fn test_record_persist_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("substitution_load.json");

        let mut ledger = SubstitutionLedger::load(&path);
        let f2 = FacultyId("F2".to_string());
        ledger.record(&f2);
        ledger.record(&f2);
        ledger.persist().unwrap();

        let reloaded = SubstitutionLedger::load(&path);
        assert_eq!(reloaded.count(&f2), 2);
        assert_eq!(reloaded.count(&FacultyId("F3".to_string())), 0);

        // No temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_is_a_plain_id_to_count_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("substitution_load.json");
        let mut ledger = SubstitutionLedger::load(&path);
        ledger.record(&FacultyId("F7".to_string()));
        ledger.persist().unwrap();

        let raw: BTreeMap<String, u64> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get("F7"), Some(&1));
    }
}
