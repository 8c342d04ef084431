//! Persistence for the active batch of student records.
//!
//! The whole batch lives as one JSON array under a fixed key. Every write
//! replaces that array in a single statement, so readers see either the old
//! batch or the new one.

use crate::db;
use crate::model::{timestamp_now, StudentRecord};
use crate::status::{GradeStatus, StatusEvent, TransitionError};
use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Unversioned: a schema change needs a new key or an explicit migration.
pub const STORAGE_KEY: &str = "gradesync_data_v1";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("could not open workspace database: {0}")]
    Open(String),

    #[error("could not encode records: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl StoreError {
    /// Failures of the backing medium, as opposed to rejected operations.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, StoreError::Transition(_))
    }
}

pub trait GradeStore {
    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError>;

    fn save_all(&mut self, records: &[StudentRecord]) -> Result<(), StoreError>;

    /// Moves record `id` to `status`, stamping `lastViewed`. `feedback` is
    /// only written when non-blank, and then exactly as given. Unknown ids are a no-op: `Ok(None)` and
    /// nothing is written.
    fn update_status(
        &mut self,
        id: &str,
        status: GradeStatus,
        feedback: Option<&str>,
    ) -> Result<Option<StudentRecord>, StoreError> {
        let mut records = self.load_all()?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        apply_status(record, status, feedback, timestamp_now())?;
        let updated = record.clone();
        self.save_all(&records)?;
        debug!(student_id = %id, status = %status, "grade status updated");
        Ok(Some(updated))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.save_all(&[])
    }
}

fn apply_status(
    record: &mut StudentRecord,
    status: GradeStatus,
    feedback: Option<&str>,
    now: String,
) -> Result<(), TransitionError> {
    let event = StatusEvent::toward(status)?;
    record.status = record.status.apply(event)?;
    record.last_viewed = Some(now);
    if let Some(fb) = feedback.filter(|s| !s.trim().is_empty()) {
        record.feedback = Some(fb.to_string());
    }
    Ok(())
}

fn decode_records(raw: Option<&str>) -> Vec<StudentRecord> {
    let Some(text) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<StudentRecord>>(text) {
        Ok(records) => records,
        Err(e) => {
            // Unreadable data is treated as "no batch loaded".
            warn!(error = %e, key = STORAGE_KEY, "stored grade data is malformed; treating as empty");
            Vec::new()
        }
    }
}

pub struct SqliteGradeStore {
    conn: Connection,
}

impl SqliteGradeStore {
    pub fn open(workspace: &Path) -> Result<Self, StoreError> {
        let conn = db::open_db(workspace).map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { conn })
    }
}

impl GradeStore for SqliteGradeStore {
    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let raw = db::settings_get_text(&self.conn, STORAGE_KEY)?;
        Ok(decode_records(raw.as_deref()))
    }

    fn save_all(&mut self, records: &[StudentRecord]) -> Result<(), StoreError> {
        let text = serde_json::to_string(records)?;
        db::settings_set_text(&self.conn, STORAGE_KEY, &text)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        db::settings_delete(&self.conn, STORAGE_KEY)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryGradeStore {
    records: Vec<StudentRecord>,
}

impl MemoryGradeStore {
    pub fn new(records: Vec<StudentRecord>) -> Self {
        Self { records }
    }
}

impl GradeStore for MemoryGradeStore {
    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self.records.clone())
    }

    fn save_all(&mut self, records: &[StudentRecord]) -> Result<(), StoreError> {
        self.records = records.to_vec();
        Ok(())
    }
}

/// Wraps a persistent store and keeps lookups working when it fails.
///
/// The first storage failure switches to an in-memory copy seeded with the
/// last batch that was read or written successfully. From then on nothing is
/// persisted until the workspace is reopened.
pub struct FallbackGradeStore<S> {
    primary: S,
    memory: RefCell<Option<MemoryGradeStore>>,
    last_good: RefCell<Vec<StudentRecord>>,
}

impl<S: GradeStore> FallbackGradeStore<S> {
    pub fn new(primary: S) -> Self {
        Self {
            primary,
            memory: RefCell::new(None),
            last_good: RefCell::new(Vec::new()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.memory.borrow().is_some()
    }

    fn degrade(&self, error: &StoreError) {
        warn!(error = %error, "grade storage unavailable; continuing in memory only");
        let seed = self.last_good.borrow().clone();
        *self.memory.borrow_mut() = Some(MemoryGradeStore::new(seed));
    }
}

impl<S: GradeStore> GradeStore for FallbackGradeStore<S> {
    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        if let Some(mem) = self.memory.borrow().as_ref() {
            return mem.load_all();
        }
        match self.primary.load_all() {
            Ok(records) => {
                *self.last_good.borrow_mut() = records.clone();
                Ok(records)
            }
            Err(e) if e.is_unavailable() => {
                self.degrade(&e);
                Ok(self.last_good.borrow().clone())
            }
            Err(e) => Err(e),
        }
    }

    fn save_all(&mut self, records: &[StudentRecord]) -> Result<(), StoreError> {
        if let Some(mem) = self.memory.get_mut().as_mut() {
            return mem.save_all(records);
        }
        match self.primary.save_all(records) {
            Ok(()) => {
                *self.last_good.get_mut() = records.to_vec();
                Ok(())
            }
            Err(e) if e.is_unavailable() => {
                self.degrade(&e);
                match self.memory.get_mut().as_mut() {
                    Some(mem) => mem.save_all(records),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtractedRow, GradeDetail};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn record(id: &str, name: &str) -> StudentRecord {
        StudentRecord {
            id: id.to_string(),
            batch_id: Some("batch001".to_string()),
            name: name.to_string(),
            grades: ExtractedRow {
                name: name.to_string(),
                advances: 4.0,
                replica: 3.0,
                report: 5.0,
                final15: 4.0,
                final20: 4.0,
                final_cut: 4.0,
            }
            .grades(),
            status: GradeStatus::Pending,
            feedback: None,
            last_viewed: None,
        }
    }

    fn raw(store: &SqliteGradeStore) -> Option<String> {
        db::settings_get_text(&store.conn, STORAGE_KEY).expect("raw read")
    }

    #[test]
    fn fresh_workspace_loads_empty() {
        let ws = temp_dir("gradesync-store-empty");
        let store = SqliteGradeStore::open(&ws).expect("open store");
        assert!(store.load_all().expect("load").is_empty());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn save_then_load_is_identity() {
        let ws = temp_dir("gradesync-store-roundtrip");
        let mut store = SqliteGradeStore::open(&ws).expect("open store");
        let mut batch = vec![record("a", "Ana Gomez"), record("b", "Luis Pérez")];
        batch[1].grades = GradeDetail {
            final_cut: crate::model::GradeValue::Text("3,5".into()),
            ..batch[1].grades.clone()
        };
        batch[1].status = GradeStatus::Rejected;
        batch[1].feedback = Some("He said \"no\"".into());
        batch[1].last_viewed = Some("2024-05-01T10:00:00.000Z".into());

        store.save_all(&batch).expect("save");
        assert_eq!(store.load_all().expect("load"), batch);

        let reopened = SqliteGradeStore::open(&ws).expect("reopen");
        assert_eq!(reopened.load_all().expect("load"), batch);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn save_replaces_whole_batch() {
        let mut store = MemoryGradeStore::default();
        store
            .save_all(&[record("a", "Ana"), record("b", "Beto")])
            .expect("save first");
        store.save_all(&[record("c", "Carla")]).expect("save second");
        let ids: Vec<String> = store
            .load_all()
            .expect("load")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c".to_string()]);
    }

    #[test]
    fn unknown_id_leaves_stored_bytes_unchanged() {
        let ws = temp_dir("gradesync-store-unknown");
        let mut store = SqliteGradeStore::open(&ws).expect("open store");
        store.save_all(&[record("a", "Ana")]).expect("save");
        let before = raw(&store);

        let out = store
            .update_status("missing", GradeStatus::Rejected, Some("nope"))
            .expect("update");
        assert!(out.is_none());
        assert_eq!(raw(&store), before);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn update_stamps_and_sets_feedback_only_when_given() {
        let mut store = MemoryGradeStore::new(vec![record("a", "Ana")]);

        let viewed = store
            .update_status("a", GradeStatus::Viewed, Some("   "))
            .expect("view")
            .expect("found");
        assert_eq!(viewed.status, GradeStatus::Viewed);
        assert!(viewed.last_viewed.is_some());
        assert_eq!(viewed.feedback, None);

        let rejected = store
            .update_status("a", GradeStatus::Rejected, Some("disagree with report score"))
            .expect("reject")
            .expect("found");
        assert_eq!(rejected.status, GradeStatus::Rejected);
        assert_eq!(
            rejected.feedback.as_deref(),
            Some("disagree with report score")
        );
        assert_eq!(store.load_all().expect("load")[0], rejected);
    }

    #[test]
    fn feedback_keeps_surrounding_whitespace() {
        let ws = temp_dir("gradesync-store-feedback");
        let mut store = SqliteGradeStore::open(&ws).expect("open");
        store.save_all(&[record("a", "Ana")]).expect("seed");
        store
            .update_status("a", GradeStatus::Viewed, None)
            .expect("view");
        let reason = "  keep my spacing  \n";
        store
            .update_status("a", GradeStatus::Rejected, Some(reason))
            .expect("reject");

        let reopened = SqliteGradeStore::open(&ws).expect("reopen");
        assert_eq!(
            reopened.load_all().expect("load")[0].feedback.as_deref(),
            Some(reason)
        );
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn disallowed_transition_fails_without_writing() {
        let ws = temp_dir("gradesync-store-monotonic");
        let mut store = SqliteGradeStore::open(&ws).expect("open store");
        store.save_all(&[record("a", "Ana")]).expect("save");

        let err = store
            .update_status("a", GradeStatus::Accepted, None)
            .expect_err("pending cannot be accepted");
        assert!(matches!(err, StoreError::Transition(_)));
        assert!(!err.is_unavailable());

        store
            .update_status("a", GradeStatus::Viewed, None)
            .expect("view");
        store
            .update_status("a", GradeStatus::Accepted, None)
            .expect("accept");
        let settled = raw(&store);

        for target in [
            GradeStatus::Pending,
            GradeStatus::Viewed,
            GradeStatus::Rejected,
            GradeStatus::Accepted,
        ] {
            assert!(store.update_status("a", target, Some("x")).is_err());
        }
        assert_eq!(raw(&store), settled);
        assert_eq!(store.load_all().expect("load")[0].status, GradeStatus::Accepted);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn malformed_payload_reads_as_empty() {
        let ws = temp_dir("gradesync-store-malformed");
        let store = SqliteGradeStore::open(&ws).expect("open store");
        db::settings_set_text(&store.conn, STORAGE_KEY, "{not json").expect("write junk");
        assert!(store.load_all().expect("load").is_empty());
        db::settings_set_text(&store.conn, STORAGE_KEY, "{\"students\":[]}").expect("write object");
        assert!(store.load_all().expect("load").is_empty());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = MemoryGradeStore::new(vec![record("a", "Ana")]);
        store.clear().expect("clear");
        assert!(store.load_all().expect("load").is_empty());

        let ws = temp_dir("gradesync-store-clear");
        let mut store = SqliteGradeStore::open(&ws).expect("open store");
        store.save_all(&[record("a", "Ana")]).expect("save");
        store.clear().expect("clear");
        assert_eq!(raw(&store), None);
        assert!(store.load_all().expect("load").is_empty());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn fallback_degrades_to_memory_and_keeps_working() {
        let ws = temp_dir("gradesync-store-fallback");
        let mut primary = SqliteGradeStore::open(&ws).expect("open store");
        primary.save_all(&[record("a", "Ana")]).expect("seed");
        let mut store = FallbackGradeStore::new(primary);
        assert_eq!(store.load_all().expect("load").len(), 1);
        assert!(!store.is_degraded());

        store
            .primary
            .conn
            .execute("DROP TABLE settings", [])
            .expect("break storage");

        let records = store.load_all().expect("degraded load");
        assert!(store.is_degraded());
        assert_eq!(records.len(), 1);

        let viewed = store
            .update_status("a", GradeStatus::Viewed, None)
            .expect("view in memory")
            .expect("found");
        assert_eq!(viewed.status, GradeStatus::Viewed);
        assert_eq!(store.load_all().expect("load")[0].status, GradeStatus::Viewed);
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn fallback_does_not_swallow_transition_errors() {
        let mut store = FallbackGradeStore::new(MemoryGradeStore::new(vec![record("a", "Ana")]));
        let err = store
            .update_status("a", GradeStatus::Rejected, Some("too early"))
            .expect_err("pending cannot be rejected");
        assert!(matches!(err, StoreError::Transition(_)));
        assert!(!store.is_degraded());
    }
}
