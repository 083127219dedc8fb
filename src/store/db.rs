use crate::domain::{Task, TaskId, TimeLog, TimeLogId};
use crate::error::{TrackerError, TrackerResult};
use crate::persistence::{atomic_write, read_file};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persisted tables plus the surrogate key counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default = "first_id")]
    pub next_task_id: TaskId,
    #[serde(default = "first_id")]
    pub next_log_id: TimeLogId,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub time_logs: Vec<TimeLog>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

fn first_id() -> i64 {
    1
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            next_task_id: first_id(),
            next_log_id: first_id(),
            tasks: Vec::new(),
            time_logs: Vec::new(),
            settings: BTreeMap::new(),
        }
    }
}

impl Tables {
    pub fn task(&self, id: TaskId) -> TrackerResult<&Task> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TrackerError::task_not_found(id))
    }

    pub fn task_mut(&mut self, id: TaskId) -> TrackerResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TrackerError::task_not_found(id))
    }

    pub fn allocate_task_id(&mut self) -> TaskId {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    pub fn allocate_log_id(&mut self) -> TimeLogId {
        let id = self.next_log_id;
        self.next_log_id += 1;
        id
    }

    pub fn increment_actual_time(&mut self, id: TaskId, minutes: u32) -> TrackerResult<u32> {
        let task = self.task_mut(id)?;
        task.actual_time = task.actual_time.saturating_add(minutes);
        Ok(task.actual_time)
    }
}

struct DbState {
    tables: Tables,
    dirty: bool,
}

/// Shared storage handle. Foreground writers and the auto-saver serialize on
/// the same mutex.
pub struct Database {
    state: Mutex<DbState>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database document at `path`; a missing file is an empty database
    pub fn open<P: AsRef<Path>>(path: P) -> TrackerResult<Self> {
        let path = path.as_ref();
        let content = read_file(path).map_err(TrackerError::storage)?;

        let tables = if content.trim().is_empty() {
            Tables::default()
        } else {
            serde_json::from_str(&content).map_err(|e| {
                TrackerError::Storage(format!("Failed to parse {}: {}", path.display(), e))
            })?
        };

        info!(
            path = %path.display(),
            tasks = tables.tasks.len(),
            time_logs = tables.time_logs.len(),
            "opened database"
        );

        Ok(Self {
            state: Mutex::new(DbState { tables, dirty: false }),
            path: Some(path.to_path_buf()),
        })
    }

    /// Database with no backing file; `flush` only clears the dirty flag
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(DbState {
                tables: Tables::default(),
                dirty: false,
            }),
            path: None,
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let state = self.state.lock();
        f(&state.tables)
    }

    /// Run a mutation. `f` must validate before it mutates; on error nothing
    /// is marked dirty.
    pub fn write<R>(&self, f: impl FnOnce(&mut Tables) -> TrackerResult<R>) -> TrackerResult<R> {
        let mut state = self.state.lock();
        let result = f(&mut state.tables)?;
        state.dirty = true;
        Ok(result)
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Persist pending writes. Returns whether anything was written. The dirty
    /// flag is only cleared after a successful write.
    pub fn flush(&self) -> TrackerResult<bool> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(false);
        }

        let Some(path) = &self.path else {
            state.dirty = false;
            return Ok(false);
        };

        let json = serde_json::to_string_pretty(&state.tables)
            .map_err(|e| TrackerError::Storage(format!("Failed to serialize database: {}", e)))?;
        atomic_write(path, &json).map_err(TrackerError::storage)?;

        state.dirty = false;
        debug!(path = %path.display(), "flushed database");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskDraft;
    use chrono::NaiveDate;

    fn insert_task(db: &Database, title: &str) -> TaskId {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        db.write(|tables| {
            let id = tables.allocate_task_id();
            tables.tasks.push(Task::from_draft(id, TaskDraft::new(title), today));
            Ok(id)
        })
        .unwrap()
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::open(temp_dir.path().join("daytrack.json")).unwrap();

        assert_eq!(db.read(|t| t.tasks.len()), 0);
        assert!(!db.is_dirty());
    }

    #[test]
    fn test_flush_and_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daytrack.json");

        let db = Database::open(&path).unwrap();
        let id = insert_task(&db, "Persist me");
        db.write(|t| {
            t.settings.insert("focus_minutes".to_string(), "50".to_string());
            Ok(())
        })
        .unwrap();
        assert!(db.is_dirty());
        assert!(db.flush().unwrap());
        assert!(!db.is_dirty());
        assert!(!db.flush().unwrap());

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.read(|t| t.task(id).unwrap().title.clone()), "Persist me");
        assert_eq!(reopened.read(|t| t.next_task_id), id + 1);
        assert_eq!(
            reopened.read(|t| t.settings.get("focus_minutes").cloned()),
            Some("50".to_string())
        );
    }

    #[test]
    fn test_failed_write_is_not_marked_dirty() {
        let db = Database::in_memory();
        let result: TrackerResult<()> = db.write(|t| t.task_mut(99).map(|_| ()));

        assert!(matches!(result, Err(TrackerError::NotFound { .. })));
        assert!(!db.is_dirty());
    }

    #[test]
    fn test_failed_flush_keeps_dirty_for_retry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("later");
        let path = dir.join("daytrack.json");

        let db = Database::open(&path).unwrap();
        insert_task(&db, "Task");

        assert!(matches!(db.flush(), Err(TrackerError::Storage(_))));
        assert!(db.is_dirty());

        std::fs::create_dir_all(&dir).unwrap();
        assert!(db.flush().unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_open_corrupt_file_is_storage_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daytrack.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Database::open(&path), Err(TrackerError::Storage(_))));
    }
}
