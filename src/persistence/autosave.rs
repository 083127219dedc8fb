use crate::store::Database;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Background thread that flushes the database on a fixed interval.
///
/// Flush failures are logged and retried on the next interval; they never
/// reach the foreground.
pub struct AutoSaver {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    db: Arc<Database>,
}

fn flush_logged(db: &Database) {
    match db.flush() {
        Ok(true) => debug!("auto-save flushed pending writes"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "auto-save failed, retrying next interval"),
    }
}

impl AutoSaver {
    pub fn spawn(db: Arc<Database>, interval: Duration) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker_db = db.clone();

        let handle = std::thread::Builder::new()
            .name("daytrack-autosave".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => flush_logged(&worker_db),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        info!(interval_secs = interval.as_secs(), "auto-save started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            db,
        })
    }

    fn stop_thread(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("auto-save thread panicked");
            }
        }
    }

    /// Stop the thread and do one last flush, reporting its outcome
    pub fn shutdown(mut self) -> crate::error::TrackerResult<bool> {
        self.stop_thread();
        self.db.flush()
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop_thread();
            flush_logged(&self.db);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::domain::{Task, TaskDraft};
    use crate::store::TaskStore;
    use chrono::NaiveDate;
    use std::time::Instant;

    fn insert_task(db: &Database) {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        db.write(|tables| {
            let id = tables.allocate_task_id();
            tables.tasks.push(Task::from_draft(id, TaskDraft::new("Task"), today));
            Ok(())
        })
        .unwrap();
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_periodic_flush() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daytrack.json");
        let db = Arc::new(Database::open(&path).unwrap());
        let saver = AutoSaver::spawn(db.clone(), Duration::from_millis(20)).unwrap();

        insert_task(&db);
        assert!(wait_until(|| !db.is_dirty()));
        assert!(path.exists());

        assert!(!saver.shutdown().unwrap());
    }

    #[test]
    fn test_failed_flush_is_retried() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("not-yet");
        let path = dir.join("daytrack.json");
        let db = Arc::new(Database::open(&path).unwrap());
        let saver = AutoSaver::spawn(db.clone(), Duration::from_millis(20)).unwrap();

        insert_task(&db);
        std::thread::sleep(Duration::from_millis(100));
        // Still pending: the directory is missing so every flush fails
        assert!(db.is_dirty());

        std::fs::create_dir_all(&dir).unwrap();
        assert!(wait_until(|| path.exists()));
        drop(saver);
        assert!(!db.is_dirty());
    }

    #[test]
    fn test_flush_while_foreground_writes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daytrack.json");
        let clock: Arc<dyn Clock> =
            Arc::new(ManualClock::at_noon(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()));
        let db = Arc::new(Database::open(&path).unwrap());
        let tasks = TaskStore::new(db.clone(), clock.clone());
        let saver = AutoSaver::spawn(db.clone(), Duration::from_millis(1)).unwrap();

        let writer = {
            let tasks = tasks.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let id = tasks.add(TaskDraft::new(format!("Task {}", i))).unwrap();
                    if i % 2 == 0 {
                        tasks.toggle_complete(id).unwrap();
                    }
                }
            })
        };
        writer.join().unwrap();
        saver.shutdown().unwrap();

        let reopened = TaskStore::new(Arc::new(Database::open(&path).unwrap()), clock);
        let all = reopened.all();
        assert_eq!(all.len(), 200);
        assert_eq!(all.iter().filter(|t| t.completed).count(), 100);
        assert!(all.iter().all(|t| t.completed == t.date_completed.is_some()));
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_shutdown_flushes_pending_writes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daytrack.json");
        let db = Arc::new(Database::open(&path).unwrap());
        let saver = AutoSaver::spawn(db.clone(), Duration::from_secs(3600)).unwrap();

        insert_task(&db);
        assert!(saver.shutdown().unwrap());
        assert!(path.exists());
    }
}
