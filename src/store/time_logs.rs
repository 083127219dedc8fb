use super::db::{Database, Tables};
use crate::domain::{TaskId, TimeLog};
use crate::error::{TrackerError, TrackerResult};
use chrono::{DateTime, Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the append-only time log table
#[derive(Clone)]
pub struct TimeLogStore {
    db: Arc<Database>,
}

fn insert_log(
    tables: &mut Tables,
    task_id: TaskId,
    start: DateTime<Local>,
    end: DateTime<Local>,
    notes: &str,
) -> TrackerResult<TimeLog> {
    tables.task(task_id)?;
    if end < start {
        return Err(TrackerError::Validation(format!(
            "session end {} is before start {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }

    let log = TimeLog {
        id: tables.allocate_log_id(),
        task_id,
        start_time: start,
        end_time: end,
        duration: end.signed_duration_since(start).num_seconds(),
        notes: notes.to_string(),
    };
    tables.time_logs.push(log.clone());
    Ok(log)
}

impl TimeLogStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a log for an existing task. Returns the duration in seconds.
    pub fn append(
        &self,
        task_id: TaskId,
        start: DateTime<Local>,
        end: DateTime<Local>,
        notes: &str,
    ) -> TrackerResult<i64> {
        let log = self
            .db
            .write(|tables| insert_log(tables, task_id, start, end, notes))?;
        debug!(task_id, log_id = log.id, duration = log.duration, "appended time log");
        Ok(log.duration)
    }

    /// Append a log and add its whole minutes to the task's actual time, under one lock
    pub fn commit_session(
        &self,
        task_id: TaskId,
        start: DateTime<Local>,
        end: DateTime<Local>,
        notes: &str,
    ) -> TrackerResult<TimeLog> {
        let log = self.db.write(|tables| {
            let log = insert_log(tables, task_id, start, end, notes)?;
            tables.increment_actual_time(task_id, log.whole_minutes())?;
            Ok(log)
        })?;

        info!(
            task_id,
            log_id = log.id,
            duration = log.duration,
            minutes = log.whole_minutes(),
            "committed focus session"
        );
        Ok(log)
    }

    /// Remove every log for a task, returning how many went. Runs inside the
    /// task store's delete write so the task and its logs go under one lock.
    pub fn delete_for_task(tables: &mut Tables, task_id: TaskId) -> usize {
        let before = tables.time_logs.len();
        tables.time_logs.retain(|log| log.task_id != task_id);
        before - tables.time_logs.len()
    }

    pub fn for_task(&self, task_id: TaskId) -> Vec<TimeLog> {
        self.db.read(|tables| {
            tables
                .time_logs
                .iter()
                .filter(|log| log.task_id == task_id)
                .cloned()
                .collect()
        })
    }

    /// Logs whose session started on `date`
    pub fn on_date(&self, date: NaiveDate) -> Vec<TimeLog> {
        self.db.read(|tables| {
            tables
                .time_logs
                .iter()
                .filter(|log| log.start_time.date_naive() == date)
                .cloned()
                .collect()
        })
    }

    pub fn all(&self) -> Vec<TimeLog> {
        self.db.read(|tables| tables.time_logs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::domain::TaskDraft;
    use crate::store::TaskStore;
    use chrono::Duration;

    fn create_stores() -> (TaskStore, TimeLogStore, ManualClock) {
        let db = Arc::new(Database::in_memory());
        let clock = ManualClock::at_noon(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        (
            TaskStore::new(db.clone(), Arc::new(clock.clone())),
            TimeLogStore::new(db),
            clock,
        )
    }

    #[test]
    fn test_append_computes_duration() {
        let (tasks, logs, clock) = create_stores();
        let id = tasks.add(TaskDraft::new("Task")).unwrap();
        let start = clock.now();

        let duration = logs.append(id, start, start + Duration::minutes(25), "focus").unwrap();

        assert_eq!(duration, 1500);
        let stored = logs.for_task(id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].notes, "focus");
        // Plain append does not touch actual time
        assert_eq!(tasks.get(id).unwrap().actual_time, 0);
    }

    #[test]
    fn test_append_rejects_missing_task_and_reversed_interval() {
        let (tasks, logs, clock) = create_stores();
        let start = clock.now();

        assert!(matches!(
            logs.append(5, start, start, ""),
            Err(TrackerError::NotFound { .. })
        ));

        let id = tasks.add(TaskDraft::new("Task")).unwrap();
        assert!(matches!(
            logs.append(id, start, start - Duration::seconds(1), ""),
            Err(TrackerError::Validation(_))
        ));
        assert!(logs.all().is_empty());
    }

    #[test]
    fn test_commit_session_increments_actual_time() {
        let (tasks, logs, clock) = create_stores();
        let id = tasks.add(TaskDraft::new("Task")).unwrap();
        let start = clock.now();

        logs.commit_session(id, start, start + Duration::seconds(25 * 60 + 59), "")
            .unwrap();
        logs.commit_session(id, start, start + Duration::seconds(30), "").unwrap();

        assert_eq!(tasks.get(id).unwrap().actual_time, 25);
        assert_eq!(logs.for_task(id).len(), 2);
    }

    #[test]
    fn test_delete_task_cascades_to_logs() {
        let (tasks, logs, clock) = create_stores();
        let keep = tasks.add(TaskDraft::new("Keep")).unwrap();
        let doomed = tasks.add(TaskDraft::new("Doomed")).unwrap();
        let start = clock.now();
        for _ in 0..3 {
            logs.commit_session(doomed, start, start + Duration::minutes(1), "").unwrap();
        }
        logs.commit_session(keep, start, start + Duration::minutes(1), "").unwrap();

        assert_eq!(tasks.delete(doomed).unwrap(), 3);

        let remaining = logs.all();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|log| tasks.get(log.task_id).is_ok()));
    }

    #[test]
    fn test_delete_for_task_and_on_date() {
        let (tasks, logs, clock) = create_stores();
        let id = tasks.add(TaskDraft::new("Task")).unwrap();
        let start = clock.now();
        logs.append(id, start, start + Duration::minutes(5), "").unwrap();
        let tomorrow = start + Duration::days(1);
        logs.append(id, tomorrow, tomorrow + Duration::minutes(5), "").unwrap();

        let other = tasks.add(TaskDraft::new("Other")).unwrap();
        logs.append(other, start, start + Duration::minutes(1), "").unwrap();

        assert_eq!(logs.on_date(clock.today()).len(), 2);
        let mut tables = Tables::default();
        tables.time_logs = logs.all();
        assert_eq!(TimeLogStore::delete_for_task(&mut tables, id), 2);
        assert_eq!(tables.time_logs.len(), 1);
        assert_eq!(tables.time_logs[0].task_id, other);
    }
}
