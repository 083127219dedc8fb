use super::db::Database;
use super::time_logs::TimeLogStore;
use crate::clock::Clock;
use crate::domain::{Priority, StatusFilter, Task, TaskDraft, TaskId, TaskUpdate};
use crate::error::{TrackerError, TrackerResult};
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the task table: CRUD, per-day listing, search and archiving
#[derive(Clone)]
pub struct TaskStore {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

/// Order tasks the way listings show them: priority, incomplete first, most progress first
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by_key(|t| (t.priority.rank(), t.completed, Reverse(t.progress)));
}

impl TaskStore {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Create a task. Fails only on an empty title; bad estimates become the default.
    pub fn add(&self, draft: TaskDraft) -> TrackerResult<TaskId> {
        if draft.title.trim().is_empty() {
            return Err(TrackerError::Validation("task title must not be empty".to_string()));
        }

        let today = self.clock.today();
        let id = self.db.write(|tables| {
            if let Some(parent) = draft.parent_task_id {
                tables.task(parent)?;
            }
            let id = tables.allocate_task_id();
            tables.tasks.push(Task::from_draft(id, draft, today));
            Ok(id)
        })?;

        info!(task_id = id, "added task");
        Ok(id)
    }

    /// Insert fully built tasks in one write, assigning fresh ids.
    /// Every task is validated first, so either all are added or none are.
    pub fn insert_all(&self, tasks: Vec<Task>) -> TrackerResult<Vec<TaskId>> {
        if let Some(pos) = tasks.iter().position(|t| t.title.trim().is_empty()) {
            return Err(TrackerError::Validation(format!(
                "task {} of {}: title must not be empty",
                pos + 1,
                tasks.len()
            )));
        }

        let ids = self.db.write(|tables| {
            for parent in tasks.iter().filter_map(|t| t.parent_task_id) {
                tables.task(parent)?;
            }
            let mut ids = Vec::with_capacity(tasks.len());
            for mut task in tasks {
                task.id = tables.allocate_task_id();
                ids.push(task.id);
                tables.tasks.push(task);
            }
            Ok(ids)
        })?;

        info!(count = ids.len(), "inserted tasks");
        Ok(ids)
    }

    pub fn get(&self, id: TaskId) -> TrackerResult<Task> {
        self.db.read(|tables| tables.task(id).cloned())
    }

    /// Every task, archived included, in id order
    pub fn all(&self) -> Vec<Task> {
        self.db.read(|tables| tables.tasks.clone())
    }

    /// Non-archived tasks in id order
    pub fn active(&self) -> Vec<Task> {
        self.db
            .read(|tables| tables.tasks.iter().filter(|t| !t.archived).cloned().collect())
    }

    pub fn list_archived(&self) -> Vec<Task> {
        self.db
            .read(|tables| tables.tasks.iter().filter(|t| t.archived).cloned().collect())
    }

    /// Non-archived tasks filed under `date`, searched, filtered and sorted for display
    pub fn list(&self, date: NaiveDate, filter: StatusFilter, search: &str) -> Vec<Task> {
        let today = self.clock.today();
        let mut tasks: Vec<Task> = self.db.read(|tables| {
            tables
                .tasks
                .iter()
                .filter(|t| !t.archived && t.date_created == date)
                .filter(|t| t.matches_search(search))
                .filter(|t| match filter {
                    StatusFilter::All => true,
                    StatusFilter::Completed => t.completed,
                    StatusFilter::Pending => !t.completed,
                    StatusFilter::HighPriority => t.priority == Priority::High,
                    StatusFilter::Overdue => t.is_overdue(today),
                })
                .cloned()
                .collect()
        });

        sort_for_display(&mut tasks);
        tasks
    }

    /// Flip completion. Returns the new state.
    pub fn toggle_complete(&self, id: TaskId) -> TrackerResult<bool> {
        let today = self.clock.today();
        let completed = self.db.write(|tables| {
            let task = tables.task_mut(id)?;
            let completed = !task.completed;
            task.set_completed(completed, today);
            Ok(completed)
        })?;

        info!(task_id = id, completed, "toggled task");
        Ok(completed)
    }

    /// Apply an editor update. The title must stay non-empty.
    pub fn update(&self, id: TaskId, update: TaskUpdate) -> TrackerResult<Task> {
        let updated = self.db.write(|tables| {
            let task = tables.task_mut(id)?;
            let mut candidate = task.clone();
            update.apply_to(&mut candidate);
            if candidate.title.is_empty() {
                return Err(TrackerError::Validation("task title must not be empty".to_string()));
            }
            *task = candidate.clone();
            Ok(candidate)
        })?;

        debug!(task_id = id, "updated task");
        Ok(updated)
    }

    /// Delete a task and all of its time logs. Returns the number of logs removed.
    pub fn delete(&self, id: TaskId) -> TrackerResult<usize> {
        let removed_logs = self.db.write(|tables| {
            tables.task(id)?;
            tables.tasks.retain(|t| t.id != id);
            Ok(TimeLogStore::delete_for_task(tables, id))
        })?;

        info!(task_id = id, removed_logs, "deleted task");
        Ok(removed_logs)
    }

    /// Add logged minutes to a task. Returns the new actual time.
    pub fn increment_actual_time(&self, id: TaskId, minutes: u32) -> TrackerResult<u32> {
        self.db.write(|tables| tables.increment_actual_time(id, minutes))
    }

    pub fn archive(&self, id: TaskId) -> TrackerResult<()> {
        self.set_archived(id, true)
    }

    pub fn unarchive(&self, id: TaskId) -> TrackerResult<()> {
        self.set_archived(id, false)
    }

    fn set_archived(&self, id: TaskId, archived: bool) -> TrackerResult<()> {
        self.db.write(|tables| {
            tables.task_mut(id)?.archived = archived;
            Ok(())
        })?;
        info!(task_id = id, archived, "changed archive flag");
        Ok(())
    }
}
