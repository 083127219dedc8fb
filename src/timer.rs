use crate::clock::Clock;
use crate::domain::{TaskId, TimeLog, TimerState};
use crate::error::{TrackerError, TrackerResult};
use crate::store::{TaskStore, TimeLogStore};
use chrono::{DateTime, Duration, Local};
use std::sync::Arc;
use tracing::{debug, info};

/// How a session ended
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub elapsed: Duration,
    /// The committed log, when a task was bound
    pub log: Option<TimeLog>,
}

/// Focus timer: one session at a time, driven by an external 1-second tick.
///
/// Stopping always commits; there is no pause. A session that ends with a
/// bound task produces exactly one time log.
pub struct FocusTimer {
    state: TimerState,
    duration: Duration,
    task_id: Option<TaskId>,
    started_at: Option<DateTime<Local>>,
    last_outcome: Option<SessionOutcome>,
    tasks: TaskStore,
    time_logs: TimeLogStore,
    clock: Arc<dyn Clock>,
}

impl FocusTimer {
    pub fn new(tasks: TaskStore, time_logs: TimeLogStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: TimerState::Idle,
            duration: Duration::zero(),
            task_id: None,
            started_at: None,
            last_outcome: None,
            tasks,
            time_logs,
            clock,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn bound_task(&self) -> Option<TaskId> {
        self.task_id
    }

    pub fn last_outcome(&self) -> Option<&SessionOutcome> {
        self.last_outcome.as_ref()
    }

    /// Begin a session. A stopped session is discarded first.
    pub fn start(&mut self, duration_minutes: u32, task_id: Option<TaskId>) -> TrackerResult<()> {
        if self.state == TimerState::Running {
            return Err(TrackerError::InvalidState(
                "a focus session is already running".to_string(),
            ));
        }
        if duration_minutes == 0 {
            return Err(TrackerError::Validation(
                "focus duration must be at least one minute".to_string(),
            ));
        }
        if let Some(id) = task_id {
            self.tasks.get(id)?;
        }

        self.duration = Duration::minutes(i64::from(duration_minutes));
        self.task_id = task_id;
        self.started_at = Some(self.clock.now());
        self.last_outcome = None;
        self.state = TimerState::Running;

        info!(minutes = duration_minutes, task_id = ?task_id, "focus session started");
        Ok(())
    }

    fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(started) => (self.clock.now() - started).max(Duration::zero()),
            None => Duration::zero(),
        }
    }

    /// Seconds left in the running session (0 when not running)
    pub fn remaining_seconds(&self) -> i64 {
        if self.state != TimerState::Running {
            return 0;
        }
        (self.duration - self.elapsed()).num_seconds().max(0)
    }

    /// Advance the session. When the time is up the session stops and commits
    /// exactly the configured duration.
    pub fn tick(&mut self) -> TrackerResult<i64> {
        if self.state != TimerState::Running {
            return Err(TrackerError::InvalidState("tick requires a running session".to_string()));
        }

        let remaining = self.remaining_seconds();
        if remaining == 0 {
            debug!("focus session reached its configured duration");
            self.finish(self.duration)?;
        }
        Ok(remaining)
    }

    /// End the running session early, committing the elapsed time
    pub fn stop(&mut self) -> TrackerResult<Duration> {
        if self.state != TimerState::Running {
            return Err(TrackerError::InvalidState("stop requires a running session".to_string()));
        }
        let elapsed = self.elapsed().min(self.duration);
        self.finish(elapsed)?;
        Ok(elapsed)
    }

    /// Back to Idle without committing. Valid from any state.
    pub fn reset(&mut self) {
        if self.state == TimerState::Running {
            info!(task_id = ?self.task_id, "focus session discarded");
        }
        self.state = TimerState::Idle;
        self.task_id = None;
        self.started_at = None;
        self.duration = Duration::zero();
    }

    /// Transition to Stopped and commit. The state moves to Stopped even when
    /// the commit fails so a deleted task cannot wedge the timer.
    fn finish(&mut self, elapsed: Duration) -> TrackerResult<()> {
        self.state = TimerState::Stopped;
        let start = self.started_at.take().unwrap_or_else(|| self.clock.now());

        let log = match self.task_id {
            Some(task_id) => {
                Some(self.time_logs.commit_session(task_id, start, start + elapsed, "Focus session")?)
            }
            None => None,
        };

        info!(
            elapsed_secs = elapsed.num_seconds(),
            committed = log.is_some(),
            "focus session stopped"
        );
        self.last_outcome = Some(SessionOutcome { elapsed, log });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::TaskDraft;
    use crate::store::Database;
    use chrono::NaiveDate;

    struct Fixture {
        tasks: TaskStore,
        logs: TimeLogStore,
        clock: ManualClock,
        timer: FocusTimer,
    }

    fn create_fixture() -> Fixture {
        let db = Arc::new(Database::in_memory());
        let clock = ManualClock::at_noon(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let tasks = TaskStore::new(db.clone(), shared.clone());
        let logs = TimeLogStore::new(db);
        let timer = FocusTimer::new(tasks.clone(), logs.clone(), shared);
        Fixture { tasks, logs, clock, timer }
    }

    #[test]
    fn test_start_stop_without_ticks_commits_zero() {
        let mut f = create_fixture();
        let id = f.tasks.add(TaskDraft::new("Task")).unwrap();

        f.timer.start(25, Some(id)).unwrap();
        assert_eq!(f.timer.state(), TimerState::Running);
        let elapsed = f.timer.stop().unwrap();

        assert_eq!(elapsed, Duration::zero());
        assert_eq!(f.timer.state(), TimerState::Stopped);
        let logs = f.logs.for_task(id);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].duration, 0);
        assert_eq!(f.tasks.get(id).unwrap().actual_time, 0);
    }

    #[test]
    fn test_ticks_to_completion_auto_stop() {
        let mut f = create_fixture();
        let id = f.tasks.add(TaskDraft::new("Task")).unwrap();
        f.timer.start(25, Some(id)).unwrap();

        let mut ticks = 0;
        loop {
            f.clock.advance(Duration::seconds(1));
            let remaining = f.timer.tick().unwrap();
            ticks += 1;
            if remaining == 0 {
                break;
            }
            assert_eq!(f.timer.state(), TimerState::Running);
        }

        assert_eq!(ticks, 1500);
        assert_eq!(f.timer.state(), TimerState::Stopped);
        let logs = f.logs.for_task(id);
        assert_eq!(logs.len(), 1);
        assert!((logs[0].duration - 1500).abs() <= 1);
        assert_eq!(f.tasks.get(id).unwrap().actual_time, 25);
        assert!(f.timer.tick().is_err());
    }

    #[test]
    fn test_late_tick_commits_configured_duration() {
        let mut f = create_fixture();
        let id = f.tasks.add(TaskDraft::new("Task")).unwrap();
        f.timer.start(1, Some(id)).unwrap();

        f.clock.advance(Duration::minutes(10));
        assert_eq!(f.timer.tick().unwrap(), 0);

        assert_eq!(f.logs.for_task(id)[0].duration, 60);
        assert_eq!(f.tasks.get(id).unwrap().actual_time, 1);
    }

    #[test]
    fn test_stop_rounds_minutes_down() {
        let mut f = create_fixture();
        let id = f.tasks.add(TaskDraft::new("Task")).unwrap();
        f.timer.start(25, Some(id)).unwrap();

        f.clock.advance(Duration::seconds(7 * 60 + 59));
        let elapsed = f.timer.stop().unwrap();

        assert_eq!(elapsed.num_seconds(), 479);
        assert_eq!(f.tasks.get(id).unwrap().actual_time, 7);
        assert_eq!(f.timer.last_outcome().unwrap().log.as_ref().unwrap().duration, 479);
    }

    #[test]
    fn test_start_while_running_is_invalid() {
        let mut f = create_fixture();
        f.timer.start(25, None).unwrap();
        assert!(matches!(f.timer.start(5, None), Err(TrackerError::InvalidState(_))));
    }

    #[test]
    fn test_operations_require_running() {
        let mut f = create_fixture();
        assert!(matches!(f.timer.tick(), Err(TrackerError::InvalidState(_))));
        assert!(matches!(f.timer.stop(), Err(TrackerError::InvalidState(_))));
        assert_eq!(f.timer.remaining_seconds(), 0);
    }

    #[test]
    fn test_unbound_session_commits_nothing() {
        let mut f = create_fixture();
        f.timer.start(5, None).unwrap();
        f.clock.advance(Duration::minutes(2));

        assert_eq!(f.timer.stop().unwrap(), Duration::minutes(2));
        assert!(f.logs.all().is_empty());
        assert!(f.timer.last_outcome().unwrap().log.is_none());
    }

    #[test]
    fn test_reset_discards_and_is_idempotent() {
        let mut f = create_fixture();
        let id = f.tasks.add(TaskDraft::new("Task")).unwrap();
        f.timer.start(25, Some(id)).unwrap();
        f.clock.advance(Duration::minutes(3));

        f.timer.reset();
        f.timer.reset();

        assert_eq!(f.timer.state(), TimerState::Idle);
        assert_eq!(f.timer.bound_task(), None);
        assert!(f.logs.all().is_empty());
        assert_eq!(f.tasks.get(id).unwrap().actual_time, 0);
    }

    #[test]
    fn test_new_session_after_stop() {
        let mut f = create_fixture();
        let id = f.tasks.add(TaskDraft::new("Task")).unwrap();

        f.timer.start(5, Some(id)).unwrap();
        f.clock.advance(Duration::minutes(2));
        f.timer.stop().unwrap();

        f.timer.start(5, Some(id)).unwrap();
        f.clock.advance(Duration::minutes(3));
        f.timer.stop().unwrap();

        assert_eq!(f.logs.for_task(id).len(), 2);
        assert_eq!(f.tasks.get(id).unwrap().actual_time, 5);
    }

    #[test]
    fn test_start_validates_task_and_duration() {
        let mut f = create_fixture();
        assert!(matches!(f.timer.start(25, Some(9)), Err(TrackerError::NotFound { .. })));
        assert!(matches!(f.timer.start(0, None), Err(TrackerError::Validation(_))));
        assert_eq!(f.timer.state(), TimerState::Idle);
    }

    #[test]
    fn test_deleted_task_still_stops_timer() {
        let mut f = create_fixture();
        let id = f.tasks.add(TaskDraft::new("Task")).unwrap();
        f.timer.start(5, Some(id)).unwrap();
        f.tasks.delete(id).unwrap();

        assert!(matches!(f.timer.stop(), Err(TrackerError::NotFound { .. })));
        assert_eq!(f.timer.state(), TimerState::Stopped);
        assert!(f.logs.all().is_empty());
    }
}
