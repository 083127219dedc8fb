use crate::clock::{Clock, SystemClock};
use crate::config::Preferences;
use crate::domain::{TaskId, TimerState};
use crate::error::TrackerResult;
use crate::persistence::{database_file, AutoSaver};
use crate::report::Analytics;
use crate::store::{Database, SettingsStore, TaskStore, TimeLogStore};
use crate::timer::{FocusTimer, SessionOutcome};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// The tracker core: stores, timer and analytics over one shared database.
/// Callers hold this and drive it; it owns no presentation state.
pub struct Tracker {
    pub db: Arc<Database>,
    pub clock: Arc<dyn Clock>,
    pub tasks: TaskStore,
    pub time_logs: TimeLogStore,
    pub settings: SettingsStore,
    pub analytics: Analytics,
    pub timer: FocusTimer,
}

impl Tracker {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        let tasks = TaskStore::new(db.clone(), clock.clone());
        let time_logs = TimeLogStore::new(db.clone());
        let settings = SettingsStore::new(db.clone());
        let analytics = Analytics::new(tasks.clone(), time_logs.clone(), clock.clone());
        let timer = FocusTimer::new(tasks.clone(), time_logs.clone(), clock.clone());

        Self {
            db,
            clock,
            tasks,
            time_logs,
            settings,
            analytics,
            timer,
        }
    }

    /// Open the database in the resolved data directory with the system clock
    pub fn open_default() -> Result<Self> {
        let path = database_file()?;
        let db = Database::open(&path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Self::new(Arc::new(db), Arc::new(SystemClock)))
    }

    pub fn preferences(&self) -> Preferences {
        Preferences::load(&self.settings)
    }

    /// Flush pending writes now
    pub fn save(&self) -> TrackerResult<bool> {
        self.db.flush()
    }

    /// Start the periodic background flush using the configured interval
    pub fn start_autosave(&self) -> std::io::Result<AutoSaver> {
        AutoSaver::spawn(self.db.clone(), self.preferences().autosave_interval())
    }

    /// Run a focus session until it completes, or stop it early once
    /// `interrupted` is set. Either way the elapsed time is committed.
    /// `wait` runs before every tick; `on_tick` sees the seconds remaining.
    pub fn run_focus(
        &mut self,
        minutes: u32,
        task_id: Option<TaskId>,
        interrupted: &AtomicBool,
        mut wait: impl FnMut(),
        mut on_tick: impl FnMut(i64),
    ) -> TrackerResult<Option<SessionOutcome>> {
        self.timer.start(minutes, task_id)?;

        // Ticking to zero moves the timer to Stopped
        while self.timer.state() == TimerState::Running {
            wait();
            if interrupted.load(Ordering::SeqCst) {
                let task_id = self.timer.bound_task();
                let elapsed = self.timer.stop()?;
                info!(task_id = ?task_id, elapsed_secs = elapsed.num_seconds(), "focus session interrupted");
                break;
            }
            on_tick(self.timer.tick()?);
        }

        let outcome = self.timer.last_outcome().cloned();
        self.timer.reset();
        Ok(outcome)
    }
}
