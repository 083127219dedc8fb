use super::task::TaskId;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub type TimeLogId = i64;

/// One committed focus session. Never edited after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: TimeLogId,
    pub task_id: TaskId,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    /// Seconds, `end_time - start_time`
    pub duration: i64,
    #[serde(default)]
    pub notes: String,
}

impl TimeLog {
    /// Whole minutes of the session, rounded down
    pub fn whole_minutes(&self) -> u32 {
        (self.duration.max(0) / 60) as u32
    }
}
