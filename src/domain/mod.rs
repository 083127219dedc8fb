pub mod enums;
pub mod task;
pub mod time_log;

pub use enums::{Priority, StatusFilter, TimerState};
pub use task::{format_minutes, parse_estimate, Task, TaskDraft, TaskId, TaskUpdate};
pub use time_log::{TimeLog, TimeLogId};
