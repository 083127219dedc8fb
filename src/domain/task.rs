use super::enums::Priority;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type TaskId = i64;

/// Estimate used when no estimate is given or the input does not parse
pub const DEFAULT_ESTIMATE_MINUTES: u32 = 30;

/// Category assigned when none is given
pub const DEFAULT_CATEGORY: &str = "General";

/// Coerce raw estimate input into minutes, falling back to the default
pub fn parse_estimate(raw: &str) -> u32 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_ESTIMATE_MINUTES;
    }
    trimmed.parse::<u32>().unwrap_or(DEFAULT_ESTIMATE_MINUTES)
}

/// Format minutes as "Xh Ym" (omits 0 values)
pub fn format_minutes(total_minutes: u32) -> String {
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 && minutes > 0 {
        format!("{}h {}m", hours, minutes)
    } else if hours > 0 {
        format!("{}h", hours)
    } else {
        format!("{}m", minutes)
    }
}

/// One unit of work filed under a calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub completed: bool,
    /// Date the task is filed under (partition key for per-day queries)
    pub date_created: NaiveDate,
    #[serde(default)]
    pub date_completed: Option<NaiveDate>,
    /// Minutes
    #[serde(default = "default_estimate")]
    pub estimated_time: u32,
    /// Minutes, only ever increased by committed focus sessions
    #[serde(default)]
    pub actual_time: u32,
    /// Comma-joined tags
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub recurring_type: Option<String>,
    #[serde(default)]
    pub recurring_interval: Option<u32>,
    #[serde(default)]
    pub parent_task_id: Option<TaskId>,
    /// Percentage 0-100
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub archived: bool,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_estimate() -> u32 {
    DEFAULT_ESTIMATE_MINUTES
}

impl Task {
    /// Build a task from a draft. Title validation happens in the store.
    pub fn from_draft(id: TaskId, draft: TaskDraft, today: NaiveDate) -> Self {
        let category = draft
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_category);

        Self {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description.unwrap_or_default(),
            priority: draft.priority.unwrap_or_default(),
            category,
            completed: false,
            date_created: draft.date.unwrap_or(today),
            date_completed: None,
            estimated_time: draft
                .estimated_time
                .as_deref()
                .map(parse_estimate)
                .unwrap_or(DEFAULT_ESTIMATE_MINUTES),
            actual_time: 0,
            tags: draft.tags.unwrap_or_default(),
            notes: draft.notes.unwrap_or_default(),
            recurring_type: draft.recurring_type,
            recurring_interval: draft.recurring_interval,
            parent_task_id: draft.parent_task_id,
            progress: 0,
            archived: false,
        }
    }

    /// Set completion state, keeping `date_completed` and `progress` in step
    pub fn set_completed(&mut self, completed: bool, today: NaiveDate) {
        self.completed = completed;
        if completed {
            self.date_completed = Some(today);
            self.progress = 100;
        } else {
            self.date_completed = None;
            self.progress = 0;
        }
    }

    /// Not completed and filed before `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.date_created < today
    }

    /// Case-insensitive substring match over title, description and tags
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
            || self.tags.to_lowercase().contains(&term)
    }

    /// Estimated / actual for completed tasks with logged time
    pub fn efficiency(&self) -> Option<f64> {
        if self.completed && self.actual_time > 0 {
            Some(self.estimated_time as f64 / self.actual_time as f64)
        } else {
            None
        }
    }

    /// Individual tags, trimmed, empties dropped
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    /// Raw user input; anything that is not a non-negative integer becomes the default
    pub estimated_time: Option<String>,
    pub tags: Option<String>,
    pub notes: Option<String>,
    pub recurring_type: Option<String>,
    pub recurring_interval: Option<u32>,
    pub parent_task_id: Option<TaskId>,
    /// Date to file the task under, defaults to today
    pub date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Partial update from the task editor
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub estimated_time: Option<String>,
    pub tags: Option<String>,
    pub notes: Option<String>,
    pub progress: Option<i64>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.estimated_time.is_none()
            && self.tags.is_none()
            && self.notes.is_none()
            && self.progress.is_none()
    }

    /// Apply the update to `task`. The caller validates the resulting title.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category) = self.category {
            let category = category.trim();
            task.category = if category.is_empty() {
                default_category()
            } else {
                category.to_string()
            };
        }
        if let Some(raw) = self.estimated_time {
            task.estimated_time = parse_estimate(&raw);
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
        if let Some(notes) = self.notes {
            task.notes = notes;
        }
        // Completed tasks stay at 100
        if let Some(progress) = self.progress {
            if !task.completed {
                task.progress = progress.clamp(0, 100) as u8;
            }
        }
    }
}
