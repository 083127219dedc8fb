use serde::{Deserialize, Serialize};

/// Task priority. Declaration order is the listing rank (High first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Parse priority from a label like "high" or "High"
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Sort rank used by task listings (lower sorts first)
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Status filter applied to a day's task listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Pending,
    HighPriority,
    /// Not completed and filed before today
    Overdue,
}

impl StatusFilter {
    /// Parse filter from a label ("all", "completed", "pending", "high", "overdue")
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "all" => Some(Self::All),
            "completed" | "done" => Some(Self::Completed),
            "pending" => Some(Self::Pending),
            "high" | "high priority" => Some(Self::HighPriority),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Completed => "Completed",
            Self::Pending => "Pending",
            Self::HighPriority => "High Priority",
            Self::Overdue => "Overdue",
        }
    }
}

/// Focus timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    /// Terminal for the session; the next `start` begins a new one
    Stopped,
}
