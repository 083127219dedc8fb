use crate::clock::Clock;
use crate::domain::Task;
use crate::store::{TaskStore, TimeLogStore};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Efficiency reported when no task qualifies
pub const NEUTRAL_EFFICIENCY: f64 = 1.0;

/// Maximum rows in a trend breakdown
pub const TREND_BREAKDOWN_ROWS: usize = 10;

/// Headline numbers for one day
#[derive(Debug, Clone, PartialEq)]
pub struct QuickStats {
    pub total: usize,
    pub completed: usize,
    pub total_estimated_minutes: u32,
    pub total_actual_minutes: u32,
    /// Estimated minutes of completed tasks
    pub completed_estimated_minutes: u32,
    /// Percentage 0-100
    pub completion_rate: f64,
    pub efficiency: f64,
}

/// One day of a weekly overview
#[derive(Debug, Clone, PartialEq)]
pub struct DayOverview {
    pub date: NaiveDate,
    pub total: usize,
    pub completed: usize,
    pub estimated_minutes: u32,
    pub actual_minutes: u32,
}

/// One day of a trend breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct DayTrend {
    pub date: NaiveDate,
    pub total: usize,
    pub completed: usize,
    pub completion_rate: f64,
    pub efficiency: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSummary {
    pub window_days: u32,
    /// Days in the window that had at least one task
    pub active_days: usize,
    pub avg_tasks_per_day: f64,
    /// Unweighted mean of each day's completion percentage
    pub avg_completion_rate: f64,
    pub avg_efficiency: f64,
    /// Most recent first, capped at `TREND_BREAKDOWN_ROWS`
    pub per_day: Vec<DayTrend>,
}

/// Derived rollup for one day, computed on demand
#[derive(Debug, Clone, PartialEq)]
pub struct ProductivityStat {
    pub date: NaiveDate,
    pub tasks_completed: usize,
    /// Minutes from focus sessions started that day
    pub total_time_worked: u32,
    pub efficiency_score: f64,
    /// Logged minutes as a percentage of the day's estimate, capped at 100
    pub focus_score: f64,
}

/// Mean estimated/actual over completed tasks with logged time
pub fn calculate_efficiency<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> f64 {
    let ratios: Vec<f64> = tasks.into_iter().filter_map(Task::efficiency).collect();
    if ratios.is_empty() {
        NEUTRAL_EFFICIENCY
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn calculate_quick_stats(tasks: &[Task]) -> QuickStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();

    QuickStats {
        total,
        completed,
        total_estimated_minutes: tasks.iter().map(|t| t.estimated_time).sum(),
        total_actual_minutes: tasks.iter().map(|t| t.actual_time).sum(),
        completed_estimated_minutes: tasks
            .iter()
            .filter(|t| t.completed)
            .map(|t| t.estimated_time)
            .sum(),
        completion_rate: percent(completed, total),
        efficiency: calculate_efficiency(tasks),
    }
}

fn day_overview(date: NaiveDate, tasks: &[&Task]) -> DayOverview {
    DayOverview {
        date,
        total: tasks.len(),
        completed: tasks.iter().filter(|t| t.completed).count(),
        estimated_minutes: tasks.iter().map(|t| t.estimated_time).sum(),
        actual_minutes: tasks.iter().map(|t| t.actual_time).sum(),
    }
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Read-only aggregator over the task and time log stores. Archived tasks are ignored.
#[derive(Clone)]
pub struct Analytics {
    tasks: TaskStore,
    time_logs: TimeLogStore,
    clock: Arc<dyn Clock>,
}

impl Analytics {
    pub fn new(tasks: TaskStore, time_logs: TimeLogStore, clock: Arc<dyn Clock>) -> Self {
        Self { tasks, time_logs, clock }
    }

    fn tasks_on(&self, date: NaiveDate) -> Vec<Task> {
        self.tasks
            .active()
            .into_iter()
            .filter(|t| t.date_created == date)
            .collect()
    }

    pub fn quick_stats(&self, date: NaiveDate) -> QuickStats {
        calculate_quick_stats(&self.tasks_on(date))
    }

    /// Per-day totals for the Monday-to-Sunday week containing `date`
    pub fn weekly_overview(&self, date: NaiveDate) -> Vec<DayOverview> {
        let monday = week_start(date);
        let sunday = monday + Duration::days(6);
        let tasks: Vec<Task> = self
            .tasks
            .active()
            .into_iter()
            .filter(|t| t.date_created >= monday && t.date_created <= sunday)
            .collect();

        (0..7)
            .map(|offset| {
                let day = monday + Duration::days(offset);
                let day_tasks: Vec<&Task> = tasks.iter().filter(|t| t.date_created == day).collect();
                day_overview(day, &day_tasks)
            })
            .collect()
    }

    /// Rollup over the `window_days` days ending today. Only days with tasks count.
    pub fn trend_summary(&self, window_days: u32) -> TrendSummary {
        let window_days = window_days.max(1);
        let today = self.clock.today();
        // Windows reaching past the calendar's start cover everything
        let first_day = today
            .checked_sub_signed(Duration::days(i64::from(window_days) - 1))
            .unwrap_or(NaiveDate::MIN);

        let mut by_day: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
        for task in self.tasks.active() {
            if task.date_created >= first_day && task.date_created <= today {
                by_day.entry(task.date_created).or_default().push(task);
            }
        }

        let days: Vec<DayTrend> = by_day
            .iter()
            .rev()
            .map(|(date, tasks)| {
                let completed = tasks.iter().filter(|t| t.completed).count();
                DayTrend {
                    date: *date,
                    total: tasks.len(),
                    completed,
                    completion_rate: percent(completed, tasks.len()),
                    efficiency: calculate_efficiency(tasks),
                }
            })
            .collect();

        let active_days = days.len();
        let (avg_tasks_per_day, avg_completion_rate) = if active_days == 0 {
            (0.0, 0.0)
        } else {
            let total_tasks: usize = days.iter().map(|d| d.total).sum();
            let rate_sum: f64 = days.iter().map(|d| d.completion_rate).sum();
            (
                total_tasks as f64 / active_days as f64,
                rate_sum / active_days as f64,
            )
        };

        let avg_efficiency = calculate_efficiency(by_day.values().flatten());

        TrendSummary {
            window_days,
            active_days,
            avg_tasks_per_day,
            avg_completion_rate,
            avg_efficiency,
            per_day: days.into_iter().take(TREND_BREAKDOWN_ROWS).collect(),
        }
    }

    pub fn daily_productivity(&self, date: NaiveDate) -> ProductivityStat {
        let tasks = self.tasks_on(date);
        let stats = calculate_quick_stats(&tasks);
        let worked: u32 = self
            .time_logs
            .on_date(date)
            .iter()
            .map(|log| log.whole_minutes())
            .sum();

        let focus_score = if stats.total_estimated_minutes == 0 {
            0.0
        } else {
            (worked as f64 / stats.total_estimated_minutes as f64 * 100.0).min(100.0)
        };

        ProductivityStat {
            date,
            tasks_completed: stats.completed,
            total_time_worked: worked,
            efficiency_score: stats.efficiency,
            focus_score,
        }
    }
}
