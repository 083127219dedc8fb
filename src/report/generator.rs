use super::stats::{Analytics, NEUTRAL_EFFICIENCY};
use crate::domain::{format_minutes, StatusFilter};
use crate::persistence::{atomic_write, report_file};
use crate::store::{TaskStore, TimeLogStore};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

/// Format percentage with 1 decimal place
fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

fn format_efficiency(value: f64) -> String {
    format!("{:.2}x", value)
}

/// Render the daily markdown report for `date`
pub fn render_report(
    date: NaiveDate,
    tasks: &TaskStore,
    time_logs: &TimeLogStore,
    analytics: &Analytics,
) -> String {
    let stats = analytics.quick_stats(date);
    let productivity = analytics.daily_productivity(date);
    let week = analytics.weekly_overview(date);
    let day_tasks = tasks.list(date, StatusFilter::All, "");
    let sessions = time_logs.on_date(date);

    let mut report = String::new();
    report.push_str(&format!("# Daily Report - {}\n\n", date));

    report.push_str("## Summary\n\n");
    report.push_str(&format!(
        "- **Tasks:** {}/{} completed ({})\n",
        stats.completed,
        stats.total,
        format_percent(stats.completion_rate)
    ));
    report.push_str(&format!(
        "- **Planned Time:** {} ({} completed)\n",
        format_minutes(stats.total_estimated_minutes),
        format_minutes(stats.completed_estimated_minutes)
    ));
    report.push_str(&format!(
        "- **Actual Time:** {}\n",
        format_minutes(stats.total_actual_minutes)
    ));
    if stats.efficiency == NEUTRAL_EFFICIENCY && stats.completed == 0 {
        report.push_str("- **Efficiency:** n/a\n\n");
    } else {
        report.push_str(&format!("- **Efficiency:** {}\n\n", format_efficiency(stats.efficiency)));
    }

    report.push_str("## Focus\n\n");
    report.push_str(&format!("- **Sessions:** {}\n", sessions.len()));
    report.push_str(&format!(
        "- **Time Worked:** {}\n",
        format_minutes(productivity.total_time_worked)
    ));
    report.push_str(&format!(
        "- **Focus Score:** {}\n\n",
        format_percent(productivity.focus_score)
    ));

    if !day_tasks.is_empty() {
        report.push_str("## Tasks\n\n");
        for task in &day_tasks {
            let check = if task.completed { "x" } else { " " };
            report.push_str(&format!(
                "- [{}] **{}** ({}, {}) {} / {} est, {}%\n",
                check,
                task.title,
                task.priority,
                task.category,
                format_minutes(task.actual_time),
                format_minutes(task.estimated_time),
                task.progress
            ));
        }
        report.push('\n');
    }

    report.push_str("## Week\n\n");
    report.push_str("| Day | Tasks | Done | Planned | Actual |\n");
    report.push_str("|-----|-------|------|---------|--------|\n");
    for day in &week {
        report.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            day.date.format("%a %m-%d"),
            day.total,
            day.completed,
            format_minutes(day.estimated_minutes),
            format_minutes(day.actual_minutes)
        ));
    }

    report
}

/// Generate and write a daily report. Returns the written path.
pub fn generate_report(
    date: NaiveDate,
    output_path: Option<PathBuf>,
    tasks: &TaskStore,
    time_logs: &TimeLogStore,
    analytics: &Analytics,
) -> Result<PathBuf> {
    let report = render_report(date, tasks, time_logs, analytics);
    let path = match output_path {
        Some(path) => path,
        None => report_file(date)?,
    };

    atomic_write(&path, &report)
        .with_context(|| format!("Failed to write report for {}", date))?;
    info!(path = %path.display(), %date, "wrote daily report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::domain::{Priority, TaskDraft};
    use crate::store::Database;
    use chrono::Duration;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()
    }

    fn create_parts() -> (TaskStore, TimeLogStore, Analytics, ManualClock) {
        let db = Arc::new(Database::in_memory());
        let clock = ManualClock::at_noon(today());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let tasks = TaskStore::new(db.clone(), shared.clone());
        let logs = TimeLogStore::new(db);
        let analytics = Analytics::new(tasks.clone(), logs.clone(), shared);
        (tasks, logs, analytics, clock)
    }

    #[test]
    fn test_render_report_sections() {
        let (tasks, logs, analytics, clock) = create_parts();
        let id = tasks
            .add(TaskDraft {
                priority: Some(Priority::High),
                estimated_time: Some("45".to_string()),
                ..TaskDraft::new("Write report")
            })
            .unwrap();
        tasks.add(TaskDraft::new("Read mail")).unwrap();
        let start = clock.now();
        logs.commit_session(id, start, start + Duration::minutes(25), "").unwrap();
        tasks.toggle_complete(id).unwrap();

        let report = render_report(today(), &tasks, &logs, &analytics);

        assert!(report.starts_with("# Daily Report - 2024-03-13\n"));
        assert!(report.contains("- **Tasks:** 1/2 completed (50.0%)"));
        assert!(report.contains("- **Planned Time:** 1h 15m (45m completed)"));
        assert!(report.contains("- **Efficiency:** 1.80x"));
        assert!(report.contains("- **Sessions:** 1"));
        assert!(report.contains("- [x] **Write report** (High, General) 25m / 45m est, 100%"));
        assert!(report.contains("| Wed 03-13 | 2 | 1 | 1h 15m | 25m |"));
    }

    #[test]
    fn test_render_report_empty_day() {
        let (tasks, logs, analytics, _clock) = create_parts();
        let report = render_report(today(), &tasks, &logs, &analytics);

        assert!(report.contains("- **Tasks:** 0/0 completed (0.0%)"));
        assert!(report.contains("- **Efficiency:** n/a"));
        assert!(!report.contains("## Tasks"));
    }

    #[test]
    fn test_generate_report_writes_file() {
        let (tasks, logs, analytics, _clock) = create_parts();
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("report.md");

        let path = generate_report(today(), Some(output.clone()), &tasks, &logs, &analytics)
            .unwrap();

        assert_eq!(path, output);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("## Week"));
    }
}
