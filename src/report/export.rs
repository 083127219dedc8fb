use crate::domain::{parse_estimate, Priority, Task, TaskDraft, TaskId, TaskUpdate};
use crate::error::TrackerResult;
use crate::store::TaskStore;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

pub const CSV_HEADER: [&str; 11] = [
    "Date",
    "Title",
    "Description",
    "Priority",
    "Category",
    "Completed",
    "Estimated Time (min)",
    "Actual Time (min)",
    "Tags",
    "Notes",
    "Progress (%)",
];

/// One parsed CSV row
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub date: NaiveDate,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: String,
    pub completed: bool,
    pub estimated_time: u32,
    pub actual_time: u32,
    pub tags: String,
    pub notes: String,
    pub progress: u8,
}

fn csv_escape(s: &str) -> String {
    let needs_quote = s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r');
    if !needs_quote {
        return s.to_string();
    }
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Render every task as CSV, ordered by date then id
pub fn export_csv(tasks: &[Task]) -> String {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by_key(|t| (t.date_created, t.id));

    let mut out = CSV_HEADER.join(",");
    out.push('\n');

    for task in sorted {
        let row = [
            task.date_created.format("%Y-%m-%d").to_string(),
            csv_escape(&task.title),
            csv_escape(&task.description),
            task.priority.label().to_string(),
            csv_escape(&task.category),
            if task.completed { "Yes" } else { "No" }.to_string(),
            task.estimated_time.to_string(),
            task.actual_time.to_string(),
            csv_escape(&task.tags),
            csv_escape(&task.notes),
            task.progress.to_string(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Split CSV text into records, honouring quoted fields with embedded
/// separators, quotes and newlines
fn split_records(content: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        bail!("Unterminated quoted field");
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

fn parse_row(fields: &[String]) -> Result<ExportRow> {
    if fields.len() != CSV_HEADER.len() {
        bail!("expected {} fields, found {}", CSV_HEADER.len(), fields.len());
    }

    let date = NaiveDate::parse_from_str(fields[0].trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'", fields[0]))?;
    if fields[1].trim().is_empty() {
        bail!("Empty title");
    }
    let priority = Priority::from_label(&fields[3])
        .with_context(|| format!("Invalid priority '{}'", fields[3]))?;
    let completed = match fields[5].trim().to_lowercase().as_str() {
        "yes" | "true" | "1" => true,
        "no" | "false" | "0" | "" => false,
        other => bail!("Invalid completed flag '{}'", other),
    };

    Ok(ExportRow {
        date,
        title: fields[1].clone(),
        description: fields[2].clone(),
        priority,
        category: fields[4].clone(),
        completed,
        estimated_time: parse_estimate(&fields[6]),
        actual_time: fields[7].trim().parse().unwrap_or(0),
        tags: fields[8].clone(),
        notes: fields[9].clone(),
        progress: fields[10].trim().parse::<u8>().unwrap_or(0).min(100),
    })
}

/// Parse CSV produced by `export_csv`
pub fn parse_csv(content: &str) -> Result<Vec<ExportRow>> {
    let mut records = split_records(content)?.into_iter();

    let header = records.next().context("CSV is empty")?;
    let header: Vec<&str> = header.iter().map(|h| h.trim()).collect();
    if header != CSV_HEADER {
        bail!("Unexpected CSV header: {}", header.join(","));
    }

    records
        .enumerate()
        .filter(|(_, fields)| !(fields.len() == 1 && fields[0].trim().is_empty()))
        .map(|(i, fields)| parse_row(&fields).with_context(|| format!("Row {}", i + 2)))
        .collect()
}

/// Build a new task from a row. The export carries no completion date, so a
/// completed row is stamped as completed on the date it was filed under.
fn row_to_task(row: ExportRow) -> Task {
    if row.actual_time > 0 {
        warn!(title = %row.title, minutes = row.actual_time, "skipping imported actual time");
    }

    let date = row.date;
    let mut task = Task::from_draft(
        0,
        TaskDraft {
            title: row.title,
            description: Some(row.description),
            priority: Some(row.priority),
            category: Some(row.category),
            estimated_time: Some(row.estimated_time.to_string()),
            tags: Some(row.tags),
            notes: Some(row.notes),
            date: Some(date),
            ..Default::default()
        },
        date,
    );

    if row.completed {
        task.set_completed(true, date);
    } else {
        TaskUpdate {
            progress: Some(i64::from(row.progress)),
            ..Default::default()
        }
        .apply_to(&mut task);
    }
    task
}

/// Add parsed rows as new tasks in one write: either every row lands or none does.
/// Actual time is timer-owned and not imported.
pub fn import_rows(tasks: &TaskStore, rows: Vec<ExportRow>) -> TrackerResult<Vec<TaskId>> {
    let ids = tasks.insert_all(rows.into_iter().map(row_to_task).collect())?;

    info!(count = ids.len(), "imported tasks");
    Ok(ids)
}
