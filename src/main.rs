use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use daytrack::app::Tracker;
use daytrack::domain::{format_minutes, Priority, StatusFilter, Task, TaskDraft, TaskId, TaskUpdate};
use daytrack::persistence::{self, export_file, init_local_data_dir};
use daytrack::{report, ticker};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "daytrack")]
#[command(about = "A daily task tracker with focus timer and productivity statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a local .daytrack directory in the current directory
    Init,
    /// Add a task
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// High, Medium or Low
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        /// Estimated minutes (invalid input falls back to 30)
        #[arg(short, long)]
        estimate: Option<String>,
        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
        /// Date to file the task under (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        recurring: Option<String>,
        #[arg(long)]
        interval: Option<u32>,
        #[arg(long)]
        parent: Option<TaskId>,
    },
    /// List tasks filed under a date
    List {
        #[arg(long)]
        date: Option<String>,
        /// all, completed, pending, high-priority or overdue
        #[arg(short, long, default_value = "all")]
        filter: String,
        #[arg(short, long, default_value = "")]
        search: String,
        /// List archived tasks instead
        #[arg(long)]
        archived: bool,
    },
    /// Show a task and its focus sessions
    Show { id: TaskId },
    /// Toggle completion of a task
    Toggle { id: TaskId },
    /// Edit task fields
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        estimate: Option<String>,
        #[arg(short, long)]
        tags: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        progress: Option<i64>,
    },
    /// Delete a task and its focus sessions
    Delete {
        id: TaskId,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Hide a task from listings and statistics without deleting it
    Archive { id: TaskId },
    /// Restore an archived task
    Unarchive { id: TaskId },
    /// Run a focus session, optionally logging time to a task
    Focus {
        #[arg(short, long)]
        minutes: Option<u32>,
        #[arg(short, long)]
        task: Option<TaskId>,
    },
    /// Quick statistics for a date
    Stats {
        #[arg(long)]
        date: Option<String>,
    },
    /// Per-day overview of the week containing a date
    Week {
        #[arg(long)]
        date: Option<String>,
    },
    /// Rollup over recent days
    Trend {
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Generate a daily markdown report
    Report {
        /// Date to generate report for (YYYY-MM-DD format). Defaults to today.
        #[arg(short, long)]
        date: Option<String>,
        /// Output file path. Defaults to <data dir>/report-YYYY-MM-DD.md
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Export all tasks as CSV
    Export {
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Import tasks from a CSV export
    Import { file: PathBuf },
    /// Read and write settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
    List,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("DAYTRACK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("daytrack=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn parse_date(raw: Option<String>, tracker: &Tracker) -> Result<NaiveDate> {
    match raw {
        Some(date_str) => NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid date format. Use YYYY-MM-DD: {}", e)),
        None => Ok(tracker.clock.today()),
    }
}

fn parse_priority(raw: Option<String>) -> Result<Option<Priority>> {
    raw.map(|p| {
        Priority::from_label(&p).with_context(|| format!("Unknown priority '{}'. Use High, Medium or Low", p))
    })
    .transpose()
}

fn print_task_line(task: &Task) {
    let check = if task.completed { "x" } else { " " };
    println!(
        "[{}] #{:<4} {:<6} {} ({}) {}/{} {}%",
        check,
        task.id,
        task.priority.label(),
        task.title,
        task.category,
        format_minutes(task.actual_time),
        format_minutes(task.estimated_time),
        task.progress
    );
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        let data_dir = init_local_data_dir()?;
        println!("Initialized data directory: {}", data_dir.display());
        return Ok(());
    }

    let mut tracker = Tracker::open_default()?;
    let result = run_command(&mut tracker, cli.command);

    // Persist whatever succeeded, even if the command failed afterwards
    if let Err(e) = tracker.save() {
        eprintln!("Error saving state: {}", e);
    }
    result
}

fn run_command(tracker: &mut Tracker, command: Commands) -> Result<()> {
    match command {
        Commands::Init => Ok(()),
        Commands::Add {
            title,
            description,
            priority,
            category,
            estimate,
            tags,
            notes,
            date,
            recurring,
            interval,
            parent,
        } => {
            let date = parse_date(date, tracker)?;
            let id = tracker.tasks.add(TaskDraft {
                title,
                description,
                priority: parse_priority(priority)?,
                category,
                estimated_time: estimate,
                tags,
                notes,
                recurring_type: recurring,
                recurring_interval: interval,
                parent_task_id: parent,
                date: Some(date),
            })?;
            println!("Added task #{} for {}", id, date);
            Ok(())
        }
        Commands::List {
            date,
            filter,
            search,
            archived,
        } => {
            let tasks = if archived {
                tracker.tasks.list_archived()
            } else {
                let date = parse_date(date, tracker)?;
                let filter = StatusFilter::from_label(&filter)
                    .with_context(|| format!("Unknown filter '{}'", filter))?;
                println!("{} ({})", date, filter.label());
                tracker.tasks.list(date, filter, &search)
            };

            if tasks.is_empty() {
                println!("No tasks found.");
            }
            for task in &tasks {
                print_task_line(task);
            }
            Ok(())
        }
        Commands::Show { id } => {
            let task = tracker.tasks.get(id)?;
            print_task_line(&task);
            println!("  filed:     {}", task.date_created);
            if let Some(done) = task.date_completed {
                println!("  completed: {}", done);
            }
            if task.is_overdue(tracker.clock.today()) {
                println!("  OVERDUE");
            }
            if !task.description.is_empty() {
                println!("  {}", task.description);
            }
            if !task.tags.is_empty() {
                println!("  tags:  {}", task.tag_list().join(", "));
            }
            if !task.notes.is_empty() {
                println!("  notes: {}", task.notes);
            }
            for log in tracker.time_logs.for_task(id) {
                println!(
                    "  session {} {} - {} ({}s)",
                    log.start_time.format("%Y-%m-%d"),
                    log.start_time.format("%H:%M"),
                    log.end_time.format("%H:%M"),
                    log.duration
                );
            }
            Ok(())
        }
        Commands::Toggle { id } => {
            let completed = tracker.tasks.toggle_complete(id)?;
            println!("Task #{} {}", id, if completed { "completed" } else { "reopened" });
            Ok(())
        }
        Commands::Edit {
            id,
            title,
            description,
            priority,
            category,
            estimate,
            tags,
            notes,
            progress,
        } => {
            let update = TaskUpdate {
                title,
                description,
                priority: parse_priority(priority)?,
                category,
                estimated_time: estimate,
                tags,
                notes,
                progress,
            };
            if update.is_empty() {
                bail!("Nothing to update");
            }
            let task = tracker.tasks.update(id, update)?;
            print_task_line(&task);
            Ok(())
        }
        Commands::Delete { id, yes } => {
            if !yes {
                bail!("Deleting task #{} is irreversible. Re-run with --yes to confirm.", id);
            }
            let removed = tracker.tasks.delete(id)?;
            println!("Deleted task #{} and {} focus session(s)", id, removed);
            Ok(())
        }
        Commands::Archive { id } => {
            tracker.tasks.archive(id)?;
            println!("Archived task #{}", id);
            Ok(())
        }
        Commands::Unarchive { id } => {
            tracker.tasks.unarchive(id)?;
            println!("Restored task #{}", id);
            Ok(())
        }
        Commands::Focus { minutes, task } => {
            let minutes = minutes.unwrap_or(tracker.preferences().focus_minutes);
            run_focus(tracker, minutes, task)
        }
        Commands::Stats { date } => {
            let date = parse_date(date, tracker)?;
            let stats = tracker.analytics.quick_stats(date);
            println!("{}", date);
            println!(
                "  {}/{} tasks ({:.1}% complete)",
                stats.completed, stats.total, stats.completion_rate
            );
            println!(
                "  {}/{} planned time completed",
                format_minutes(stats.completed_estimated_minutes),
                format_minutes(stats.total_estimated_minutes)
            );
            println!("  {} logged", format_minutes(stats.total_actual_minutes));
            println!("  efficiency {:.2}x", stats.efficiency);
            Ok(())
        }
        Commands::Week { date } => {
            let date = parse_date(date, tracker)?;
            for day in tracker.analytics.weekly_overview(date) {
                println!(
                    "{}  {}/{} done  {} planned  {} actual",
                    day.date.format("%a %Y-%m-%d"),
                    day.completed,
                    day.total,
                    format_minutes(day.estimated_minutes),
                    format_minutes(day.actual_minutes)
                );
            }
            Ok(())
        }
        Commands::Trend { days } => {
            let days = days.unwrap_or(tracker.preferences().trend_window_days);
            let trend = tracker.analytics.trend_summary(days);
            println!("Last {} days ({} with tasks)", trend.window_days, trend.active_days);
            println!("  {:.1} tasks per day", trend.avg_tasks_per_day);
            println!("  {:.1}% average completion", trend.avg_completion_rate);
            println!("  {:.2}x average efficiency", trend.avg_efficiency);
            for day in &trend.per_day {
                println!(
                    "  {}  {}/{} ({:.0}%)  {:.2}x",
                    day.date, day.completed, day.total, day.completion_rate, day.efficiency
                );
            }
            Ok(())
        }
        Commands::Report { date, output } => {
            let date = parse_date(date, tracker)?;
            println!("Generating report for {}...", date);
            let path = report::generate_report(
                date,
                output.map(PathBuf::from),
                &tracker.tasks,
                &tracker.time_logs,
                &tracker.analytics,
            )?;
            println!("Report generated: {}", path.display());
            Ok(())
        }
        Commands::Export { output } => {
            let path = match output {
                Some(path) => PathBuf::from(path),
                None => export_file(tracker.clock.today())?,
            };
            let csv = report::export_csv(&tracker.tasks.all());
            persistence::atomic_write(&path, &csv)?;
            println!("Exported tasks to {}", path.display());
            Ok(())
        }
        Commands::Import { file } => {
            let content = persistence::read_file(&file)?;
            let rows = report::parse_csv(&content)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            let ids = report::import_rows(&tracker.tasks, rows)?;
            println!("Imported {} task(s)", ids.len());
            Ok(())
        }
        Commands::Config { command } => {
            match command {
                ConfigCommand::Get { key } => match tracker.settings.get(&key) {
                    Some(value) => println!("{}", value),
                    None => println!("{} is not set", key),
                },
                ConfigCommand::Set { key, value } => {
                    tracker.settings.set(&key, &value)?;
                    println!("{} = {}", key, value);
                }
                ConfigCommand::List => {
                    let prefs = tracker.preferences();
                    println!("effective: focus {}m, autosave {}s, trend {} days",
                        prefs.focus_minutes, prefs.autosave_interval_secs, prefs.trend_window_days);
                    for (key, value) in tracker.settings.all() {
                        println!("{} = {}", key, value);
                    }
                }
            }
            Ok(())
        }
    }
}

/// Set a flag on Ctrl-C instead of letting the signal kill the process
fn watch_interrupt() -> io::Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("daytrack-interrupt".to_string())
        .spawn(move || {
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                flag.store(true, Ordering::SeqCst);
            }
        })?;

    Ok(interrupted)
}

/// Drive the focus timer with a 1-second cooperative tick until it completes
/// or the user presses Ctrl-C
fn run_focus(tracker: &mut Tracker, minutes: u32, task: Option<TaskId>) -> Result<()> {
    let title = match task {
        Some(id) => tracker.tasks.get(id)?.title,
        None => "unbound session".to_string(),
    };

    let interrupted = watch_interrupt()?;
    let autosave = tracker.start_autosave()?;
    println!("Focusing on {} for {} (Ctrl-C stops and logs the time)", title, format_minutes(minutes));

    let tick_rate = ticker::tick_duration();
    let session = tracker.run_focus(
        minutes,
        task,
        &interrupted,
        || std::thread::sleep(tick_rate),
        |remaining| {
            print!("\r{} remaining ", ticker::format_countdown(remaining));
            let _ = io::stdout().flush();
        },
    );
    println!();

    // The final flush runs even when the session commit failed
    let saved = autosave.shutdown();
    let outcome = session?;
    saved?;

    if let Some(outcome) = outcome {
        match &outcome.log {
            Some(log) => println!(
                "Session complete: logged {} to task #{}",
                format_minutes(log.whole_minutes()),
                log.task_id
            ),
            None => println!(
                "Session complete: {}",
                format_minutes((outcome.elapsed.num_seconds() / 60) as u32)
            ),
        }
    }
    Ok(())
}
