pub mod db;
pub mod settings;
pub mod tasks;
pub mod time_logs;

pub use db::Database;
pub use settings::SettingsStore;
pub use tasks::TaskStore;
pub use time_logs::TimeLogStore;
