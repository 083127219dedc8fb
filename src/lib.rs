//! Daily task tracking core: task, time log and settings stores over one
//! persisted database, a focus timer, productivity analytics, reports and
//! CSV export.

pub mod app;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod report;
pub mod store;
pub mod ticker;
pub mod timer;
