pub mod export;
pub mod generator;
pub mod stats;

pub use export::{export_csv, import_rows, parse_csv};
pub use generator::generate_report;
pub use stats::Analytics;
