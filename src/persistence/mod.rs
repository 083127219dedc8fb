pub mod autosave;
pub mod files;

pub use autosave::AutoSaver;
pub use files::{
    atomic_write, database_file, export_file, init_local_data_dir, read_file, report_file,
};
