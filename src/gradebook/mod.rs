pub mod storage;
pub mod types;

pub use storage::{build_engine, load_records, save_export};
pub use types::GradeExport;
