pub mod config;
pub mod error;
pub mod grade;
pub mod gradebook;
pub mod limits;
pub mod logging;
pub mod output;
pub mod record;
pub mod scoring;

pub use error::{GradeError, Result};
pub use grade::{GradeScale, GradeValue};
pub use record::{Category, PerformanceRecord, RecordInput};
pub use scoring::{EngineConfig, GradeEngine, GradeResult};
