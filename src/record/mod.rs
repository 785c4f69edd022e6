pub mod category;
pub mod status;
pub mod types;

pub use category::{Attribute, Category};
pub use status::{ImprovementState, ImprovementStatus};
pub use types::{
    discretization_distance, parse_date, PerformanceRecord, RecordInput, RecordKind, RecordRow,
    DATE_FORMAT,
};
