pub mod config;
pub mod engine;
pub mod legacy;
pub mod validation;
pub mod weight;

pub use config::EngineConfig;
pub use engine::{
    Contribution, GradeBreakdown, GradeEngine, GradeResult, SchoolYear, SHORT_TESTS, WRITTEN,
};
pub use legacy::{direct_formula, simple_formula};
pub use validation::validate_config;
pub use weight::Weight;
