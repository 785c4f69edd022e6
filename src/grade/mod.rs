pub mod scale;
pub mod value;

pub use scale::GradeScale;
pub use value::{round_half_worse, GradeValue, RoundingMode};
