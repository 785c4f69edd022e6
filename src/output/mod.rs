pub mod formatter;

pub use formatter::{
    format_cross_check, format_grade, format_record_table, format_result, format_timeline,
    format_tsv, should_use_colors,
};
