use serde::Serialize;

use crate::grade::GradeScale;
use crate::record::RecordRow;
use crate::scoring::{GradeEngine, GradeResult, SchoolYear};

/// Everything known about one grade book, as written by `export`.
#[derive(Debug, Serialize)]
pub struct GradeExport {
    pub version: u32,
    pub subject: Option<String>,
    pub scale: GradeScale,
    pub school_year: Option<SchoolYear>,
    pub records: Vec<RecordRow>,
    pub result: Option<GradeResult>,
    pub timeline: Vec<GradeResult>,
}

impl GradeExport {
    pub fn new(engine: &GradeEngine, result: Option<GradeResult>) -> Self {
        Self {
            version: 1,
            subject: engine.subject().map(|s| s.code.clone()),
            scale: engine.config().scale,
            school_year: engine.school_year(),
            records: engine.to_record_list(),
            result,
            timeline: engine.time_series(),
        }
    }
}
