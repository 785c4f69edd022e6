use super::types::GradeExport;
use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::fs;
use std::path::Path;

use crate::record::RecordInput;
use crate::scoring::{EngineConfig, GradeEngine};

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load the records of a grade book file
///
/// `.json` files are read as JSON, everything else as YAML. The file holds a
/// list of records with the fields `category`, `grade`, `date` and the
/// optional `status`, `number`, `from`, `until` and `due`.
pub fn load_records(path: &Path) -> Result<Vec<RecordInput>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read grade book at {}", path.display()))?;

    let records: Vec<RecordInput> = if is_json(path) {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse grade book: invalid JSON in {}", path.display()))?
    } else {
        serde_saphyr::from_str(&content)
            .with_context(|| format!("Failed to parse grade book: invalid YAML in {}", path.display()))?
    };

    tracing::debug!(path = %path.display(), count = records.len(), "grade book loaded");
    Ok(records)
}

/// Create an engine and add `records` in file order
pub fn build_engine(config: EngineConfig, records: &[RecordInput]) -> Result<GradeEngine> {
    let mut engine = GradeEngine::new(config).context("Invalid engine configuration")?;
    for (i, record) in records.iter().enumerate() {
        engine
            .add_record(record)
            .with_context(|| format!("Record {} rejected", i + 1))?;
    }
    Ok(engine)
}

/// Save an export to a JSON file atomically
///
/// Uses atomic-write-file so a failed write never leaves a partial file.
pub fn save_export(path: &Path, export: &GradeExport) -> Result<()> {
    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, export).context("Failed to serialize export")?;

    file.commit()
        .with_context(|| format!("Failed to save export to {}", path.display()))?;

    Ok(())
}
