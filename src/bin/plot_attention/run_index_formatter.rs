use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    pub input_name: String,
    pub image: String,
}

impl IndexEntry {
    pub fn new(input_name: &str, image_path: &Path) -> Self {
        Self {
            input_name: input_name.to_string(),
            image: image_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunIndex {
    pub schema_version: u32,
    pub generated_at: String,
    pub model_path: String,
    pub export_path: String,
    pub data_type: String,
    pub is_test: bool,
    pub batches: usize,
    pub row_sum_warnings: usize,
    pub artifacts: Vec<IndexEntry>,
}

pub fn write_index(path: &Path, index: &RunIndex) -> Result<(), String> {
    let mut file = File::create(path)
        .map_err(|err| format!("Failed to create run index '{}': {err}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, index).map_err(|err| {
        format!(
            "Failed to serialize run index JSON '{}': {err}",
            path.display()
        )
    })?;
    file.write_all(b"\n")
        .map_err(|err| format!("Failed to finalize run index '{}': {err}", path.display()))?;
    Ok(())
}
