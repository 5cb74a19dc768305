use std::fs;
use std::path::{Path, PathBuf};

use crate::error::VisualizationError;
use crate::pipeline::traits::OutputLocation;

/// Output directory owned by one run. `prepare` wipes whatever a previous
/// run left there.
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
    root: PathBuf,
    suffix: String,
}

impl DirectoryOutput {
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputLocation for DirectoryOutput {
    fn prepare(&self) -> Result<(), VisualizationError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .map_err(|e| VisualizationError::io("remove previous output directory", e))?;
            tracing::info!(path = %self.root.display(), "removed previous attention plots");
        }
        fs::create_dir_all(&self.root)
            .map_err(|e| VisualizationError::io("create output directory", e))?;

        let metadata = fs::metadata(&self.root)
            .map_err(|e| VisualizationError::io("stat output directory", e))?;
        if !metadata.is_dir() || metadata.permissions().readonly() {
            return Err(VisualizationError::runtime(
                "prepare output directory",
                format!("'{}' is not a writable directory", self.root.display()),
            ));
        }
        Ok(())
    }

    fn artifact_path(&self, input_name: &str) -> PathBuf {
        self.root.join(format!("{input_name}.{}", self.suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("attention_viz_output_{name}_{}", std::process::id()))
    }

    #[test]
    fn prepare_creates_missing_directory() {
        let root = scratch_dir("missing");
        let _ = fs::remove_dir_all(&root);
        let output = DirectoryOutput::new(&root, "png");
        output.prepare().expect("prepare should succeed");
        assert!(root.is_dir());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn prepare_removes_stale_artifacts() {
        let root = scratch_dir("stale");
        fs::create_dir_all(root.join("nested")).expect("create nested");
        fs::write(root.join("old.png"), b"stale").expect("write stale file");
        fs::write(root.join("nested/old.json"), b"{}").expect("write stale nested file");

        let output = DirectoryOutput::new(&root, "png");
        output.prepare().expect("prepare should succeed");
        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).expect("read dir").count(), 0);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn prepare_fails_when_path_is_a_file() {
        let path = scratch_dir("file");
        let _ = fs::remove_dir_all(&path);
        fs::write(&path, b"not a directory").expect("write file");
        let output = DirectoryOutput::new(&path, "png");
        assert!(output.prepare().is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn artifact_path_joins_name_and_suffix() {
        let output = DirectoryOutput::new("/tmp/att_weights", "png");
        assert_eq!(
            output.artifact_path("fdhc0_si1559"),
            PathBuf::from("/tmp/att_weights/fdhc0_si1559.png")
        );
    }
}
