use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use serde::Deserialize;

use crate::error::VisualizationError;
use crate::pipeline::traits::BatchSource;
use crate::types::{Batch, Reference};

const MANIFEST_FILE: &str = "manifest.json";
const FEATURES_TENSOR: &str = "features";
const TEST_DATA_TYPE: &str = "test";

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// Safetensors file relative to the manifest directory.
    pub features: PathBuf,
    #[serde(default)]
    pub labels: Option<Vec<u32>>,
    #[serde(default)]
    pub transcript: Option<String>,
}

#[derive(Debug, Clone)]
struct Utterance {
    name: String,
    /// `[frames, feature_dim]`.
    features: Tensor,
    reference: Reference,
    y_len: usize,
}

/// Evaluation split described by `<data_path>/<data_type>/manifest.json`.
///
/// Cycles forever in manifest order; the batch that reaches the end of the
/// manifest is flagged as completing the epoch.
#[derive(Debug)]
pub struct ManifestDataset {
    utterances: Vec<Utterance>,
    batch_size: usize,
    cursor: usize,
    is_test: bool,
}

impl ManifestDataset {
    pub fn open(
        data_path: &Path,
        data_type: &str,
        expected_input_size: Option<usize>,
        batch_size: usize,
    ) -> Result<Self, VisualizationError> {
        let split_dir = data_path.join(data_type);
        let manifest_path = split_dir.join(MANIFEST_FILE);
        let data = std::fs::read_to_string(&manifest_path)
            .map_err(|e| VisualizationError::io("read dataset manifest", e))?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&data)
            .map_err(|e| VisualizationError::json("parse dataset manifest", e))?;
        if entries.is_empty() {
            return Err(VisualizationError::invalid_input(format!(
                "manifest '{}' lists no utterances",
                manifest_path.display()
            )));
        }

        let is_test = data_type == TEST_DATA_TYPE;
        let utterances = entries
            .into_iter()
            .map(|entry| load_utterance(&split_dir, entry, is_test, expected_input_size))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            path = %manifest_path.display(),
            utterances = utterances.len(),
            is_test,
            "evaluation manifest loaded"
        );

        Ok(Self {
            utterances,
            batch_size: batch_size.max(1),
            cursor: 0,
            is_test,
        })
    }

    pub fn num_utterances(&self) -> usize {
        self.utterances.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Location of the vocabulary file for a label type.
pub fn vocab_path(data_path: &Path, label_type: &str) -> PathBuf {
    data_path.join("vocab").join(format!("{label_type}.txt"))
}

fn load_utterance(
    split_dir: &Path,
    entry: ManifestEntry,
    is_test: bool,
    expected_input_size: Option<usize>,
) -> Result<Utterance, VisualizationError> {
    let (reference, y_len) = if is_test {
        let transcript = entry.transcript.ok_or_else(|| {
            VisualizationError::invalid_input(format!(
                "test utterance '{}' has no transcript",
                entry.name
            ))
        })?;
        (Reference::Raw(transcript), 1)
    } else {
        let labels = entry.labels.ok_or_else(|| {
            VisualizationError::invalid_input(format!("utterance '{}' has no labels", entry.name))
        })?;
        let y_len = labels.len();
        (Reference::Indices(labels), y_len)
    };

    let features_path = split_dir.join(&entry.features);
    let mut tensors = candle_core::safetensors::load(&features_path, &Device::Cpu)
        .map_err(|e| VisualizationError::tensor("load features", e))?;
    let features = tensors
        .remove(FEATURES_TENSOR)
        .ok_or_else(|| {
            VisualizationError::invalid_input(format!(
                "'{}' has no `{FEATURES_TENSOR}` tensor",
                features_path.display()
            ))
        })?
        .to_dtype(DType::F32)
        .map_err(|e| VisualizationError::tensor("convert features", e))?;
    let (_, feature_dim) = features
        .dims2()
        .map_err(|e| VisualizationError::tensor("features dims2", e))?;
    if let Some(expected) = expected_input_size {
        if feature_dim != expected {
            return Err(VisualizationError::invalid_input(format!(
                "utterance '{}' has {feature_dim}-dim features, model expects {expected}",
                entry.name
            )));
        }
    }

    Ok(Utterance {
        name: entry.name,
        features,
        reference,
        y_len,
    })
}

impl BatchSource for ManifestDataset {
    fn next_batch(&mut self) -> Result<(Batch, bool), VisualizationError> {
        let total = self.utterances.len();
        let end = (self.cursor + self.batch_size).min(total);
        let utterances = &self.utterances[self.cursor..end];

        let x_lens = utterances
            .iter()
            .map(|u| u.features.dim(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VisualizationError::tensor("features frame count", e))?;
        let max_frames = x_lens.iter().copied().max().unwrap_or(0);
        let padded = utterances
            .iter()
            .zip(&x_lens)
            .map(|(u, &frames)| u.features.pad_with_zeros(0, 0, max_frames - frames))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VisualizationError::tensor("pad features", e))?;
        let xs = Tensor::stack(&padded, 0)
            .map_err(|e| VisualizationError::tensor("stack features", e))?;

        let batch = Batch {
            xs,
            x_lens,
            ys: utterances.iter().map(|u| u.reference.clone()).collect(),
            y_lens: utterances.iter().map(|u| u.y_len).collect(),
            input_names: utterances.iter().map(|u| u.name.clone()).collect(),
        };

        let is_new_epoch = end == total;
        self.cursor = if is_new_epoch { 0 } else { end };
        Ok((batch, is_new_epoch))
    }

    fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    fn is_test(&self) -> bool {
        self.is_test
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn write_split(name: &str, data_type: &str, manifest: &str, frames: &[usize]) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "attention_viz_dataset_{name}_{}",
            std::process::id()
        ));
        let split_dir = root.join(data_type);
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&split_dir).expect("create split dir");
        for (i, &n) in frames.iter().enumerate() {
            let features = Tensor::ones((n, 3), DType::F32, &Device::Cpu).expect("features");
            let tensors = HashMap::from([(FEATURES_TENSOR.to_string(), features)]);
            candle_core::safetensors::save(&tensors, split_dir.join(format!("u{i}.safetensors")))
                .expect("save features");
        }
        std::fs::write(split_dir.join(MANIFEST_FILE), manifest).expect("write manifest");
        root
    }

    const TRAIN_MANIFEST: &str = r#"[
        {"name": "u0", "features": "u0.safetensors", "labels": [1, 2, 3]},
        {"name": "u1", "features": "u1.safetensors", "labels": [4]},
        {"name": "u2", "features": "u2.safetensors", "labels": [5, 6]}
    ]"#;

    #[test]
    fn batches_are_padded_and_flag_the_epoch_end() {
        let root = write_split("epoch", "dev", TRAIN_MANIFEST, &[4, 6, 2]);
        let mut dataset = ManifestDataset::open(&root, "dev", Some(3), 2).expect("open");
        assert!(!dataset.is_test());

        let (batch, is_new_epoch) = dataset.next_batch().expect("first batch");
        assert!(!is_new_epoch);
        assert_eq!(batch.input_names, vec!["u0", "u1"]);
        assert_eq!(batch.x_lens, vec![4, 6]);
        assert_eq!(batch.xs.dims(), &[2, 6, 3]);
        assert_eq!(batch.ys[0], Reference::Indices(vec![1, 2, 3]));
        assert_eq!(batch.y_lens, vec![3, 1]);
        batch.validate().expect("valid batch");

        let (batch, is_new_epoch) = dataset.next_batch().expect("second batch");
        assert!(is_new_epoch);
        assert_eq!(batch.input_names, vec!["u2"]);

        let (batch, _) = dataset.next_batch().expect("wraps around");
        assert_eq!(batch.input_names, vec!["u0", "u1"]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn padding_frames_are_zero() {
        let root = write_split("padding", "dev", TRAIN_MANIFEST, &[1, 3, 2]);
        let mut dataset = ManifestDataset::open(&root, "dev", None, 2).expect("open");
        let (batch, _) = dataset.next_batch().expect("batch");
        let first: Vec<Vec<f32>> = batch.xs.get(0).unwrap().to_vec2().unwrap();
        assert_eq!(first[0], vec![1.0; 3]);
        assert_eq!(first[2], vec![0.0; 3]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_split_uses_raw_transcripts() {
        let manifest = r#"[{"name": "fdhc0_si1559", "features": "u0.safetensors", "transcript": "the cat sat"}]"#;
        let root = write_split("test_split", "test", manifest, &[5]);
        let mut dataset = ManifestDataset::open(&root, "test", None, 4).expect("open");
        assert!(dataset.is_test());
        let (batch, is_new_epoch) = dataset.next_batch().expect("batch");
        assert!(is_new_epoch);
        assert_eq!(batch.ys[0], Reference::Raw("the cat sat".to_string()));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn feature_dim_mismatch_fails() {
        let root = write_split("dim", "dev", TRAIN_MANIFEST, &[2, 2, 2]);
        let result = ManifestDataset::open(&root, "dev", Some(123), 1);
        assert!(matches!(result, Err(VisualizationError::InvalidInput { .. })));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn set_batch_size_changes_batching() {
        let root = write_split("resize", "dev", TRAIN_MANIFEST, &[2, 2, 2]);
        let mut dataset = ManifestDataset::open(&root, "dev", None, 1).expect("open");
        dataset.set_batch_size(3);
        let (batch, is_new_epoch) = dataset.next_batch().expect("batch");
        assert_eq!(batch.len(), 3);
        assert!(is_new_epoch);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn vocab_path_follows_label_type() {
        assert_eq!(
            vocab_path(Path::new("/data/timit"), "phone61"),
            PathBuf::from("/data/timit/vocab/phone61.txt")
        );
    }
}
