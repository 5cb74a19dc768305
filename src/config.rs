use std::path::{Path, PathBuf};

use crate::error::VisualizationError;

#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    pub save_dir: PathBuf,
    pub vocab_path: PathBuf,
    pub max_decode_len: usize,
    /// Overrides the batch size of the source before iteration starts.
    pub eval_batch_size: Option<usize>,
    pub spectrogram_channels: usize,
    /// Allowed distance of an attention row sum from 1 before it is reported.
    pub row_sum_tolerance: f32,
    pub image_suffix: String,
    pub eos_symbol: Option<String>,
}

impl VisualizationConfig {
    pub const DEFAULT_MAX_DECODE_LEN: usize = 40;
    pub const DEFAULT_SPECTROGRAM_CHANNELS: usize = 40;
    pub const DEFAULT_ROW_SUM_TOLERANCE: f32 = 1e-3;
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("att_weights"),
            vocab_path: PathBuf::new(),
            max_decode_len: Self::DEFAULT_MAX_DECODE_LEN,
            eval_batch_size: Some(1),
            spectrogram_channels: Self::DEFAULT_SPECTROGRAM_CHANNELS,
            row_sum_tolerance: Self::DEFAULT_ROW_SUM_TOLERANCE,
            image_suffix: "png".to_string(),
            eos_symbol: Some("<eos>".to_string()),
        }
    }
}

/// Front-end settings the model was trained with, read from `config.json`
/// in the model directory.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ModelConfig {
    pub label_type: String,
    pub input_freq: usize,
    #[serde(default)]
    pub use_delta: bool,
    #[serde(default)]
    pub use_double_delta: bool,
    #[serde(default = "default_one")]
    pub splice: usize,
    #[serde(default = "default_one")]
    pub num_stack: usize,
    #[serde(default = "default_one")]
    pub num_skip: usize,
}

fn default_one() -> usize {
    1
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self, VisualizationError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| VisualizationError::io("read config.json", e))?;
        serde_json::from_str(&data).map_err(|e| VisualizationError::json("parse config.json", e))
    }

    /// Feature dimension of one input frame after delta, splicing and stacking.
    pub fn input_size(&self) -> usize {
        let mut per_frame = self.input_freq;
        if self.use_delta {
            per_frame += self.input_freq;
        }
        if self.use_double_delta {
            per_frame += self.input_freq;
        }
        per_frame * self.splice.max(1) * self.num_stack.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visualization_config_default() {
        let config = VisualizationConfig::default();
        assert_eq!(config.max_decode_len, 40);
        assert_eq!(config.eval_batch_size, Some(1));
        assert_eq!(config.spectrogram_channels, 40);
        assert_eq!(config.image_suffix, "png");
        assert_eq!(config.eos_symbol.as_deref(), Some("<eos>"));
        assert!(config.vocab_path.as_os_str().is_empty());
    }

    #[test]
    fn model_config_input_size_with_deltas_and_stacking() {
        let json = r#"{
            "label_type": "phone61",
            "input_freq": 41,
            "use_delta": true,
            "use_double_delta": true,
            "num_stack": 2
        }"#;
        let model_config: ModelConfig = serde_json::from_str(json).expect("valid config json");
        assert_eq!(model_config.splice, 1);
        assert_eq!(model_config.num_skip, 1);
        // 41 * 3 channels * 2 stacked frames
        assert_eq!(model_config.input_size(), 246);
    }

    #[test]
    fn model_config_load_missing_file_fails() {
        let result = ModelConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(VisualizationError::Io { .. })));
    }
}
