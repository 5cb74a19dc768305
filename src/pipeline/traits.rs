use std::path::{Path, PathBuf};

use candle_core::Tensor;

use crate::error::VisualizationError;
use crate::types::{Batch, DecodeResult};

pub trait LabelMapper {
    /// One symbol per emitted index. Mappers that know an end marker stop there.
    fn decode_list(&self, indices: &[u32]) -> Result<Vec<String>, VisualizationError>;

    fn decode(&self, indices: &[u32]) -> Result<String, VisualizationError> {
        Ok(self.decode_list(indices)?.join(" "))
    }
}

pub trait Decoder {
    fn decode(
        &mut self,
        xs: &Tensor,
        x_lens: &[usize],
        max_decode_len: usize,
    ) -> Result<DecodeResult, VisualizationError>;
}

pub trait BatchSource {
    /// Returns the next batch and whether it completes the current epoch.
    fn next_batch(&mut self) -> Result<(Batch, bool), VisualizationError>;

    fn set_batch_size(&mut self, batch_size: usize);

    fn is_test(&self) -> bool;
}

pub struct RenderRequest<'a> {
    pub attention: &'a [Vec<f32>],
    pub labels: &'a [String],
    pub reference: &'a str,
    /// `[frames][channels]` slice of the raw input features.
    pub spectrogram: &'a [Vec<f32>],
    pub path: &'a Path,
}

pub trait ArtifactRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<(), VisualizationError>;
}

pub trait OutputLocation {
    /// Leaves the location existing and empty. Called once per run.
    fn prepare(&self) -> Result<(), VisualizationError>;

    fn artifact_path(&self, input_name: &str) -> PathBuf;
}
