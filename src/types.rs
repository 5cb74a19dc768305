use std::path::PathBuf;

use candle_core::Tensor;

use crate::error::VisualizationError;

/// Ground-truth transcript of one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Test-set transcript, used verbatim.
    Raw(String),
    /// Label indices, decoded through a [`LabelMapper`](crate::LabelMapper).
    Indices(Vec<u32>),
}

/// One padded unit of evaluation work.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[batch, max_frames, feature_dim]`, zero-padded along frames.
    pub xs: Tensor,
    pub x_lens: Vec<usize>,
    pub ys: Vec<Reference>,
    pub y_lens: Vec<usize>,
    pub input_names: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.input_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_names.is_empty()
    }

    pub fn validate(&self) -> Result<(), VisualizationError> {
        let batch_size = self.len();
        let (xs_batch, max_frames, _) = self
            .xs
            .dims3()
            .map_err(|e| VisualizationError::tensor("batch xs dims3", e))?;
        let lengths = [
            ("xs", xs_batch),
            ("x_lens", self.x_lens.len()),
            ("ys", self.ys.len()),
            ("y_lens", self.y_lens.len()),
        ];
        for (field, len) in lengths {
            if len != batch_size {
                return Err(VisualizationError::invalid_input(format!(
                    "batch field `{field}` has {len} entries, expected {batch_size} (input_names)"
                )));
            }
        }
        if let Some((b, &x_len)) = self
            .x_lens
            .iter()
            .enumerate()
            .find(|(_, x_len)| **x_len > max_frames)
        {
            return Err(VisualizationError::invalid_input(format!(
                "x_lens[{b}] = {x_len} exceeds padded frame count {max_frames}"
            )));
        }
        Ok(())
    }

    /// Test sets carry raw transcripts; every other split carries label indices.
    pub fn check_reference_kind(&self, is_test: bool) -> Result<(), VisualizationError> {
        let mismatch = self.ys.iter().position(|reference| match reference {
            Reference::Raw(_) => !is_test,
            Reference::Indices(_) => is_test,
        });
        match mismatch {
            Some(b) => Err(VisualizationError::invalid_input(format!(
                "sample '{}' carries a {} reference in a {} batch",
                self.input_names.get(b).map_or("?", String::as_str),
                if is_test { "label-index" } else { "raw transcript" },
                if is_test { "test" } else { "non-test" },
            ))),
            None => Ok(()),
        }
    }
}

/// Output of one decoder call, in the decoder's internal sample order.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub best_hyps: Vec<Vec<u32>>,
    /// `[batch, steps, frames]`.
    pub attention_weights: Tensor,
    /// `best_hyps[b]` belongs to input sample `perm_idx[b]`.
    pub perm_idx: Vec<usize>,
}

impl DecodeResult {
    pub fn validate(&self, batch_size: usize) -> Result<(), VisualizationError> {
        if self.perm_idx.len() != batch_size {
            return Err(VisualizationError::invalid_input(format!(
                "decoder returned a permutation of length {} for a batch of {batch_size}",
                self.perm_idx.len()
            )));
        }
        if self.best_hyps.len() != batch_size {
            return Err(VisualizationError::invalid_input(format!(
                "decoder returned {} hypotheses for a batch of {batch_size}",
                self.best_hyps.len()
            )));
        }
        let (aw_batch, _, _) = self
            .attention_weights
            .dims3()
            .map_err(|e| VisualizationError::tensor("attention weights dims3", e))?;
        if aw_batch != batch_size {
            return Err(VisualizationError::invalid_input(format!(
                "decoder returned attention for {aw_batch} samples, expected {batch_size}"
            )));
        }
        Ok(())
    }
}

/// Per-sample view handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    /// Rows are decoded symbols, columns are valid input frames.
    pub attention: Vec<Vec<f32>>,
    pub symbols: Vec<String>,
    pub reference: String,
}

impl AlignmentRecord {
    pub fn num_rows(&self) -> usize {
        self.attention.len()
    }

    pub fn num_cols(&self) -> usize {
        self.attention.first().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub batches: usize,
    pub samples: usize,
    pub artifacts: Vec<PathBuf>,
    /// Attention rows whose sum strayed from 1 beyond the tolerance.
    pub row_sum_warnings: usize,
}
