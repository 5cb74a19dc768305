use std::path::Path;

use crate::alignment::{apply_permutation, build_record, row_sum_violations, spectrogram_slice};
use crate::config::VisualizationConfig;
use crate::error::VisualizationError;
use crate::pipeline::traits::{
    ArtifactRenderer, BatchSource, Decoder, LabelMapper, OutputLocation, RenderRequest,
};
use crate::types::{Batch, RunSummary};

pub type ArtifactCallback = Box<dyn Fn(&str, &Path)>;

/// Progress of one visualization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// The batch that completes the epoch is being processed.
    Draining,
    Done,
}

impl RunState {
    fn on_batch(self, is_new_epoch: bool) -> Self {
        match (self, is_new_epoch) {
            (Self::Running, true) => Self::Draining,
            (state, _) => state,
        }
    }

    fn after_batch(self) -> Self {
        match self {
            Self::Draining => Self::Done,
            state => state,
        }
    }
}

pub struct AlignmentPipeline {
    config: VisualizationConfig,
    label_mapper: Box<dyn LabelMapper>,
    renderer: Box<dyn ArtifactRenderer>,
    output: Box<dyn OutputLocation>,
    on_artifact: Option<ArtifactCallback>,
}

pub(crate) struct AlignmentPipelineParts {
    pub config: VisualizationConfig,
    pub label_mapper: Box<dyn LabelMapper>,
    pub renderer: Box<dyn ArtifactRenderer>,
    pub output: Box<dyn OutputLocation>,
    pub on_artifact: Option<ArtifactCallback>,
}

impl AlignmentPipeline {
    pub(crate) fn from_parts(parts: AlignmentPipelineParts) -> Self {
        Self {
            config: parts.config,
            label_mapper: parts.label_mapper,
            renderer: parts.renderer,
            output: parts.output,
            on_artifact: parts.on_artifact,
        }
    }

    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    /// Visualizes exactly one epoch of `source`.
    pub fn run(
        &self,
        source: &mut dyn BatchSource,
        decoder: &mut dyn Decoder,
    ) -> Result<RunSummary, VisualizationError> {
        if let Some(batch_size) = self.config.eval_batch_size {
            source.set_batch_size(batch_size);
        }
        self.output.prepare()?;
        let is_test = source.is_test();
        tracing::info!(
            is_test,
            max_decode_len = self.config.max_decode_len,
            "attention visualization started"
        );

        let mut summary = RunSummary::default();
        let mut state = RunState::Running;
        while state != RunState::Done {
            let (batch, is_new_epoch) = source.next_batch()?;
            state = state.on_batch(is_new_epoch);
            self.process_batch(&batch, is_test, decoder, &mut summary)?;
            summary.batches += 1;
            state = state.after_batch();
        }

        tracing::info!(
            batches = summary.batches,
            samples = summary.samples,
            row_sum_warnings = summary.row_sum_warnings,
            "attention visualization finished"
        );
        Ok(summary)
    }

    /// Decodes one batch and renders every sample in it.
    pub fn process_batch(
        &self,
        batch: &Batch,
        is_test: bool,
        decoder: &mut dyn Decoder,
        summary: &mut RunSummary,
    ) -> Result<(), VisualizationError> {
        batch.validate()?;
        batch.check_reference_kind(is_test)?;
        let decoded = decoder.decode(&batch.xs, &batch.x_lens, self.config.max_decode_len)?;
        decoded.validate(batch.len())?;

        // Everything per-sample is re-paired into decoder order.
        let perm_idx = &decoded.perm_idx;
        let ys = apply_permutation(&batch.ys, perm_idx)?;
        let y_lens = apply_permutation(&batch.y_lens, perm_idx)?;
        let x_lens = apply_permutation(&batch.x_lens, perm_idx)?;
        let input_names = apply_permutation(&batch.input_names, perm_idx)?;

        for (b, input_name) in input_names.iter().enumerate() {
            let record = build_record(
                b,
                &decoded.best_hyps,
                &decoded.attention_weights,
                &ys,
                &y_lens,
                &x_lens,
                self.label_mapper.as_ref(),
            )?;

            for violation in row_sum_violations(&record.attention, self.config.row_sum_tolerance) {
                tracing::warn!(
                    input_name = input_name.as_str(),
                    row = violation.row,
                    sum = violation.sum,
                    "attention row does not sum to 1"
                );
                summary.row_sum_warnings += 1;
            }

            let spectrogram =
                spectrogram_slice(&batch.xs, perm_idx[b], self.config.spectrogram_channels)?;
            let path = self.output.artifact_path(input_name);
            self.renderer.render(&RenderRequest {
                attention: &record.attention,
                labels: &record.symbols,
                reference: &record.reference,
                spectrogram: &spectrogram,
                path: &path,
            })?;
            tracing::debug!(
                input_name = input_name.as_str(),
                rows = record.num_rows(),
                cols = record.num_cols(),
                path = %path.display(),
                "attention alignment rendered"
            );

            if let Some(on_artifact) = &self.on_artifact {
                on_artifact(input_name, &path);
            }
            summary.samples += 1;
            summary.artifacts.push(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_without_epoch_flag_keeps_running() {
        let state = RunState::Running.on_batch(false).after_batch();
        assert_eq!(state, RunState::Running);
    }

    #[test]
    fn run_state_epoch_flag_drains_then_finishes() {
        let state = RunState::Running.on_batch(true);
        assert_eq!(state, RunState::Draining);
        assert_eq!(state.after_batch(), RunState::Done);
    }
}
