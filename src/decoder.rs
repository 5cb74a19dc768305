use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};

use crate::error::VisualizationError;
use crate::pipeline::traits::Decoder;
use crate::types::DecodeResult;

const EXPORT_DIR: &str = "attention";

/// Decoder outputs exported for one utterance.
#[derive(Debug, Clone)]
pub struct ExportedDecode {
    pub hyp: Vec<u32>,
    /// `[steps, frames]`.
    pub attention: Tensor,
}

/// Replays decoder outputs exported by the training toolkit.
///
/// Utterances are consumed in dataset order, so the export has to be written
/// from the same manifest the batches come from. Each entry is replayed once;
/// asking for more utterances than the export holds is an error. Like the recurrent decoder
/// it stands in for, it processes each batch sorted by descending input
/// length and reports that order through `perm_idx`.
#[derive(Debug)]
pub struct ReplayDecoder {
    entries: Vec<ExportedDecode>,
    cursor: usize,
}

impl ReplayDecoder {
    pub fn new(entries: Vec<ExportedDecode>) -> Result<Self, VisualizationError> {
        if entries.is_empty() {
            return Err(VisualizationError::invalid_input(
                "decoder export holds no utterances",
            ));
        }
        Ok(Self { entries, cursor: 0 })
    }

    /// Loads `hyp.<i>` / `attention.<i>` pairs, `i = 0, 1, ...`.
    pub fn load(path: &Path) -> Result<Self, VisualizationError> {
        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)
            .map_err(|e| VisualizationError::tensor("load decoder export", e))?;
        let mut entries = Vec::new();
        while let Some(hyp) = tensors.remove(&format!("hyp.{}", entries.len())) {
            let index = entries.len();
            let attention = tensors.remove(&format!("attention.{index}")).ok_or_else(|| {
                VisualizationError::invalid_input(format!(
                    "decoder export has hyp.{index} but no attention.{index}"
                ))
            })?;
            let hyp = hyp
                .to_dtype(DType::U32)
                .and_then(|t| t.to_vec1::<u32>())
                .map_err(|e| VisualizationError::tensor("read exported hypothesis", e))?;
            let attention = attention
                .to_dtype(DType::F32)
                .map_err(|e| VisualizationError::tensor("read exported attention", e))?;
            attention
                .dims2()
                .map_err(|e| VisualizationError::tensor("exported attention dims2", e))?;
            entries.push(ExportedDecode { hyp, attention });
        }
        tracing::info!(
            path = %path.display(),
            utterances = entries.len(),
            "decoder export loaded"
        );
        Self::new(entries)
    }

    /// Fails unless the export holds exactly one entry per utterance of the
    /// dataset it will be replayed against.
    pub fn ensure_matches(&self, num_utterances: usize) -> Result<(), VisualizationError> {
        if self.entries.len() != num_utterances {
            return Err(VisualizationError::invalid_input(format!(
                "decoder export holds {} utterances but the dataset has {num_utterances}",
                self.entries.len()
            )));
        }
        Ok(())
    }

    fn next_entry(&mut self) -> Result<ExportedDecode, VisualizationError> {
        let entry = self.entries.get(self.cursor).cloned().ok_or_else(|| {
            VisualizationError::invalid_input(format!(
                "decoder export exhausted after {} utterances",
                self.entries.len()
            ))
        })?;
        self.cursor += 1;
        Ok(entry)
    }
}

/// Export file for `epoch`; a negative epoch selects the latest export.
pub fn resolve_export_path(model_path: &Path, epoch: i64) -> Result<PathBuf, VisualizationError> {
    let export_dir = model_path.join(EXPORT_DIR);
    if epoch >= 0 {
        let path = export_dir.join(format!("epoch-{epoch}.safetensors"));
        if !path.is_file() {
            return Err(VisualizationError::invalid_input(format!(
                "no decoder export for epoch {epoch} at '{}'",
                path.display()
            )));
        }
        return Ok(path);
    }

    let latest = std::fs::read_dir(&export_dir)
        .map_err(|e| VisualizationError::io("list decoder exports", e))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let epoch = name
                .strip_prefix("epoch-")?
                .strip_suffix(".safetensors")?
                .parse::<u64>()
                .ok()?;
            Some((epoch, entry.path()))
        })
        .max_by_key(|(epoch, _)| *epoch);
    match latest {
        Some((epoch, path)) => {
            tracing::info!(epoch, "restoring latest decoder export");
            Ok(path)
        }
        None => Err(VisualizationError::invalid_input(format!(
            "no decoder exports under '{}'",
            export_dir.display()
        ))),
    }
}

impl Decoder for ReplayDecoder {
    fn decode(
        &mut self,
        xs: &Tensor,
        x_lens: &[usize],
        max_decode_len: usize,
    ) -> Result<DecodeResult, VisualizationError> {
        let (batch_size, max_frames, _) = xs
            .dims3()
            .map_err(|e| VisualizationError::tensor("decoder input dims3", e))?;
        if x_lens.len() != batch_size {
            return Err(VisualizationError::invalid_input(format!(
                "{} input lengths for a batch of {batch_size}",
                x_lens.len()
            )));
        }

        let batch_entries = (0..batch_size)
            .map(|_| self.next_entry())
            .collect::<Result<Vec<_>, _>>()?;

        let mut perm_idx: Vec<usize> = (0..batch_size).collect();
        perm_idx.sort_by(|&a, &b| x_lens[b].cmp(&x_lens[a]));

        let capped = perm_idx
            .iter()
            .map(|&i| {
                let attention = &batch_entries[i].attention;
                let (steps, frames) = attention.dims2()?;
                attention
                    .narrow(0, 0, steps.min(max_decode_len))?
                    .narrow(1, 0, frames.min(max_frames))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VisualizationError::tensor("cap exported attention", e))?;
        let max_steps = capped
            .iter()
            .map(|t| t.dim(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VisualizationError::tensor("attention steps", e))?
            .into_iter()
            .max()
            .unwrap_or(0);

        let stacked = if capped.is_empty() {
            Tensor::zeros((0, max_steps, max_frames), DType::F32, &Device::Cpu)
        } else {
            capped
                .iter()
                .map(|t| {
                    let (steps, frames) = t.dims2()?;
                    t.pad_with_zeros(0, 0, max_steps - steps)?
                        .pad_with_zeros(1, 0, max_frames - frames)
                })
                .collect::<Result<Vec<_>, _>>()
                .and_then(|padded| Tensor::stack(&padded, 0))
        };
        let attention_weights =
            stacked.map_err(|e| VisualizationError::tensor("stack attention weights", e))?;

        let best_hyps = perm_idx
            .iter()
            .map(|&i| {
                let hyp = &batch_entries[i].hyp;
                hyp[..hyp.len().min(max_decode_len)].to_vec()
            })
            .collect();

        Ok(DecodeResult {
            best_hyps,
            attention_weights,
            perm_idx,
        })
    }
}
