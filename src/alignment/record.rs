use candle_core::Tensor;

use crate::alignment::reference::resolve_reference;
use crate::alignment::truncation::truncate_attention;
use crate::error::VisualizationError;
use crate::pipeline::traits::LabelMapper;
use crate::types::{AlignmentRecord, Reference};

/// Builds the record of sample `b`. `ys`, `y_lens` and `x_lens` must already
/// be in decoder order (see [`apply_permutation`](super::apply_permutation)).
pub fn build_record(
    b: usize,
    best_hyps: &[Vec<u32>],
    attention_weights: &Tensor,
    ys: &[Reference],
    y_lens: &[usize],
    x_lens: &[usize],
    mapper: &dyn LabelMapper,
) -> Result<AlignmentRecord, VisualizationError> {
    let (hyp, reference, &y_len, &x_len) = match (
        best_hyps.get(b),
        ys.get(b),
        y_lens.get(b),
        x_lens.get(b),
    ) {
        (Some(hyp), Some(reference), Some(y_len), Some(x_len)) => (hyp, reference, y_len, x_len),
        _ => {
            return Err(VisualizationError::invalid_input(format!(
                "sample {b} is out of range for the decoded batch"
            )))
        }
    };

    let reference = resolve_reference(reference, y_len, mapper)?;
    let symbols = mapper.decode_list(hyp)?;
    let attention = truncate_attention(attention_weights, b, symbols.len(), x_len)?;

    Ok(AlignmentRecord {
        attention,
        symbols,
        reference,
    })
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    /// Maps index `i` to `p{i}` and stops at index 0.
    struct EosAtZero;

    impl LabelMapper for EosAtZero {
        fn decode_list(&self, indices: &[u32]) -> Result<Vec<String>, VisualizationError> {
            Ok(indices
                .iter()
                .take_while(|&&i| i != 0)
                .map(|i| format!("p{i}"))
                .collect())
        }
    }

    #[test]
    fn record_dims_follow_symbols_and_x_len() {
        let aw = Tensor::ones((2, 6, 10), candle_core::DType::F32, &Device::Cpu).unwrap();
        let best_hyps = vec![vec![3, 4, 5, 0, 0, 0], vec![7, 0, 0, 0, 0, 0]];
        let ys = vec![Reference::Indices(vec![3, 4]), Reference::Raw("x".into())];
        let record = build_record(1, &best_hyps, &aw, &ys, &[2, 1], &[10, 4], &EosAtZero).unwrap();

        assert_eq!(record.symbols, vec!["p7"]);
        assert_eq!(record.num_rows(), 1);
        assert_eq!(record.num_cols(), 4);
        assert_eq!(record.reference, "x");

        let record = build_record(0, &best_hyps, &aw, &ys, &[2, 1], &[10, 4], &EosAtZero).unwrap();
        assert_eq!(record.num_rows(), 3);
        assert_eq!(record.num_cols(), 10);
        assert_eq!(record.reference, "p3 p4");
    }

    #[test]
    fn out_of_range_sample_fails() {
        let aw = Tensor::ones((1, 2, 2), candle_core::DType::F32, &Device::Cpu).unwrap();
        let result = build_record(
            1,
            &[vec![1]],
            &aw,
            &[Reference::Raw("a".into())],
            &[1],
            &[2],
            &EosAtZero,
        );
        assert!(result.is_err());
    }
}
