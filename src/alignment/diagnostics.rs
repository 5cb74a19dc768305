/// Attention row whose sum is not close to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSumViolation {
    pub row: usize,
    pub sum: f32,
}

/// Reports rows of a truncated attention matrix that are not normalized
/// distributions. Rows lose mass here when the decoder attends to padded
/// frames.
pub fn row_sum_violations(attention: &[Vec<f32>], tolerance: f32) -> Vec<RowSumViolation> {
    attention
        .iter()
        .enumerate()
        .filter_map(|(row, weights)| {
            let sum: f32 = weights.iter().sum();
            ((sum - 1.0).abs() > tolerance || !sum.is_finite())
                .then_some(RowSumViolation { row, sum })
        })
        .collect()
}
