use candle_core::{DType, Tensor};

use crate::error::VisualizationError;

/// Cuts the padded `[steps, frames]` attention of sample `b` down to
/// `[rows, cols]`: rows past the emitted symbols are decode-buffer padding,
/// columns past the valid frame count are input padding.
pub fn truncate_attention(
    attention_weights: &Tensor,
    b: usize,
    rows: usize,
    cols: usize,
) -> Result<Vec<Vec<f32>>, VisualizationError> {
    let (_, steps, frames) = attention_weights
        .dims3()
        .map_err(|e| VisualizationError::tensor("attention weights dims3", e))?;
    if rows > steps {
        return Err(VisualizationError::invalid_input(format!(
            "sample {b}: {rows} decoded symbols but only {steps} attention steps"
        )));
    }
    if cols > frames {
        return Err(VisualizationError::invalid_input(format!(
            "sample {b}: x_len {cols} exceeds {frames} attention frames"
        )));
    }
    attention_weights
        .get(b)
        .and_then(|t| t.narrow(0, 0, rows))
        .and_then(|t| t.narrow(1, 0, cols))
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.to_vec2::<f32>())
        .map_err(|e| VisualizationError::tensor("truncate attention", e))
}

/// First `channels` feature channels of sample `b`, all (padded) frames.
pub fn spectrogram_slice(
    xs: &Tensor,
    b: usize,
    channels: usize,
) -> Result<Vec<Vec<f32>>, VisualizationError> {
    let (_, _, feature_dim) = xs
        .dims3()
        .map_err(|e| VisualizationError::tensor("batch xs dims3", e))?;
    xs.get(b)
        .and_then(|t| t.narrow(1, 0, channels.min(feature_dim)))
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.to_vec2::<f32>())
        .map_err(|e| VisualizationError::tensor("slice spectrogram", e))
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    fn ramp(shape: (usize, usize, usize)) -> Tensor {
        let n = shape.0 * shape.1 * shape.2;
        let data: Vec<f32> = (0..n).map(|i| i as f32).collect();
        Tensor::from_vec(data, shape, &Device::Cpu).unwrap()
    }

    #[test]
    fn truncates_rows_and_columns() {
        let aw = ramp((2, 5, 6));
        let matrix = truncate_attention(&aw, 1, 3, 4).unwrap();
        assert_eq!(matrix.len(), 3);
        assert!(matrix.iter().all(|row| row.len() == 4));
        // sample 1 starts at 30; row 2 starts at 30 + 12
        assert_eq!(matrix[0], vec![30.0, 31.0, 32.0, 33.0]);
        assert_eq!(matrix[2], vec![42.0, 43.0, 44.0, 45.0]);
    }

    #[test]
    fn full_size_truncation_is_identity() {
        let aw = ramp((1, 2, 3));
        let matrix = truncate_attention(&aw, 0, 2, 3).unwrap();
        assert_eq!(matrix, vec![vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]]);
    }

    #[test]
    fn more_symbols_than_steps_fails() {
        let aw = ramp((1, 2, 3));
        assert!(truncate_attention(&aw, 0, 3, 3).is_err());
    }

    #[test]
    fn x_len_beyond_frames_fails() {
        let aw = ramp((1, 2, 3));
        assert!(truncate_attention(&aw, 0, 2, 4).is_err());
    }

    #[test]
    fn spectrogram_keeps_all_frames_and_caps_channels() {
        let xs = ramp((2, 4, 50));
        let slice = spectrogram_slice(&xs, 0, 40).unwrap();
        assert_eq!(slice.len(), 4);
        assert!(slice.iter().all(|frame| frame.len() == 40));
        assert_eq!(slice[1][0], 50.0);
    }

    #[test]
    fn spectrogram_with_narrow_features_uses_all_channels() {
        let xs = ramp((1, 3, 8));
        let slice = spectrogram_slice(&xs, 0, 40).unwrap();
        assert!(slice.iter().all(|frame| frame.len() == 8));
    }
}
