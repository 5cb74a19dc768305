use crate::error::VisualizationError;
use crate::pipeline::traits::LabelMapper;
use crate::types::Reference;

/// Turns a reference into the caption string shown under the alignment.
///
/// Raw transcripts are returned verbatim. Index references are cut to
/// `y_len` labels and decoded through `mapper`.
pub fn resolve_reference(
    reference: &Reference,
    y_len: usize,
    mapper: &dyn LabelMapper,
) -> Result<String, VisualizationError> {
    match reference {
        Reference::Raw(transcript) => Ok(transcript.clone()),
        Reference::Indices(labels) => {
            let valid = labels.get(..y_len).ok_or_else(|| {
                VisualizationError::invalid_input(format!(
                    "y_len {y_len} exceeds the {} reference labels",
                    labels.len()
                ))
            })?;
            mapper.decode(valid)
        }
    }
}
