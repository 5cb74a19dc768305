use crate::error::VisualizationError;

/// Checks that `perm_idx` is a permutation of `0..batch_size`.
pub fn validate_permutation(perm_idx: &[usize], batch_size: usize) -> Result<(), VisualizationError> {
    if perm_idx.len() != batch_size {
        return Err(VisualizationError::invalid_input(format!(
            "permutation has length {}, batch size is {batch_size}",
            perm_idx.len()
        )));
    }
    let mut seen = vec![false; batch_size];
    for (position, &index) in perm_idx.iter().enumerate() {
        if index >= batch_size {
            return Err(VisualizationError::invalid_input(format!(
                "perm_idx[{position}] = {index} is out of range for batch size {batch_size}"
            )));
        }
        if std::mem::replace(&mut seen[index], true) {
            return Err(VisualizationError::invalid_input(format!(
                "perm_idx repeats sample {index}"
            )));
        }
    }
    Ok(())
}

/// Re-pairs batch-ordered `items` with decoder-ordered outputs: element `b`
/// of the result is `items[perm_idx[b]]`.
pub fn apply_permutation<T: Clone>(
    items: &[T],
    perm_idx: &[usize],
) -> Result<Vec<T>, VisualizationError> {
    validate_permutation(perm_idx, items.len())?;
    Ok(perm_idx.iter().map(|&index| items[index].clone()).collect())
}
