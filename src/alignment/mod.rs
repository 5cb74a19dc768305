pub mod diagnostics;
pub mod permutation;
pub mod record;
pub mod reference;
pub mod truncation;

pub use diagnostics::{row_sum_violations, RowSumViolation};
pub use permutation::{apply_permutation, validate_permutation};
pub use record::build_record;
pub use reference::resolve_reference;
pub use truncation::{spectrogram_slice, truncate_attention};
