//! SWE-bench dataset access
//!
//! Instances are fetched from HuggingFace (rows API with a file-download
//! fallback) and cached locally. LongCodeBench variants carry context files
//! per instance and are detected from the dataset name.

pub mod huggingface;
pub mod longcode;
pub mod predictions;
pub mod types;

pub use huggingface::HuggingFaceDataset;
pub use predictions::{append_prediction, load_predictions};
pub use types::{Prediction, SweInstance};
