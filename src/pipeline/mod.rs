//! Caller-side orchestration around the extraction and classification core.

pub mod batch;
pub mod cache;
pub mod sink;

pub use batch::{classify_batch, BatchItem, BatchOptions, ItemOutcome};
pub use cache::{CacheEntry, ClassificationCache};
pub use sink::{apply_labels, ApplyReport, LabelSink};
