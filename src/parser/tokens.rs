//! Token counting for the extraction budget.

use tiktoken_rs::CoreBPE;

use crate::error::{MailsiftError, Result};

/// Measures text in model tokens.
///
/// Implementors must be thread-safe so one counter can be shared by every
/// reduction in a batch.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// The `cl100k_base` BPE tokenizer.
///
/// Text is encoded as ordinary text, so strings such as `<|endoftext|>`
/// inside an email are counted instead of rejected.
pub struct Cl100kCounter {
    bpe: CoreBPE,
}

impl Cl100kCounter {
    /// Load the bundled `cl100k_base` tables.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| MailsiftError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for Cl100kCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// 4 characters per token, rounded up.
///
/// Cheap and deterministic; used in tests and where the BPE tables are not
/// wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimateCounter;

impl TokenCounter for CharEstimateCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}
