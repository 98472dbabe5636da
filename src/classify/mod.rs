//! Label resolution: prompt construction, one constrained completion call,
//! local validation and the `other` fallback policy.

pub mod completion;
pub mod constraint;
pub mod openai;
pub mod prompt;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::model::label::{LabelSet, OTHER_LABEL};

pub use completion::{CompletionError, CompletionRequest, StructuredCompletion};
pub use constraint::ResponseConstraint;
pub use openai::OpenAiCompatibleClient;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "solidrust/Nous-Hermes-2-Mistral-7B-DPO-AWQ";

/// Completion length cap; a label answer is a few dozen tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 150;

/// Name under which the response schema is sent.
pub const SCHEMA_NAME: &str = "email_label";

/// A category chosen for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Exactly one of the label names of the call.
    pub category: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl ClassificationResult {
    /// The fallback answer: `other` with zero confidence.
    pub fn fallback() -> Self {
        Self {
            category: OTHER_LABEL.to_string(),
            confidence: 0.0,
        }
    }
}

/// Why a classification has no model-chosen category.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    /// The backend answered with something outside the response constraint.
    #[error("response rejected: {0}")]
    InvalidResponse(String),

    /// The batch deadline fired while the call was in flight.
    #[error("abandoned at batch deadline")]
    Abandoned,
}

/// Outcome of classifying one message.
///
/// Failures are kept distinct from a genuine `other` answer until the caller
/// applies the fallback policy through [`category`](Self::category) or
/// [`into_result`](Self::into_result).
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Labeled(ClassificationResult),
    Failed(FailureReason),
}

impl Classification {
    /// Chosen category, `other` for failures.
    pub fn category(&self) -> &str {
        match self {
            Self::Labeled(result) => &result.category,
            Self::Failed(_) => OTHER_LABEL,
        }
    }

    /// Model confidence, 0.0 for failures.
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Labeled(result) => result.confidence,
            Self::Failed(_) => 0.0,
        }
    }

    /// Collapse into a plain result, mapping failures to the fallback.
    pub fn into_result(self) -> ClassificationResult {
        match self {
            Self::Labeled(result) => result,
            Self::Failed(_) => ClassificationResult::fallback(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// `true` when the category is `other`, chosen or by failure.
    pub fn is_fallback(&self) -> bool {
        self.category() == OTHER_LABEL
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Failed(reason) => Some(reason),
            Self::Labeled(_) => None,
        }
    }
}

/// Resolves documents to one label of a [`LabelSet`].
///
/// Stateless between calls; clones share the completion backend, and
/// concurrent `classify` calls are independent.
#[derive(Clone)]
pub struct Classifier {
    completion: Arc<dyn StructuredCompletion>,
    model: String,
    max_tokens: u32,
}

impl Classifier {
    pub fn new(completion: Arc<dyn StructuredCompletion>, model: impl Into<String>) -> Self {
        Self {
            completion,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Classifier backed by the configured OpenAI-compatible endpoint.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let client = OpenAiCompatibleClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), &config.model).with_max_tokens(config.max_tokens))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Classify one rendered document.
    ///
    /// Makes at most one completion call, at temperature 0, constrained to
    /// the names in `labels`. Never fails: backend errors and responses
    /// outside the constraint come back as [`Classification::Failed`].
    /// When `other` is the only candidate the model is not consulted.
    pub async fn classify(&self, document: &str, labels: &LabelSet) -> Classification {
        if labels.only_fallback() {
            debug!("Only the fallback label is defined, skipping completion");
            return Classification::Labeled(ClassificationResult {
                category: OTHER_LABEL.to_string(),
                confidence: 1.0,
            });
        }

        let constraint = ResponseConstraint::categories(labels.names());
        let request = CompletionRequest {
            model: self.model.clone(),
            system: prompt::SYSTEM_PROMPT.to_string(),
            user: prompt::user_prompt(document, labels),
            schema_name: SCHEMA_NAME.to_string(),
            schema: constraint.schema(),
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        let response = match self.completion.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, model = %self.model, "Classification call failed, falling back to other");
                return Classification::Failed(e.into());
            }
        };

        match constraint.validate(&response) {
            Ok(result) => {
                debug!(
                    category = %result.category,
                    confidence = result.confidence,
                    "Classified message"
                );
                Classification::Labeled(result)
            }
            Err(violation) => {
                warn!(%violation, "Classification response rejected, falling back to other");
                Classification::Failed(FailureReason::InvalidResponse(violation))
            }
        }
    }
}
