//! Applying batch decisions to the message source.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::batch::{BatchItem, ItemOutcome};
use super::cache::ClassificationCache;
use crate::error::Result;
use crate::model::label::{Label, LabelSet};

/// Where labels live: a mailbox provider, a database, a test double.
#[async_trait]
pub trait LabelSink: Send + Sync {
    /// Find the label by name, creating it with its color if missing.
    /// Returns the sink's identifier for it.
    async fn ensure_label(&self, label: &Label) -> Result<String>;

    /// Attach a label to a message.
    async fn attach(&self, message_id: &str, label_id: &str) -> Result<()>;
}

/// Counts from one [`apply_labels`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Messages that received a label.
    pub applied: usize,
    /// Cached, failed or `other` messages left untouched.
    pub skipped: usize,
    /// Messages whose label could not be created or attached.
    pub failed: usize,
}

/// Attach the chosen label to every freshly classified message.
///
/// Cached items, failures and `other` are skipped. A message is recorded in
/// `cache` only once its label is attached, so a sink error leaves it to be
/// classified and applied again on the next run. A sink error affects only
/// the message it happened on.
pub async fn apply_labels(
    sink: &dyn LabelSink,
    items: &[BatchItem],
    labels: &LabelSet,
    cache: &mut ClassificationCache,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    let mut label_ids: HashMap<String, String> = HashMap::new();

    for item in items {
        let classification = match &item.outcome {
            ItemOutcome::Classified { classification, .. }
                if !classification.is_failure() && !classification.is_fallback() =>
            {
                classification
            }
            _ => {
                report.skipped += 1;
                continue;
            }
        };

        let category = classification.category();
        let Some(label) = labels.get(category) else {
            warn!(message_id = %item.message_id, category, "Category is not in the label set, skipping");
            report.skipped += 1;
            continue;
        };

        let label_id = match label_ids.get(category) {
            Some(id) => id.clone(),
            None => match sink.ensure_label(label).await {
                Ok(id) => {
                    label_ids.insert(category.to_string(), id.clone());
                    id
                }
                Err(e) => {
                    warn!(label = category, error = %e, "Failed to create label");
                    report.failed += 1;
                    continue;
                }
            },
        };

        match sink.attach(&item.message_id, &label_id).await {
            Ok(()) => {
                debug!(message_id = %item.message_id, label = category, "Applied label");
                cache.record(&item.message_id, classification);
                report.applied += 1;
            }
            Err(e) => {
                warn!(message_id = %item.message_id, label = category, error = %e, "Failed to apply label");
                report.failed += 1;
            }
        }
    }

    report
}
