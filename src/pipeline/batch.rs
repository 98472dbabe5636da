//! Batch runner: reduce, render and classify many messages concurrently.

use std::pin::pin;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::cache::{CacheEntry, ClassificationCache};
use crate::classify::{Classification, Classifier, FailureReason};
use crate::config::Config;
use crate::document;
use crate::model::label::LabelSet;
use crate::model::mail::{EmailMessage, ExtractedBody};
use crate::parser::mime::Reducer;

/// Limits of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Only the first `max_messages` inputs are processed.
    pub max_messages: Option<usize>,
    /// Classification calls in flight at once (unset = all).
    pub max_concurrency: Option<usize>,
    /// Deadline for the classification phase.
    pub timeout: Option<Duration>,
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_messages: Some(config.extraction.max_messages),
            max_concurrency: config.batch.max_concurrency,
            timeout: config.batch.timeout(),
        }
    }
}

/// Result for one input message, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub message_id: String,
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Labeled in an earlier run; not reduced or classified again.
    Cached(CacheEntry),
    /// Reduced and sent to the classifier in this run.
    Classified {
        body: ExtractedBody,
        classification: Classification,
    },
}

impl BatchItem {
    /// Category after the fallback policy: cached, chosen, or `other`.
    pub fn category(&self) -> &str {
        match &self.outcome {
            ItemOutcome::Cached(entry) => &entry.category,
            ItemOutcome::Classified { classification, .. } => classification.category(),
        }
    }
}

/// Classify `messages` against `labels`.
///
/// Messages already in `cache` are returned as [`ItemOutcome::Cached`].
/// The rest are reduced, rendered and classified with up to
/// `max_concurrency` calls in flight; results are matched back to their
/// message by position, so the output order is the input order whatever
/// the completion order. When the deadline fires, calls still running are
/// dropped and reported as [`FailureReason::Abandoned`].
///
/// The cache is only read here. Entries are written by
/// [`apply_labels`](super::sink::apply_labels) once a label is attached.
pub async fn classify_batch(
    classifier: &Classifier,
    reducer: &Reducer,
    messages: &[EmailMessage],
    labels: &LabelSet,
    cache: &mut ClassificationCache,
    options: &BatchOptions,
) -> Vec<BatchItem> {
    let limit = options.max_messages.unwrap_or(messages.len());
    if messages.len() > limit {
        debug!(total = messages.len(), limit, "Truncating batch");
    }
    let messages = &messages[..messages.len().min(limit)];

    let mut cached: Vec<Option<CacheEntry>> = vec![None; messages.len()];
    let mut pending: Vec<(usize, ExtractedBody, String)> = Vec::new();
    for (index, message) in messages.iter().enumerate() {
        if let Some(entry) = cache.get(&message.id) {
            cached[index] = Some(entry.clone());
            continue;
        }
        let body = reducer.reduce(&message.root, &message.snippet);
        let doc = document::render(message, &body);
        pending.push((index, body, doc));
    }

    let mut completed: Vec<Option<Classification>> = vec![None; messages.len()];
    let concurrency = options.max_concurrency.unwrap_or(pending.len()).max(1);
    let run = async {
        let calls = stream::iter(pending.iter().map(|(index, _, doc)| async move {
            (*index, classifier.classify(doc, labels).await)
        }))
        .buffer_unordered(concurrency);
        let mut calls = pin!(calls);
        while let Some((index, classification)) = calls.next().await {
            completed[index] = Some(classification);
        }
    };
    match options.timeout {
        Some(deadline) => {
            if tokio::time::timeout(deadline, run).await.is_err() {
                warn!(?deadline, "Batch deadline reached, abandoning in-flight classifications");
            }
        }
        None => run.await,
    }

    let mut classified: Vec<Option<(ExtractedBody, Classification)>> = vec![None; messages.len()];
    let mut abandoned = 0usize;
    for (index, body, _) in pending {
        let classification = completed[index].take().unwrap_or_else(|| {
            abandoned += 1;
            Classification::Failed(FailureReason::Abandoned)
        });
        classified[index] = Some((body, classification));
    }

    let items: Vec<BatchItem> = messages
        .iter()
        .zip(cached.into_iter().zip(classified))
        .filter_map(|(message, slot)| {
            let outcome = match slot {
                (Some(entry), _) => ItemOutcome::Cached(entry),
                (None, Some((body, classification))) => ItemOutcome::Classified {
                    body,
                    classification,
                },
                (None, None) => return None,
            };
            Some(BatchItem {
                message_id: message.id.clone(),
                outcome,
            })
        })
        .collect();

    let failed = items
        .iter()
        .filter(|item| matches!(&item.outcome, ItemOutcome::Classified { classification, .. } if classification.is_failure()))
        .count();
    info!(
        messages = items.len(),
        cached = items.iter().filter(|i| matches!(i.outcome, ItemOutcome::Cached(_))).count(),
        failed,
        abandoned,
        "Batch classified"
    );
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::classify::{CompletionError, CompletionRequest, StructuredCompletion};
    use crate::model::label::Label;
    use crate::model::part::MessagePart;
    use crate::parser::tokens::CharEstimateCounter;

    /// Picks the category named in the document body and sleeps for the
    /// number of milliseconds after `sleep:`; fails on `fail`.
    struct ScriptedCompletion {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedCompletion {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StructuredCompletion for ScriptedCompletion {
        async fn complete(&self, request: CompletionRequest) -> std::result::Result<Value, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let body = request.user.rsplit("---\n").next().unwrap_or_default().to_string();
            let mut words = body.trim_end_matches('`').split_whitespace();
            let category = words.next().unwrap_or("other").to_string();
            let sleep_ms: u64 = words
                .next()
                .and_then(|w| w.strip_prefix("sleep:"))
                .and_then(|ms| ms.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if category == "fail" {
                return Err(CompletionError::Timeout);
            }
            Ok(json!({"category": category, "confidence": 0.9}))
        }
    }

    fn message(id: &str, body: &str) -> EmailMessage {
        EmailMessage {
            id: id.to_string(),
            root: MessagePart::leaf("text/plain", body),
            ..EmailMessage::default()
        }
    }

    fn labels() -> LabelSet {
        LabelSet::new(vec![Label::new("work", "w"), Label::new("promotional", "p")])
    }

    fn setup(stub: Arc<ScriptedCompletion>) -> (Classifier, Reducer, ClassificationCache) {
        (
            Classifier::new(stub, "m"),
            Reducer::new(Arc::new(CharEstimateCounter)),
            ClassificationCache::new(NonZeroUsize::new(100).unwrap()),
        )
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let stub = ScriptedCompletion::new();
        let (classifier, reducer, mut cache) = setup(stub.clone());
        let messages = vec![
            message("1", "work sleep:30"),
            message("2", "promotional sleep:1"),
            message("3", "fail"),
            message("4", "work"),
        ];
        let items =
            classify_batch(&classifier, &reducer, &messages, &labels(), &mut cache, &BatchOptions::default()).await;

        let ids: Vec<&str> = items.iter().map(|i| i.message_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        let categories: Vec<&str> = items.iter().map(BatchItem::category).collect();
        assert_eq!(categories, vec!["work", "promotional", "other", "work"]);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cached_messages_are_skipped() {
        let stub = ScriptedCompletion::new();
        let (classifier, reducer, mut cache) = setup(stub.clone());
        let messages = vec![message("a", "work"), message("b", "other")];

        let first =
            classify_batch(&classifier, &reducer, &messages, &labels(), &mut cache, &BatchOptions::default()).await;
        assert!(cache.is_empty(), "classification alone does not write the cache");

        let ItemOutcome::Classified { classification, .. } = &first[0].outcome else {
            panic!("unexpected outcome {:?}", first[0].outcome);
        };
        cache.record("a", classification);

        let items =
            classify_batch(&classifier, &reducer, &messages, &labels(), &mut cache, &BatchOptions::default()).await;
        assert!(matches!(items[0].outcome, ItemOutcome::Cached(_)));
        assert_eq!(items[0].category(), "work");
        assert!(matches!(items[1].outcome, ItemOutcome::Classified { .. }));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3, "cached message is not sent again");
    }

    #[tokio::test]
    async fn test_max_messages_truncates() {
        let stub = ScriptedCompletion::new();
        let (classifier, reducer, mut cache) = setup(stub);
        let messages: Vec<EmailMessage> = (0..5).map(|i| message(&i.to_string(), "work")).collect();
        let options = BatchOptions {
            max_messages: Some(2),
            ..BatchOptions::default()
        };
        let items = classify_batch(&classifier, &reducer, &messages, &labels(), &mut cache, &options).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].message_id, "1");
    }

    #[tokio::test]
    async fn test_concurrency_cap() {
        let stub = ScriptedCompletion::new();
        let (classifier, reducer, mut cache) = setup(stub.clone());
        let messages: Vec<EmailMessage> = (0..8).map(|i| message(&i.to_string(), "work sleep:5")).collect();
        let options = BatchOptions {
            max_concurrency: Some(2),
            ..BatchOptions::default()
        };
        let items = classify_batch(&classifier, &reducer, &messages, &labels(), &mut cache, &options).await;
        assert_eq!(items.len(), 8);
        assert!(stub.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_in_flight() {
        let stub = ScriptedCompletion::new();
        let (classifier, reducer, mut cache) = setup(stub);
        let messages = vec![
            message("fast", "work sleep:10"),
            message("slow", "promotional sleep:60000"),
        ];
        let options = BatchOptions {
            timeout: Some(Duration::from_secs(1)),
            ..BatchOptions::default()
        };
        let items = classify_batch(&classifier, &reducer, &messages, &labels(), &mut cache, &options).await;

        assert_eq!(items[0].category(), "work");
        match &items[1].outcome {
            ItemOutcome::Classified { classification, .. } => {
                assert_eq!(classification.failure(), Some(&FailureReason::Abandoned));
                assert_eq!(classification.category(), "other");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bodies_are_returned() {
        let stub = ScriptedCompletion::new();
        let (classifier, reducer, mut cache) = setup(stub);
        let messages = vec![message("x", "  work   hard  ")];
        let items =
            classify_batch(&classifier, &reducer, &messages, &labels(), &mut cache, &BatchOptions::default()).await;
        match &items[0].outcome {
            ItemOutcome::Classified { body, .. } => assert_eq!(body.text, "work hard"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
