//! MIME tree reduction: walks a part tree and produces a bounded plain-text
//! body plus link metadata.

use std::sync::Arc;

use scraper::{ElementRef, Html, Node};
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::model::mail::ExtractedBody;
use crate::model::part::MessagePart;
use crate::parser::decode::decode;
use crate::parser::links::{analyze_document, truncate_urls};
use crate::parser::normalize::normalize;
use crate::parser::tokens::TokenCounter;

/// Token budget used when the caller does not pick one.
pub const DEFAULT_TOKEN_BUDGET: usize = 2000;

/// Maximum nesting depth of multiparts and attached messages.
pub const MAX_DEPTH: usize = 10;

/// Elements whose text is never shown to a reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "template"];

/// Reduces MIME trees to [`ExtractedBody`] values under a token budget.
///
/// Holds no per-message state; one reducer can serve many messages, from
/// many threads.
#[derive(Clone)]
pub struct Reducer {
    counter: Arc<dyn TokenCounter>,
    budget: usize,
    snippet_fallback: bool,
}

impl Reducer {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            counter,
            budget: DEFAULT_TOKEN_BUDGET,
            snippet_fallback: true,
        }
    }

    /// Reducer with the `[extraction]` settings.
    pub fn from_config(counter: Arc<dyn TokenCounter>, config: &ExtractionConfig) -> Self {
        Self::new(counter)
            .with_budget(config.token_budget)
            .with_snippet_fallback(config.snippet_fallback)
    }

    /// Override the token budget.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Whether an empty result falls back to the snippet (default `true`).
    pub fn with_snippet_fallback(mut self, enabled: bool) -> Self {
        self.snippet_fallback = enabled;
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Walk `root` depth-first and collect its text.
    ///
    /// `text/plain` leaves are decoded, URL-truncated and normalized;
    /// `text/html` leaves additionally have their visible text extracted and
    /// their links scanned. Fragments are joined with single spaces. Once
    /// the accumulated text reaches the budget no further part is visited,
    /// so the result exceeds the budget by at most the part that hit it.
    ///
    /// Children of multiparts nested [`MAX_DEPTH`] levels deep are skipped.
    ///
    /// Falls back to the normalized `snippet` when no part yields text.
    pub fn reduce(&self, root: &MessagePart, snippet: &str) -> ExtractedBody {
        let mut acc = Accumulator::new(self.counter.as_ref(), self.budget);
        if let Flow::Stop = acc.visit(root, 0) {
            debug!(
                tokens = acc.tokens,
                budget = self.budget,
                "Token budget reached, stopped MIME traversal"
            );
        }

        let mut body = acc.finish();
        if self.snippet_fallback && body.text.trim().is_empty() {
            body.text = normalize(snippet);
        }
        body
    }
}

/// Whether the traversal should keep visiting parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Running state of one reduction, threaded through the recursion.
struct Accumulator<'a> {
    counter: &'a dyn TokenCounter,
    budget: usize,
    fragments: Vec<String>,
    text: String,
    tokens: usize,
    unsubscribe_link: Option<String>,
    link_count: usize,
}

impl<'a> Accumulator<'a> {
    fn new(counter: &'a dyn TokenCounter, budget: usize) -> Self {
        Self {
            counter,
            budget,
            fragments: Vec::new(),
            text: String::new(),
            tokens: 0,
            unsubscribe_link: None,
            link_count: 0,
        }
    }

    fn visit(&mut self, part: &MessagePart, depth: usize) -> Flow {
        if !part.is_leaf() {
            if depth >= MAX_DEPTH {
                warn!(depth, mime_type = %part.mime_type, "Multipart nesting too deep, skipping children");
                return Flow::Continue;
            }
            for child in &part.children {
                if self.visit(child, depth + 1) == Flow::Stop {
                    return Flow::Stop;
                }
            }
            return Flow::Continue;
        }

        let Some(data) = part.raw_data.as_deref() else {
            return Flow::Continue;
        };
        if data.is_empty() || !(part.is_plain_text() || part.is_html()) {
            return Flow::Continue;
        }

        let decoded = decode(data, part.transfer_encoding, part.charset.as_deref());
        let decoded = truncate_urls(&decoded);

        let fragment = if part.is_html() {
            let document = Html::parse_document(&decoded);
            let report = analyze_document(&document);
            self.link_count += report.link_count;
            if self.unsubscribe_link.is_none() {
                self.unsubscribe_link = report.unsubscribe_link;
            }
            normalize(&html_to_text(&document))
        } else {
            normalize(&decoded)
        };

        self.append(fragment)
    }

    fn append(&mut self, fragment: String) -> Flow {
        if fragment.is_empty() {
            return Flow::Continue;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(&fragment);
        self.fragments.push(fragment);

        self.tokens = self.counter.count_tokens(&self.text);
        if self.tokens >= self.budget {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn finish(self) -> ExtractedBody {
        debug!(
            parts = self.fragments.len(),
            tokens = self.tokens,
            links = self.link_count,
            "Reduced MIME tree"
        );
        ExtractedBody {
            text: self.text,
            unsubscribe_link: self.unsubscribe_link,
            link_count: self.link_count,
        }
    }
}

/// Visible text of an HTML document.
///
/// Text nodes are trimmed and joined with single spaces; script, style and
/// template contents are skipped. Entities are already decoded by the parser.
pub fn html_to_text(document: &Html) -> String {
    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let hidden = node
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|el| HIDDEN_ELEMENTS.contains(&el.value().name()));
                let trimmed = text.trim();
                (!hidden && !trimmed.is_empty()).then(|| trimmed.to_string())
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::part::TransferEncoding;
    use crate::parser::tokens::CharEstimateCounter;

    fn reducer(budget: usize) -> Reducer {
        Reducer::new(Arc::new(CharEstimateCounter)).with_budget(budget)
    }

    #[test]
    fn test_html_to_text_skips_scripts() {
        let doc = Html::parse_document(
            "<html><head><style>p{}</style></head><body><p>Hello <b>world</b></p>\
             <script>alert('x')</script><p>Tom &amp; Jerry</p></body></html>",
        );
        assert_eq!(html_to_text(&doc), "Hello world Tom & Jerry");
    }

    #[test]
    fn test_single_plain_leaf() {
        let root = MessagePart::leaf("text/plain", "  Hello\n\nthere  ");
        let body = reducer(2000).reduce(&root, "snippet");
        assert_eq!(body.text, "Hello there");
        assert_eq!(body.link_count, 0);
        assert_eq!(body.unsubscribe_link, None);
    }

    #[test]
    fn test_quoted_printable_leaf() {
        let root = MessagePart::leaf("text/plain", "Caf=C3=A9 =E2=98=95")
            .with_encoding(TransferEncoding::QuotedPrintable);
        assert_eq!(reducer(2000).reduce(&root, "").text, "Café ☕");
    }

    #[test]
    fn test_nested_children_in_order() {
        let root = MessagePart::multipart(
            "multipart/mixed",
            vec![
                MessagePart::multipart(
                    "multipart/alternative",
                    vec![
                        MessagePart::leaf("text/plain", "one"),
                        MessagePart::leaf("text/html", "<p>two <a href='https://a/x'>link</a></p>"),
                    ],
                ),
                MessagePart::leaf("image/png", vec![0x89, 0x50, 0x4E, 0x47]),
                MessagePart::leaf("text/plain", "three"),
            ],
        );
        let body = reducer(2000).reduce(&root, "");
        assert_eq!(body.text, "one two link three");
        assert_eq!(body.link_count, 1);
    }

    #[test]
    fn test_children_take_precedence_over_payload() {
        let mut root = MessagePart::multipart("multipart/mixed", vec![MessagePart::leaf("text/plain", "child")]);
        root.raw_data = Some(b"ignored payload".to_vec());
        assert_eq!(reducer(2000).reduce(&root, "").text, "child");
    }

    #[test]
    fn test_first_unsubscribe_link_wins_and_counts_sum() {
        let root = MessagePart::multipart(
            "multipart/mixed",
            vec![
                MessagePart::leaf("text/html", r#"<a href="https://first/u">Unsubscribe</a>"#),
                MessagePart::leaf(
                    "text/html",
                    r#"<a href="https://second/u">unsubscribe</a> <a href="https://x">x</a>"#,
                ),
            ],
        );
        let body = reducer(2000).reduce(&root, "");
        assert_eq!(body.unsubscribe_link.as_deref(), Some("https://first/u"));
        assert_eq!(body.link_count, 3);
    }

    #[test]
    fn test_plain_text_urls_are_truncated() {
        let root = MessagePart::leaf("text/plain", "Track: https://t.co/abc?utm_source=mail&id=1 end");
        assert_eq!(reducer(2000).reduce(&root, "").text, "Track: https://t.co/abc end");
    }

    #[test]
    fn test_snippet_fallback_when_no_text() {
        let root = MessagePart::multipart(
            "multipart/mixed",
            vec![
                MessagePart::leaf("application/pdf", "%PDF-1.4"),
                MessagePart::leaf("text/plain", " \n\u{200B} "),
                MessagePart::multipart("multipart/alternative", Vec::new()),
            ],
        );
        let body = reducer(2000).reduce(&root, "  Your   invoice\nis ready ");
        assert_eq!(body.text, "Your invoice is ready");
    }

    #[test]
    fn test_snippet_fallback_can_be_disabled() {
        let root = MessagePart::leaf("application/pdf", "%PDF-1.4");
        let body = reducer(2000).with_snippet_fallback(false).reduce(&root, "snippet");
        assert_eq!(body.text, "");
    }

    #[test]
    fn test_from_config() {
        let config = ExtractionConfig {
            token_budget: 42,
            ..ExtractionConfig::default()
        };
        assert_eq!(Reducer::from_config(Arc::new(CharEstimateCounter), &config).budget(), 42);
    }

    #[test]
    fn test_deep_nesting_is_cut_off() {
        let mut root = MessagePart::leaf("text/plain", "buried");
        for _ in 0..1_000 {
            root = MessagePart::multipart("multipart/mixed", vec![root]);
        }
        let shallow = MessagePart::multipart(
            "multipart/mixed",
            vec![MessagePart::leaf("text/plain", "visible"), root],
        );
        let body = reducer(2000).reduce(&shallow, "");
        assert_eq!(body.text, "visible");
    }

    #[test]
    fn test_leaves_at_max_depth_are_read() {
        let mut root = MessagePart::leaf("text/plain", "deepest");
        for _ in 0..MAX_DEPTH {
            root = MessagePart::multipart("multipart/mixed", vec![root]);
        }
        assert_eq!(reducer(2000).reduce(&root, "").text, "deepest");
    }

    #[test]
    fn test_empty_everything_yields_empty_text() {
        let root = MessagePart::multipart("multipart/mixed", Vec::new());
        assert_eq!(reducer(2000).reduce(&root, "").text, "");
    }

    #[test]
    fn test_budget_stops_traversal_across_levels() {
        // each leaf is 40 chars = 10 estimated tokens
        let leaf = |tag: &str| MessagePart::leaf("text/plain", format!("{tag} ").repeat(8));
        let root = MessagePart::multipart(
            "multipart/mixed",
            vec![
                MessagePart::multipart("multipart/alternative", vec![leaf("aaaa"), leaf("bbbb")]),
                MessagePart::multipart("multipart/alternative", vec![leaf("cccc"), leaf("dddd")]),
                leaf("eeee"),
            ],
        );
        let body = reducer(25).reduce(&root, "");
        assert!(body.text.contains("aaaa"));
        assert!(body.text.contains("bbbb"));
        assert!(body.text.contains("cccc"), "third leaf crosses the budget");
        assert!(!body.text.contains("dddd"), "traversal must stop after the budget");
        assert!(!body.text.contains("eeee"));
    }

    #[test]
    fn test_budget_overshoot_is_bounded_by_last_part() {
        let counter = CharEstimateCounter;
        let leaves: Vec<MessagePart> = (0..20)
            .map(|i| MessagePart::leaf("text/plain", format!("part{i} lorem ipsum dolor sit amet ").repeat(5)))
            .collect();
        let largest = leaves
            .iter()
            .map(|l| counter.count_tokens(&String::from_utf8_lossy(l.raw_data.as_ref().unwrap())))
            .max()
            .unwrap();
        let root = MessagePart::multipart("multipart/mixed", leaves);

        for budget in [1, 10, 50, 120, 333] {
            let body = reducer(budget).reduce(&root, "");
            let tokens = counter.count_tokens(&body.text);
            assert!(
                tokens <= budget + largest + 1,
                "budget {budget}: {tokens} tokens exceeds bound"
            );
        }
    }

    #[test]
    fn test_zero_budget_keeps_first_fragment_only() {
        let root = MessagePart::multipart(
            "multipart/mixed",
            vec![MessagePart::leaf("text/plain", "first"), MessagePart::leaf("text/plain", "second")],
        );
        assert_eq!(reducer(0).reduce(&root, "").text, "first");
    }

    #[test]
    fn test_output_is_normalized() {
        let root = MessagePart::multipart(
            "multipart/alternative",
            vec![
                MessagePart::leaf("text/plain", "a&nbsp;&nbsp;b\n"),
                MessagePart::leaf("text/html", "<div>\n  c\u{200B}  <span> d </span></div>"),
            ],
        );
        let text = reducer(2000).reduce(&root, "").text;
        assert_eq!(text, "a b c d");
        assert_eq!(normalize(&text), text);
    }
}
