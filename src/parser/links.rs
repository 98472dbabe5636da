//! Hyperlink analysis: link counting, unsubscribe detection and URL
//! query-string stripping.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Node, Selector};

/// Phrases that mark an unsubscribe or preference-center link.
pub const UNSUBSCRIBE_KEYWORDS: &[&str] = &[
    "unsubscribe",
    "email preferences",
    "manage preferences",
    "email settings",
    "email options",
    "notification preferences",
];

/// What the link scan found in one HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub unsubscribe_link: Option<String>,
    pub link_count: usize,
}

/// Parse `html` permissively and scan its links.
pub fn analyze(html: &str) -> LinkReport {
    analyze_document(&Html::parse_document(html))
}

/// Scan an already parsed document.
///
/// `link_count` is the number of `<a href>` elements. The unsubscribe link
/// is, in priority order:
/// 1. the first anchor whose text contains a keyword;
/// 2. for the first text node containing a keyword, its nearest ancestor
///    anchor with an `href`, or failing that the first such anchor among
///    the siblings that follow it (`Unsubscribe <a href=..>here</a>`).
pub fn analyze_document(document: &Html) -> LinkReport {
    let anchors: Vec<ElementRef<'_>> = document.select(anchor_selector()).collect();

    let unsubscribe_link = anchors
        .iter()
        .find(|a| contains_keyword(&a.text().collect::<String>()))
        .and_then(|a| href(*a))
        .or_else(|| link_near_keyword_text(document));

    LinkReport {
        unsubscribe_link,
        link_count: anchors.len(),
    }
}

/// Cut every absolute `http(s)` URL in `text` at its first `?`.
///
/// URL matching stops at whitespace, quotes and angle brackets, so the rule
/// can run over raw HTML without eating the surrounding markup.
pub fn truncate_urls(text: &str) -> String {
    url_regex()
        .replace_all(text, |caps: &Captures<'_>| {
            let url = &caps[0];
            match url.find('?') {
                Some(pos) => url[..pos].to_string(),
                None => url.to_string(),
            }
        })
        .into_owned()
}

fn link_near_keyword_text(document: &Html) -> Option<String> {
    document
        .tree
        .root()
        .descendants()
        .filter(|node| matches!(node.value(), Node::Text(t) if contains_keyword(t)))
        .find_map(|node| {
            // nearest ancestor <a> carrying an href
            let enclosing = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "a")
                .find_map(href);
            enclosing.or_else(|| node.next_siblings().filter_map(ElementRef::wrap).find_map(anchor_at_or_below))
        })
}

/// The element itself if it is an `<a href>`, else its first such descendant.
fn anchor_at_or_below(element: ElementRef<'_>) -> Option<String> {
    if element.value().name() == "a" {
        if let Some(link) = href(element) {
            return Some(link);
        }
    }
    element.select(anchor_selector()).find_map(href)
}

fn href(anchor: ElementRef<'_>) -> Option<String> {
    anchor.value().attr("href").map(|h| h.trim().to_string())
}

fn contains_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    UNSUBSCRIBE_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("valid anchor selector"))
}

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("valid URL regex"))
}
