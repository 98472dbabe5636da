//! Label definitions and the per-call label set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Name of the fallback label. Always present in a [`LabelSet`].
pub const OTHER_LABEL: &str = "other";

/// Description given to a synthesized [`OTHER_LABEL`].
pub const OTHER_DESCRIPTION: &str = "doesn't fit any other category with high confidence";

/// Color given to a synthesized [`OTHER_LABEL`].
pub const DEFAULT_COLOR: &str = "default";

/// A user-defined category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Category name, case-sensitive. This is what the model must answer.
    #[serde(alias = "label_name")]
    pub name: String,

    /// Free-form hint shown to the model.
    #[serde(default)]
    pub description: Option<String>,

    /// Display color, opaque to mailsift (passed through to the label sink).
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Label {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            color: default_color(),
        }
    }

    /// Set the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    fn other() -> Self {
        Self::new(OTHER_LABEL, OTHER_DESCRIPTION)
    }
}

/// The candidate labels of one classification call.
///
/// Names are unique (case-sensitive, first occurrence wins) and the set
/// always contains [`OTHER_LABEL`]: it is appended when the caller did not
/// supply one, and never duplicated when they did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    pub fn new(labels: impl IntoIterator<Item = Label>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for label in labels {
            if seen.insert(label.name.clone()) {
                unique.push(label);
            } else {
                warn!(label = %label.name, "Dropping duplicate label definition");
            }
        }
        if !seen.contains(OTHER_LABEL) {
            unique.push(Label::other());
        }
        Self { labels: unique }
    }

    /// All labels, in caller order, with `other` last if it was synthesized.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Label names, in the same order as [`labels`](Self::labels).
    pub fn names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }

    /// Look a label up by exact name.
    pub fn get(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// `true` when `other` is the only candidate.
    pub fn only_fallback(&self) -> bool {
        self.labels.len() == 1
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always `false`: a label set holds at least the fallback label.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl From<Vec<Label>> for LabelSet {
    fn from(labels: Vec<Label>) -> Self {
        Self::new(labels)
    }
}
