//! Prompt text for the labeling call.

use crate::model::label::LabelSet;

/// System prompt: role plus sender and link heuristics.
pub const SYSTEM_PROMPT: &str = "You are an email assistant that categorizes emails.\n\n\
# Tips\n\
If the sender domain includes Beehiiv or Substack it probably is a newsletter.\n\
If the email contains an unsubscribe link it is probably a promotional email.";

/// The category list, one `- name (description)` line per label.
pub fn label_options(labels: &LabelSet) -> String {
    let lines: Vec<String> = labels
        .labels()
        .iter()
        .map(|label| match label.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => format!("- {} ({})", label.name, description),
            None => format!("- {}", label.name),
        })
        .collect();
    format!(
        "Only choose one of these categories for the email:\n\n{}",
        lines.join("\n")
    )
}

/// User prompt: category list followed by the document in backticks.
pub fn user_prompt(document: &str, labels: &LabelSet) -> String {
    format!(
        "{}\n\nLabel the following email: `{}`",
        label_options(labels),
        document
    )
}
