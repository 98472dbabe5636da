//! Runtime output constraint: one of N allowed strings plus a bounded number.

use std::ops::RangeInclusive;

use serde_json::{json, Value};

use super::ClassificationResult;

/// Constrains a response object to `{"category": <one of allowed>,
/// "confidence": <number in range>}`.
///
/// Built once per label set from plain data; the same value renders the
/// JSON schema sent to the backend and checks what comes back.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseConstraint {
    allowed: Vec<String>,
    confidence: RangeInclusive<f64>,
}

impl ResponseConstraint {
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>, confidence: RangeInclusive<f64>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            confidence,
        }
    }

    /// Categories restricted to `allowed`, confidence to `[0, 1]`.
    pub fn categories(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(allowed, 0.0..=1.0)
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Anchored alternation of the regex-escaped allowed strings.
    pub fn pattern(&self) -> String {
        let alternatives: Vec<String> = self.allowed.iter().map(|s| regex::escape(s)).collect();
        format!("^({})$", alternatives.join("|"))
    }

    /// JSON schema for the response object.
    pub fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": self.allowed,
                    "pattern": self.pattern(),
                },
                "confidence": {
                    "type": "number",
                    "minimum": self.confidence.start(),
                    "maximum": self.confidence.end(),
                },
            },
            "required": ["category", "confidence"],
            "additionalProperties": false,
        })
    }

    /// Check a response object against the constraint.
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self, response: &Value) -> Result<ClassificationResult, String> {
        let object = response
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {response}"))?;

        let category = object
            .get("category")
            .ok_or("missing field `category`")?
            .as_str()
            .ok_or("`category` is not a string")?;
        if !self.allowed.iter().any(|a| a == category) {
            return Err(format!("category {category:?} is not one of the allowed labels"));
        }

        let confidence = object
            .get("confidence")
            .ok_or("missing field `confidence`")?
            .as_f64()
            .ok_or("`confidence` is not a number")?;
        if !self.confidence.contains(&confidence) {
            return Err(format!(
                "confidence {confidence} is outside [{}, {}]",
                self.confidence.start(),
                self.confidence.end()
            ));
        }

        if let Some(extra) = object.keys().find(|k| *k != "category" && *k != "confidence") {
            return Err(format!("unexpected field `{extra}`"));
        }

        Ok(ClassificationResult {
            category: category.to_string(),
            confidence,
        })
    }
}
