//! Plan description parsing.
//!
//! Gateway products carry a free-form description. Product teams store a
//! JSON array of feature bullets there, or a plain marketing subtitle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured plan description shown by the pricing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDescription {
    pub subtitle: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl PlanDescription {
    /// Parses a raw product description.
    ///
    /// - JSON array: items become `features`, the product name is the subtitle.
    /// - Any other non-empty string: used as the subtitle.
    /// - Absent or blank: product name as subtitle.
    pub fn parse(raw: Option<&str>, product_name: &str) -> Self {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty());

        let Some(raw) = raw else {
            return Self::subtitle_only(product_name);
        };

        if raw.starts_with('[') {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
                let features = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                return Self {
                    subtitle: product_name.to_string(),
                    features,
                };
            }
        }

        Self::subtitle_only(raw)
    }

    fn subtitle_only(subtitle: &str) -> Self {
        Self {
            subtitle: subtitle.to_string(),
            features: Vec::new(),
        }
    }
}
