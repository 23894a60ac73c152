//! Prediction records and inference results.
//!
//! The hosted inference service answers in one of three shapes depending on
//! the kind of model behind the identifier:
//!
//! - detection: `{"predictions": [{"class", "confidence", "x", "y", "width", "height"}]}`
//! - single-label classification: `{"predictions": [{"class", "confidence"}]}`
//!   or a bare `{"top": "...", "confidence": ...}`
//! - multi-label classification: `{"predictions": {"<class>": {"confidence": ...}}}`
//!
//! [`InferenceResult::from_value`] normalizes all of them into a list of
//! [`Prediction`]s while keeping the raw body untouched.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rect::CenterBox;

/// One labeled output from the remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Prediction {
    /// Class label
    #[serde(rename = "class")]
    pub label: String,
    /// Confidence as reported by the remote service
    pub confidence: f64,
    /// Spatial fields, present only for detectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<CenterBox>,
}

impl Prediction {
    pub fn classification(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            spatial: None,
        }
    }

    pub fn detection(label: impl Into<String>, confidence: f64, spatial: CenterBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            spatial: Some(spatial),
        }
    }

    /// Whether the record carries box coordinates.
    pub fn is_detection(&self) -> bool {
        self.spatial.is_some()
    }

    /// Confidence rendered with two decimals.
    pub fn confidence_text(&self) -> String {
        format_confidence(self.confidence)
    }

    /// Label drawn next to a detection box.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.label, self.confidence_text())
    }
}

/// Render a confidence with two-decimal precision.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.2}", confidence)
}

/// Parsed response of one inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Normalized prediction records
    pub predictions: Vec<Prediction>,
    /// Body exactly as returned by the remote service
    pub raw: Value,
}

impl InferenceResult {
    /// Normalize a remote response body.
    ///
    /// Entries without a class label are dropped. A body without any
    /// recognizable predictions yields an empty list.
    pub fn from_value(raw: Value) -> Self {
        let predictions = match raw.get("predictions") {
            Some(Value::Array(items)) => items.iter().filter_map(parse_record).collect(),
            Some(Value::Object(classes)) => {
                let mut predictions: Vec<Prediction> = classes
                    .iter()
                    .filter_map(|(label, entry)| {
                        number(entry, "confidence")
                            .map(|confidence| Prediction::classification(label.clone(), confidence))
                    })
                    .collect();
                predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
                predictions
            }
            _ => match (raw.get("top").and_then(Value::as_str), number(&raw, "confidence")) {
                (Some(top), Some(confidence)) => vec![Prediction::classification(top, confidence)],
                _ => Vec::new(),
            },
        };

        Self { predictions, raw }
    }

    /// Whether any record carries box coordinates.
    pub fn has_detections(&self) -> bool {
        self.predictions.iter().any(Prediction::is_detection)
    }

    /// Records with box coordinates.
    pub fn detections(&self) -> impl Iterator<Item = &Prediction> {
        self.predictions.iter().filter(|p| p.is_detection())
    }

    /// Highest-confidence record.
    pub fn top(&self) -> Option<&Prediction> {
        self.predictions
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

fn parse_record(item: &Value) -> Option<Prediction> {
    let label = item.get("class").and_then(Value::as_str)?;
    let confidence = number(item, "confidence").unwrap_or(0.0);

    let spatial = match (
        number(item, "x"),
        number(item, "y"),
        number(item, "width"),
        number(item, "height"),
    ) {
        (Some(x), Some(y), Some(width), Some(height)) => Some(CenterBox::new(x, y, width, height)),
        _ => None,
    };

    Some(Prediction {
        label: label.to_string(),
        confidence,
        spatial,
    })
}

fn number(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}
