// src/normalize.rs
// Turns raw simulation records into flat rows.
// Agent B's answer arrives as a JSON string (sometimes fenced, sometimes with
// prose around it) or as an already-decoded object, and the explanation score
// shows up under either `explanation_rating` or the prompt's `explanaton_rating`.

use serde_json::{Map, Value};

use crate::error::{FairnessError, Result};
use crate::simulation::RawRecord;

pub const EXPLANATION_KEY: &str = "explanation_rating";
pub const EXPLANATION_KEY_TYPO: &str = "explanaton_rating";

/// Agent B's evaluation after lenient field extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub proposal: Option<String>,
    pub respect_rating: Option<f64>,
    pub respect_comment: Option<String>,
    pub disrespect_example: Option<String>,
    pub explanation_rating: Option<f64>,
    pub better_explanation: Option<String>,
    pub accept: Option<bool>,
    pub main_reason_for_decision: Option<String>,
}

impl Evaluation {
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            Value::String(text) => {
                let body = extract_json_object(text).ok_or_else(|| {
                    FairnessError::Parse("evaluation text holds no JSON object".to_string())
                })?;
                match serde_json::from_str::<Value>(body)? {
                    Value::Object(map) => Ok(Self::from_map(&map)),
                    _ => Err(FairnessError::Parse("evaluation is not a JSON object".to_string())),
                }
            }
            other => Err(FairnessError::Parse(format!(
                "evaluation has unexpected JSON type: {}",
                type_name(other)
            ))),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let explanation = map
            .get(EXPLANATION_KEY)
            .filter(|v| !v.is_null())
            .or_else(|| map.get(EXPLANATION_KEY_TYPO));

        Self {
            proposal: map.get("proposal").and_then(as_text),
            respect_rating: map.get("respect_rating").and_then(as_rating),
            respect_comment: map.get("respect_comment").and_then(as_text),
            disrespect_example: map.get("disrespect_example").and_then(as_text),
            explanation_rating: explanation.and_then(as_rating),
            better_explanation: map.get("better_explanation").and_then(as_text),
            accept: map.get("accept").and_then(as_flag),
            main_reason_for_decision: map.get("main_reason_for_decision").and_then(as_text),
        }
    }
}

/// The outermost `{...}` of a model reply, with code fences ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn as_rating(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// One evaluation, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRecord {
    pub condition: String,
    pub context: String,
    pub split: String,
    pub respect_rating: Option<f64>,
    pub explanation_rating: Option<f64>,
    pub accept: u8,
}

#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub rows: Vec<FlatRecord>,
    pub skipped: usize,
}

pub fn flatten(records: &[RawRecord]) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();

    for (idx, record) in records.iter().enumerate() {
        let evaluation = match Evaluation::from_value(&record.evaluation) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                tracing::warn!(record = idx, error = %e, "skipping unparseable evaluation");
                outcome.skipped += 1;
                continue;
            }
        };

        let Some(accept) = evaluation.accept else {
            tracing::warn!(record = idx, "skipping evaluation without an accept decision");
            outcome.skipped += 1;
            continue;
        };

        outcome.rows.push(FlatRecord {
            condition: record.condition.clone(),
            context: record.context_label().to_string(),
            split: record.split.label(),
            respect_rating: evaluation.respect_rating,
            explanation_rating: evaluation.explanation_rating,
            accept: u8::from(accept),
        });
    }

    tracing::info!(rows = outcome.rows.len(), skipped = outcome.skipped, "records flattened");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::Split;
    use serde_json::json;
    use test_case::test_case;

    fn record(evaluation: Value) -> RawRecord {
        RawRecord {
            context: Some("competitive".to_string()),
            condition: "Low-High".to_string(),
            iteration: 1,
            split: Split::new(6, 4),
            proposal: "I take six.".to_string(),
            evaluation,
            timestamp: None,
            run_id: None,
        }
    }

    #[test]
    fn typo_key_is_reconciled() {
        let eval = Evaluation::from_value(&json!({
            "respect_rating": 4, "explanaton_rating": 2, "accept": true
        }))
        .unwrap();
        assert_eq!(eval.explanation_rating, Some(2.0));
    }

    #[test]
    fn correct_spelling_wins_over_typo() {
        let eval = Evaluation::from_value(&json!({
            "explanation_rating": 5, "explanaton_rating": 1, "accept": false
        }))
        .unwrap();
        assert_eq!(eval.explanation_rating, Some(5.0));
    }

    #[test]
    fn null_correct_spelling_falls_back_to_typo() {
        let eval = Evaluation::from_value(&json!({
            "explanation_rating": null, "explanaton_rating": 3, "accept": true
        }))
        .unwrap();
        assert_eq!(eval.explanation_rating, Some(3.0));
    }

    #[test]
    fn string_evaluation_with_fence_and_prose() {
        let text = "Here is my evaluation:\n```json\n{\"respect_rating\": \"4\", \"accept\": \"Yes\", \"respect_comment\": \"fine\"}\n```";
        let eval = Evaluation::from_value(&Value::String(text.to_string())).unwrap();
        assert_eq!(eval.respect_rating, Some(4.0));
        assert_eq!(eval.accept, Some(true));
        assert_eq!(eval.respect_comment.as_deref(), Some("fine"));
    }

    #[test_case(json!(true), Some(true))]
    #[test_case(json!(0), Some(false))]
    #[test_case(json!("FALSE"), Some(false))]
    #[test_case(json!("maybe"), None)]
    #[test_case(json!(null), None)]
    fn accept_flag_variants(value: Value, expected: Option<bool>) {
        assert_eq!(as_flag(&value), expected);
    }

    #[test_case(Value::String("no braces at all".into()))]
    #[test_case(json!([1, 2, 3]))]
    #[test_case(Value::String("{not json}".into()))]
    fn unusable_evaluations_error(value: Value) {
        assert!(Evaluation::from_value(&value).is_err());
    }

    #[test]
    fn flatten_skips_bad_records_and_counts_them() {
        let records = vec![
            record(json!({"respect_rating": 2, "explanaton_rating": 4, "accept": true})),
            record(Value::String("I refuse to answer in JSON".into())),
            record(json!({"respect_rating": 3, "explanation_rating": 3})),
            record(Value::String(r#"{"respect_rating": 1, "explanation_rating": 2, "accept": false}"#.into())),
        ];
        let outcome = flatten(&records);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(
            outcome.rows[0],
            FlatRecord {
                condition: "Low-High".into(),
                context: "competitive".into(),
                split: "6:4".into(),
                respect_rating: Some(2.0),
                explanation_rating: Some(4.0),
                accept: 1,
            }
        );
        assert_eq!(outcome.rows[1].accept, 0);
    }

    #[test]
    fn missing_context_becomes_unknown() {
        let mut r = record(json!({"accept": true}));
        r.context = None;
        let outcome = flatten(&[r]);
        assert_eq!(outcome.rows[0].context, "unknown");
        assert_eq!(outcome.rows[0].respect_rating, None);
    }
}
