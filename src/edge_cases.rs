// src/edge_cases.rs
// Qualitative picks from the raw records: even splits that were rejected and
// skewed splits that were accepted. When no 7:3 offer was accepted, accepted
// 6:4 offers stand in for them.

use serde::{Deserialize, Serialize};

use crate::normalize::Evaluation;
use crate::simulation::RawRecord;

const EVEN_SPLIT: &str = "5:5";
const SKEWED_SPLIT: &str = "7:3";
const FALLBACK_SPLIT: &str = "6:4";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCase {
    #[serde(rename = "Context")]
    pub context: String,
    #[serde(rename = "Split")]
    pub split: String,
    #[serde(rename = "Accepted")]
    pub accepted: String,
    #[serde(rename = "Condition")]
    pub condition: String,
    #[serde(rename = "Proposal Message")]
    pub proposal_message: String,
    #[serde(rename = "Interpersonal Fairness Rank")]
    pub interpersonal_rank: Option<f64>,
    #[serde(rename = "Interpersonal Fairness Text")]
    pub interpersonal_text: Option<String>,
    #[serde(rename = "Informational Fairness Rank")]
    pub informational_rank: Option<f64>,
    #[serde(rename = "Informational Fairness Text")]
    pub informational_text: Option<String>,
    #[serde(rename = "Main Reason for Decision")]
    pub main_reason: Option<String>,
}

impl EdgeCase {
    fn new(record: &RawRecord, evaluation: Evaluation, accepted: bool) -> Self {
        Self {
            context: record.context_label().to_string(),
            split: record.split.label(),
            accepted: if accepted { "Accepted" } else { "Rejected" }.to_string(),
            condition: record.condition.clone(),
            proposal_message: record.proposal.trim().to_string(),
            interpersonal_rank: evaluation.respect_rating,
            interpersonal_text: evaluation.respect_comment,
            informational_rank: evaluation.explanation_rating,
            informational_text: evaluation.better_explanation,
            main_reason: evaluation.main_reason_for_decision,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted == "Accepted"
    }
}

/// Records with a readable evaluation; a missing decision counts as a rejection.
fn decided(records: &[RawRecord]) -> impl Iterator<Item = (&RawRecord, Evaluation, bool)> {
    records.iter().enumerate().filter_map(|(idx, record)| {
        match Evaluation::from_value(&record.evaluation) {
            Ok(evaluation) => {
                let accepted = evaluation.accept.unwrap_or(false);
                Some((record, evaluation, accepted))
            }
            Err(e) => {
                tracing::warn!(record = idx, error = %e, "edge-case scan skipping unparseable evaluation");
                None
            }
        }
    })
}

pub fn select_edge_cases(records: &[RawRecord]) -> Vec<EdgeCase> {
    let mut cases: Vec<EdgeCase> = decided(records)
        .filter_map(|(record, evaluation, accepted)| {
            let split = record.split.label();
            let even_rejected = split == EVEN_SPLIT && !accepted;
            let skewed_accepted = split == SKEWED_SPLIT && accepted;
            (even_rejected || skewed_accepted).then(|| EdgeCase::new(record, evaluation, accepted))
        })
        .collect();

    let any_skewed_accepted = cases.iter().any(|c| c.split == SKEWED_SPLIT && c.is_accepted());
    if !any_skewed_accepted {
        let fallback: Vec<EdgeCase> = decided(records)
            .filter(|(record, _, accepted)| *accepted && record.split.label() == FALLBACK_SPLIT)
            .map(|(record, evaluation, accepted)| EdgeCase::new(record, evaluation, accepted))
            .collect();
        tracing::info!(count = fallback.len(), "no accepted 7:3 offers; adding accepted 6:4 offers");
        cases.extend(fallback);
    }

    tracing::info!(count = cases.len(), "edge cases selected");
    cases
}
