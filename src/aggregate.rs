// src/aggregate.rs
// Per (Condition, Context, Split) means and sample standard deviations.

use std::collections::BTreeMap;
use std::path::Path;

use csv::Reader;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::normalize::FlatRecord;
use crate::reporter::Reporter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(rename = "Condition")]
    pub condition: String,
    #[serde(rename = "Context")]
    pub context: String,
    #[serde(rename = "Split")]
    pub split: String,
    pub interpersonal_mean: Option<f64>,
    pub interpersonal_sd: Option<f64>,
    pub informational_mean: Option<f64>,
    pub informational_sd: Option<f64>,
    pub accept_mean: Option<f64>,
    pub accept_sd: Option<f64>,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_sd(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

#[derive(Default)]
struct GroupValues {
    respect: Vec<f64>,
    explanation: Vec<f64>,
    accept: Vec<f64>,
}

pub fn summarize(rows: &[FlatRecord]) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<(String, String, String), GroupValues> = BTreeMap::new();

    for row in rows {
        let group = groups
            .entry((row.condition.clone(), row.context.clone(), row.split.clone()))
            .or_default();
        group.respect.extend(row.respect_rating);
        group.explanation.extend(row.explanation_rating);
        group.accept.push(f64::from(row.accept));
    }

    groups
        .into_iter()
        .map(|((condition, context, split), values)| SummaryRow {
            condition,
            context,
            split,
            interpersonal_mean: mean(&values.respect),
            interpersonal_sd: sample_sd(&values.respect),
            informational_mean: mean(&values.explanation),
            informational_sd: sample_sd(&values.explanation),
            accept_mean: mean(&values.accept),
            accept_sd: sample_sd(&values.accept),
        })
        .collect()
}

pub fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    Reporter::export_csv(path, rows)
}

pub fn read_summary(path: &Path) -> Result<Vec<SummaryRow>> {
    let mut rdr = Reader::from_path(path)?;
    let rows = rdr.deserialize().collect::<std::result::Result<Vec<SummaryRow>, _>>()?;
    tracing::debug!(path = %path.display(), groups = rows.len(), "summary table read");
    Ok(rows)
}
