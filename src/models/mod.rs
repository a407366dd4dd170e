// src/models/mod.rs
// Per-context classifiers over the summary table. Each context is fitted
// independently (in parallel); output order follows the context order.

pub mod dataset;
pub mod logistic;
pub mod tree;

use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::SummaryRow;
use crate::config::Settings;
use crate::error::{FairnessError, Result};
use crate::scenarios::{Context, Split, SplitEncoding};

use dataset::{accuracy, Dataset, FEATURES};
use logistic::{LogisticRegression, Penalty};
use tree::DecisionTree;

const TREE_SPLIT_BASE: u32 = 1;
const LOGISTIC_SPLIT_BASE: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    #[serde(rename = "Feature")]
    pub feature: String,
    #[serde(rename = "Importance")]
    pub importance: f64,
    #[serde(rename = "Context")]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    #[serde(rename = "Feature")]
    pub feature: String,
    #[serde(rename = "Coefficient")]
    pub coefficient: f64,
    #[serde(rename = "Penalty")]
    pub penalty: Penalty,
    #[serde(rename = "Context")]
    pub context: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitAccuracy {
    pub context: String,
    pub penalty: Option<Penalty>,
    pub accuracy: f64,
}

#[derive(Debug, Default)]
pub struct TreeReport {
    pub importances: Vec<FeatureImportance>,
    pub accuracies: Vec<FitAccuracy>,
    pub failures: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LogisticReport {
    pub coefficients: Vec<Coefficient>,
    pub accuracies: Vec<FitAccuracy>,
    pub failures: Vec<String>,
}

fn design(settings: &Settings) -> Result<Vec<Split>> {
    settings.simulation.parsed_splits()
}

fn fit_tree_for_context(rows: &[SummaryRow], context: &str, encoding: &SplitEncoding) -> Result<(Vec<FeatureImportance>, FitAccuracy)> {
    let data = Dataset::for_context(rows, context, encoding)?;
    let model = DecisionTree::fit(&data.x, &data.y)?;
    let acc = accuracy(&data.y, &model.predict(&data.x));
    tracing::info!(context, accuracy = %format!("{:.2}", acc), depth = model.depth(), "decision tree fitted");

    let importances = FEATURES
        .iter()
        .zip(model.feature_importances())
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.to_string(),
            importance,
            context: context.to_string(),
        })
        .collect();

    Ok((
        importances,
        FitAccuracy {
            context: context.to_string(),
            penalty: None,
            accuracy: acc,
        },
    ))
}

pub fn fit_trees(rows: &[SummaryRow], settings: &Settings) -> Result<TreeReport> {
    let encoding = SplitEncoding::new(&design(settings)?, TREE_SPLIT_BASE);
    tracing::debug!(random_state = settings.models.random_state, "fitting decision trees");

    let fits: Vec<_> = Context::ALL
        .par_iter()
        .map(|context| (context.label(), fit_tree_for_context(rows, context.label(), &encoding)))
        .collect();

    let mut report = TreeReport::default();
    for (context, fit) in fits {
        match fit {
            Ok((importances, acc)) => {
                report.importances.extend(importances);
                report.accuracies.push(acc);
            }
            Err(e) => {
                tracing::warn!(context, error = %e, "decision tree not fitted");
                report.failures.push(format!("{}: {}", context, e));
            }
        }
    }
    Ok(report)
}

fn fit_logistic_for_context(
    rows: &[SummaryRow],
    context: &str,
    penalty: Penalty,
    c: f64,
    encoding: &SplitEncoding,
) -> Result<(Vec<Coefficient>, FitAccuracy)> {
    let data = Dataset::for_context(rows, context, encoding)?;
    if !data.has_both_classes() {
        return Err(FairnessError::Model(format!(
            "context '{}' has a single accept class; logistic regression needs both",
            data.context
        )));
    }
    let model = LogisticRegression::fit(&data.x, &data.y, penalty, c)?;
    let acc = accuracy(&data.y, &model.predict(&data.x));
    tracing::info!(
        context,
        penalty = %model.penalty,
        c = model.c,
        accuracy = %format!("{:.2}", acc),
        intercept = model.intercept(),
        "logistic regression fitted"
    );

    let coefficients = FEATURES
        .iter()
        .zip(model.coefficients())
        .map(|(feature, &coefficient)| Coefficient {
            feature: feature.to_string(),
            coefficient,
            penalty,
            context: context.to_string(),
        })
        .collect();

    Ok((
        coefficients,
        FitAccuracy {
            context: context.to_string(),
            penalty: Some(penalty),
            accuracy: acc,
        },
    ))
}

pub fn fit_logistic(rows: &[SummaryRow], settings: &Settings) -> Result<LogisticReport> {
    let encoding = SplitEncoding::new(&design(settings)?, LOGISTIC_SPLIT_BASE);
    let c = settings.models.c;

    let jobs: Vec<(Context, Penalty)> = Context::ALL
        .iter()
        .flat_map(|&context| [(context, Penalty::L2), (context, Penalty::L1)])
        .collect();

    let fits: Vec<_> = jobs
        .par_iter()
        .map(|&(context, penalty)| {
            (context, penalty, fit_logistic_for_context(rows, context.label(), penalty, c, &encoding))
        })
        .collect();

    let mut report = LogisticReport::default();
    for (context, penalty, fit) in fits {
        match fit {
            Ok((coefficients, acc)) => {
                report.coefficients.extend(coefficients);
                report.accuracies.push(acc);
            }
            Err(e) => {
                tracing::warn!(context = context.label(), penalty = %penalty, error = %e, "logistic regression not fitted");
                report.failures.push(format!("{} ({}): {}", context, penalty, e));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(context: &str, condition: &str, split: &str, interpersonal: f64, informational: f64, accept: f64) -> SummaryRow {
        SummaryRow {
            condition: condition.into(),
            context: context.into(),
            split: split.into(),
            interpersonal_mean: Some(interpersonal),
            interpersonal_sd: Some(0.5),
            informational_mean: Some(informational),
            informational_sd: Some(0.5),
            accept_mean: Some(accept),
            accept_sd: Some(0.4),
        }
    }

    fn table() -> Vec<SummaryRow> {
        let mut rows = Vec::new();
        for (condition, inter, info) in [
            ("High-High", 4.8, 4.6),
            ("High-Low", 4.5, 2.0),
            ("Low-High", 1.8, 4.2),
            ("Low-Low", 1.4, 1.6),
        ] {
            for (k, split) in ["5:5", "6:4", "7:3"].iter().enumerate() {
                let collab = if inter > 3.0 || k == 0 { 0.8 } else { 0.2 };
                let compet = if inter > 3.0 && info > 3.0 && k < 2 { 0.6 } else { 0.0 };
                rows.push(summary("collaborative", condition, split, inter, info, collab));
                rows.push(summary("competitive", condition, split, inter, info, compet));
            }
        }
        rows
    }

    #[test]
    fn trees_report_three_features_per_context() {
        let report = fit_trees(&table(), &Settings::default()).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.importances.len(), 6);
        assert_eq!(report.importances[0].context, "collaborative");
        assert_eq!(report.importances[3].context, "competitive");
        assert_eq!(report.importances[0].feature, "split_encoded");
        for acc in &report.accuracies {
            assert_eq!(acc.accuracy, 1.0);
        }
        let collab_sum: f64 = report.importances[..3].iter().map(|i| i.importance).sum();
        assert!((collab_sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn logistic_reports_both_penalties_in_order() {
        let report = fit_logistic(&table(), &Settings::default()).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.coefficients.len(), 12);
        let order: Vec<_> = report
            .coefficients
            .chunks(3)
            .map(|c| (c[0].context.as_str(), c[0].penalty.label()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("collaborative", "Ridge"),
                ("collaborative", "Lasso"),
                ("competitive", "Ridge"),
                ("competitive", "Lasso"),
            ]
        );
    }

    #[test]
    fn single_class_context_is_reported_not_fatal() {
        let rows: Vec<_> = table()
            .into_iter()
            .map(|mut r| {
                if r.context == "competitive" {
                    r.accept_mean = Some(0.0);
                }
                r
            })
            .collect();
        let report = fit_logistic(&rows, &Settings::default()).unwrap();
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.coefficients.len(), 6);

        let trees = fit_trees(&rows, &Settings::default()).unwrap();
        assert!(trees.failures.is_empty());
        assert!(trees.importances[3..].iter().all(|i| i.importance == 0.0));
    }
}
