// src/reporter.rs
// CSV export and console tables for every stage.

use std::collections::BTreeSet;
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::aggregate::SummaryRow;
use crate::edge_cases::EdgeCase;
use crate::error::Result;
use crate::models::{Coefficient, FeatureImportance, FitAccuracy};
use crate::normalize::FlatRecord;

pub struct Reporter;

fn acceptance<'a>(rows: impl Iterator<Item = &'a FlatRecord>) -> (usize, f64) {
    let (n, accepted) = rows.fold((0usize, 0usize), |(n, a), r| (n + 1, a + usize::from(r.accept)));
    let pct = if n == 0 { 0.0 } else { accepted as f64 / n as f64 * 100.0 };
    (n, pct)
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| format!("{:.6}", v))
}

fn failure_lines(stage: &str, failures: &[String]) -> Vec<String> {
    if failures.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("⚠️  {} {} fit(s) skipped:", failures.len(), stage)];
    lines.extend(failures.iter().map(|f| format!("  - {}", f)));
    lines
}

impl Reporter {
    /// Header row comes from the serde field names.
    pub fn export_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
        let mut wtr = Writer::from_path(path)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        tracing::info!(path = %path.display(), rows = rows.len(), "CSV exported");
        Ok(())
    }

    pub fn print_summary_table(rows: &[SummaryRow]) {
        println!(
            "{:<10} {:<14} {:<5} {:>18} {:>16} {:>18} {:>16} {:>11} {:>11}",
            "Condition",
            "Context",
            "Split",
            "interpersonal_mean",
            "interpersonal_sd",
            "informational_mean",
            "informational_sd",
            "accept_mean",
            "accept_sd"
        );
        for r in rows {
            println!(
                "{:<10} {:<14} {:<5} {:>18} {:>16} {:>18} {:>16} {:>11} {:>11}",
                r.condition,
                r.context,
                r.split,
                cell(r.interpersonal_mean),
                cell(r.interpersonal_sd),
                cell(r.informational_mean),
                cell(r.informational_sd),
                cell(r.accept_mean),
                cell(r.accept_sd)
            );
        }
    }

    /// Acceptance rate per context and per condition.
    pub fn print_run_summary(rows: &[FlatRecord], skipped: usize) {
        println!("\nSIMULATION SUMMARY");
        println!("------------------------------------------");
        println!("Evaluations parsed: {}", rows.len());
        println!("Evaluations skipped: {}", skipped);

        let contexts: BTreeSet<&str> = rows.iter().map(|r| r.context.as_str()).collect();
        println!("\nAcceptance by context:");
        for context in contexts {
            let (n, pct) = acceptance(rows.iter().filter(|r| r.context == context));
            println!("  {:<14} {:>5.1}%  (n={})", context, pct, n);
        }

        let conditions: BTreeSet<&str> = rows.iter().map(|r| r.condition.as_str()).collect();
        println!("\nAcceptance by condition:");
        for condition in conditions {
            let (n, pct) = acceptance(rows.iter().filter(|r| r.condition == condition));
            println!("  {:<14} {:>5.1}%  (n={})", condition, pct, n);
        }
        println!("------------------------------------------\n");
    }

    pub fn print_accuracies(accuracies: &[FitAccuracy]) {
        for acc in accuracies {
            match acc.penalty {
                Some(penalty) => println!(
                    "Accuracy for context '{}' with penalty '{}': {:.2}",
                    acc.context, penalty, acc.accuracy
                ),
                None => println!("Accuracy for context '{}': {:.2}", acc.context, acc.accuracy),
            }
        }
    }

    pub fn print_importances(rows: &[FeatureImportance]) {
        println!("{:<20} {:>10}  {}", "Feature", "Importance", "Context");
        for r in rows {
            println!("{:<20} {:>10.6}  {}", r.feature, r.importance, r.context);
        }
    }

    pub fn print_coefficients(rows: &[Coefficient]) {
        println!("{:<20} {:>12}  {:<6} {}", "Feature", "Coefficient", "Penalty", "Context");
        for r in rows {
            println!(
                "{:<20} {:>12.6}  {:<6} {}",
                r.feature,
                r.coefficient,
                r.penalty.label(),
                r.context
            );
        }
    }

    /// Fits that were skipped (e.g. a single-class context). Prints nothing when all succeeded.
    pub fn print_failures(stage: &str, failures: &[String]) {
        for line in failure_lines(stage, failures) {
            println!("{}", line);
        }
    }

    pub fn print_edge_cases(cases: &[EdgeCase], limit: usize) {
        println!("Edge cases selected: {}", cases.len());
        for case in cases.iter().take(limit) {
            let preview: String = case.proposal_message.chars().take(70).collect();
            println!(
                "  [{}] {} | {} | {} | \"{}\"",
                case.context, case.split, case.accepted, case.condition, preview
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::logistic::Penalty;

    #[test]
    fn export_uses_serde_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coef.csv");
        let rows = vec![Coefficient {
            feature: "split_encoded".into(),
            coefficient: -1.25,
            penalty: Penalty::L1,
            context: "competitive".into(),
        }];
        Reporter::export_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Feature,Coefficient,Penalty,Context\nsplit_encoded,-1.25,Lasso,competitive\n");
    }

    #[test]
    fn skipped_fits_are_listed_under_a_count() {
        assert!(failure_lines("logistic", &[]).is_empty());

        let failures = vec![
            "competitive (l2): model error: single class".to_string(),
            "competitive (l1): model error: single class".to_string(),
        ];
        let lines = failure_lines("logistic", &failures);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("2 logistic fit(s) skipped"));
        assert_eq!(lines[1], "  - competitive (l2): model error: single class");
        assert_eq!(lines[2], "  - competitive (l1): model error: single class");
    }

    #[test]
    fn missing_values_print_as_nan() {
        assert_eq!(cell(None), "NaN");
        assert_eq!(cell(Some(0.5)), "0.500000");
    }
}
