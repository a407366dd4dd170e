// src/models/dataset.rs
// Design matrix for one context: [split_encoded, interpersonal_mean, informational_mean],
// target = accept_mean >= 0.5.

use crate::aggregate::SummaryRow;
use crate::error::{FairnessError, Result};
use crate::scenarios::SplitEncoding;

pub const FEATURES: [&str; 3] = ["split_encoded", "interpersonal_mean", "informational_mean"];
pub const ACCEPT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub context: String,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<u8>,
}

impl Dataset {
    pub fn for_context(rows: &[SummaryRow], context: &str, encoding: &SplitEncoding) -> Result<Self> {
        let mut x = Vec::new();
        let mut y = Vec::new();

        for row in rows.iter().filter(|r| r.context == context) {
            let features = (
                encoding.encode(&row.split),
                row.interpersonal_mean,
                row.informational_mean,
                row.accept_mean,
            );
            match features {
                (Some(split), Some(interpersonal), Some(informational), Some(accept)) => {
                    x.push(vec![split, interpersonal, informational]);
                    y.push(u8::from(accept >= ACCEPT_THRESHOLD));
                }
                _ => tracing::warn!(
                    context,
                    condition = %row.condition,
                    split = %row.split,
                    "dropping summary row with unknown split or missing values"
                ),
            }
        }

        if x.is_empty() {
            return Err(FairnessError::Model(format!("no usable rows for context '{}'", context)));
        }
        Ok(Self {
            context: context.to_string(),
            x,
            y,
        })
    }

    pub fn has_both_classes(&self) -> bool {
        self.y.iter().any(|&c| c == 0) && self.y.iter().any(|&c| c == 1)
    }
}

pub fn accuracy(truth: &[u8], predicted: &[u8]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(a, b)| a == b).count();
    hits as f64 / truth.len() as f64
}
