// src/simulation.rs
// Negotiation driver: Agent A proposes once per (condition, split, iteration),
// Agent B evaluates that same proposal under every context.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::brain::{Brain, ChatRequest};
use crate::config::Settings;
use crate::error::{FairnessError, Result};
use crate::scenarios::{
    evaluation_user_prompt, proposal_system_prompt, Condition, Context, Split, PROPOSAL_USER_PROMPT,
};

/// One Agent B evaluation as written to the raw results file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    #[serde(default)]
    pub context: Option<String>,
    pub condition: String,
    pub iteration: u32,
    pub split: Split,
    #[serde(default)]
    pub proposal: String,
    // Either the model's reply text or an already-decoded object.
    pub evaluation: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl RawRecord {
    pub fn context_label(&self) -> &str {
        self.context.as_deref().unwrap_or("unknown")
    }
}

#[derive(Clone, Debug)]
pub struct Design {
    pub conditions: Vec<Condition>,
    pub contexts: Vec<Context>,
    pub splits: Vec<Split>,
    pub iterations: u32,
    pub base_seed: u64,
    pub proposal_temperature: f32,
    pub evaluation_temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Design {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            conditions: Condition::ALL.to_vec(),
            contexts: Context::ALL.to_vec(),
            splits: settings.simulation.parsed_splits()?,
            iterations: settings.simulation.iterations,
            base_seed: settings.simulation.base_seed,
            proposal_temperature: settings.llm.proposal_temperature,
            evaluation_temperature: settings.llm.evaluation_temperature,
            max_tokens: settings.llm.max_tokens,
        })
    }

    pub fn total_evaluations(&self) -> usize {
        self.conditions.len() * self.splits.len() * self.iterations as usize * self.contexts.len()
    }
}

pub fn timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub async fn run_simulations(brain: &dyn Brain, design: &Design) -> Result<Vec<RawRecord>> {
    let last_offset = u64::from(design.iterations.saturating_sub(1));
    if design.base_seed.checked_add(last_offset).is_none() {
        return Err(FairnessError::Config(format!(
            "seed {} plus {} iterations overflows u64",
            design.base_seed, design.iterations
        )));
    }

    let run_id = Uuid::new_v4();
    let total = design.total_evaluations();
    let mut results = Vec::with_capacity(total);

    tracing::info!(%run_id, total, iterations = design.iterations, "starting negotiation runs");

    for &condition in &design.conditions {
        for &split in &design.splits {
            for i in 0..design.iterations {
                let seed = design.base_seed + u64::from(i);

                let proposal = brain
                    .generate(&ChatRequest {
                        system: proposal_system_prompt(condition, split),
                        user: PROPOSAL_USER_PROMPT.to_string(),
                        temperature: design.proposal_temperature,
                        seed: Some(seed),
                        max_tokens: design.max_tokens,
                    })
                    .await?;

                for &context in &design.contexts {
                    let evaluation = brain
                        .generate(&ChatRequest {
                            system: context.system_prompt(),
                            user: evaluation_user_prompt(&proposal, split),
                            temperature: design.evaluation_temperature,
                            seed: None,
                            max_tokens: design.max_tokens,
                        })
                        .await?;

                    tracing::info!(
                        "[{}/{}] [{}] {} | Split {} | Iteration {}",
                        results.len() + 1,
                        total,
                        context.label().to_uppercase(),
                        condition,
                        split,
                        i + 1
                    );
                    tracing::debug!(%proposal, %evaluation, "exchange");

                    results.push(RawRecord {
                        context: Some(context.label().to_string()),
                        condition: condition.label().to_string(),
                        iteration: i + 1,
                        split,
                        proposal: proposal.clone(),
                        evaluation: Value::String(evaluation),
                        timestamp: Some(timestamp()),
                        run_id: Some(run_id),
                    });
                }
            }
        }
    }

    Ok(results)
}

pub fn save_raw(path: &Path, records: &[RawRecord]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), records = records.len(), "raw results saved");
    Ok(())
}

pub fn load_raw(path: &Path) -> Result<Vec<RawRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let records: Vec<RawRecord> = serde_json::from_reader(reader)?;
    tracing::info!(path = %path.display(), records = records.len(), "raw results loaded");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::DemoBrain;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and answers with canned text.
    struct ScriptedBrain {
        requests: Mutex<Vec<ChatRequest>>,
        fail_after: Option<usize>,
    }

    impl ScriptedBrain {
        fn new(fail_after: Option<usize>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail_after,
            }
        }
    }

    #[async_trait]
    impl Brain for ScriptedBrain {
        async fn generate(&self, request: &ChatRequest) -> Result<String> {
            let mut requests = self.requests.lock().unwrap();
            if self.fail_after == Some(requests.len()) {
                return Err(FairnessError::Llm("API error (500): boom".into()));
            }
            requests.push(request.clone());
            if request.user == PROPOSAL_USER_PROMPT {
                Ok(format!("proposal #{}", requests.len()))
            } else {
                Ok(r#"{"respect_rating": 3, "explanaton_rating": 3, "accept": true}"#.to_string())
            }
        }
    }

    fn small_design() -> Design {
        Design {
            conditions: vec![Condition::HighHigh, Condition::LowLow],
            contexts: Context::ALL.to_vec(),
            splits: vec![Split::new(5, 5), Split::new(7, 3)],
            iterations: 2,
            base_seed: 40,
            proposal_temperature: 0.7,
            evaluation_temperature: 0.6,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn one_proposal_is_shared_across_contexts() {
        let brain = ScriptedBrain::new(None);
        let design = small_design();
        let records = run_simulations(&brain, &design).await.unwrap();

        assert_eq!(records.len(), design.total_evaluations());
        assert_eq!(records.len(), 16);

        for pair in records.chunks(2) {
            assert_eq!(pair[0].proposal, pair[1].proposal);
            assert_eq!(pair[0].context.as_deref(), Some("collaborative"));
            assert_eq!(pair[1].context.as_deref(), Some("competitive"));
        }
        assert_eq!(records[0].condition, "High-High");
        assert_eq!(records[0].iteration, 1);
        assert_eq!(records[2].iteration, 2);
        assert_eq!(records[15].split, Split::new(7, 3));

        let requests = brain.requests.lock().unwrap();
        let seeds: Vec<_> = requests
            .iter()
            .filter(|r| r.user == PROPOSAL_USER_PROMPT)
            .map(|r| r.seed)
            .collect();
        assert_eq!(seeds[..2], [Some(40), Some(41)]);
        assert!(requests
            .iter()
            .filter(|r| r.user != PROPOSAL_USER_PROMPT)
            .all(|r| r.seed.is_none() && (r.temperature - 0.6).abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn generation_failure_aborts_the_run() {
        let brain = ScriptedBrain::new(Some(4));
        let err = run_simulations(&brain, &small_design()).await.unwrap_err();
        assert!(matches!(err, FairnessError::Llm(_)));
    }

    #[tokio::test]
    async fn seed_range_overflow_is_rejected_before_generating() {
        let brain = ScriptedBrain::new(None);
        let design = Design {
            base_seed: u64::MAX,
            ..small_design()
        };
        let err = run_simulations(&brain, &design).await.unwrap_err();
        assert!(matches!(err, FairnessError::Config(_)), "{}", err);
        assert!(brain.requests.lock().unwrap().is_empty());

        let brain = ScriptedBrain::new(None);
        let design = Design {
            base_seed: u64::MAX - 1,
            ..small_design()
        };
        run_simulations(&brain, &design).await.unwrap();
        let requests = brain.requests.lock().unwrap();
        assert_eq!(requests[0].seed, Some(u64::MAX - 1));
        assert!(requests.iter().any(|r| r.seed == Some(u64::MAX)));
    }

    #[tokio::test]
    async fn raw_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.json");
        let records = run_simulations(&DemoBrain::new(3), &small_design()).await.unwrap();

        save_raw(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"A\": 5"));
        assert_eq!(load_raw(&path).unwrap(), records);
    }

    #[test]
    fn loads_records_without_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"[{"condition": "High-Low", "iteration": 1, "split": {"A": 6, "B": 4},
                 "proposal": "Hello", "evaluation": {"accept": false}}]"#,
        )
        .unwrap();
        let records = load_raw(&path).unwrap();
        assert_eq!(records[0].context_label(), "unknown");
        assert!(records[0].run_id.is_none());
        assert!(records[0].evaluation.is_object());
    }
}
