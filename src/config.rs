// src/config.rs
// Layered settings: built-in defaults -> fairness.toml -> FAIRNESS_* environment.
// Nested keys use a double underscore in the environment, e.g. FAIRNESS_LLM__MODEL.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{FairnessError, Result};
use crate::scenarios::Split;

pub const DEFAULT_CONFIG_FILE: &str = "fairness.toml";
const ENV_PREFIX: &str = "FAIRNESS_";
const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub proposal_temperature: f32,
    pub evaluation_temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            api_key: None,
            proposal_temperature: 0.7,
            evaluation_temperature: 0.6,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSettings {
    pub iterations: u32,
    pub base_seed: u64,
    pub splits: Vec<String>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            iterations: 5,
            base_seed: 40,
            splits: Split::default_design().iter().map(Split::label).collect(),
        }
    }
}

impl SimulationSettings {
    pub fn parsed_splits(&self) -> Result<Vec<Split>> {
        if self.splits.is_empty() {
            return Err(FairnessError::Config("simulation.splits is empty".to_string()));
        }
        self.splits.iter().map(|s| s.parse()).collect()
    }
}

/// Where every stage reads from and writes to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathSettings {
    pub raw: PathBuf,
    pub summary: PathBuf,
    pub images: PathBuf,
    pub edge_cases: PathBuf,
    pub importance: PathBuf,
    pub coefficients: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            raw: PathBuf::from("agent_b_evaluation_contexts.json"),
            summary: PathBuf::from("summary_table.csv"),
            images: PathBuf::from("images"),
            edge_cases: PathBuf::from("edge_case_evaluations.csv"),
            importance: PathBuf::from("feature_importance.csv"),
            coefficients: PathBuf::from("logistic_coefficients.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSettings {
    pub random_state: u64,
    pub c: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            random_state: 42,
            c: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub models: ModelSettings,
}

impl Settings {
    /// Load settings. An explicitly named file must exist; the default
    /// `fairness.toml` is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(FairnessError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let mut settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        if settings.llm.api_key.is_none() {
            settings.llm.api_key = std::env::var(API_KEY_VAR).ok().filter(|k| !k.is_empty());
        }

        tracing::debug!(file = %file.display(), "settings loaded");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_experiment_design() {
        let s = Settings::default();
        assert_eq!(s.llm.model, "gpt-4");
        assert_eq!(s.simulation.iterations, 5);
        assert_eq!(s.simulation.base_seed, 40);
        assert_eq!(s.models.random_state, 42);
        assert_eq!(s.paths.summary, PathBuf::from("summary_table.csv"));
        let splits = s.simulation.parsed_splits().unwrap();
        assert_eq!(splits, vec![Split::new(5, 5), Split::new(6, 4), Split::new(7, 3)]);
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [llm]
                model = "gpt-4o-mini"

                [simulation]
                iterations = 2
                splits = ["5:5", "8:2"]
                "#,
            )?;
            jail.set_env("FAIRNESS_SIMULATION__ITERATIONS", "3");
            jail.set_env("OPENAI_API_KEY", "sk-test");

            let s = Settings::load(None).map_err(|e| e.to_string())?;
            assert_eq!(s.llm.model, "gpt-4o-mini");
            assert_eq!(s.simulation.iterations, 3);
            assert_eq!(s.simulation.base_seed, 40);
            assert_eq!(s.llm.api_key.as_deref(), Some("sk-test"));
            let splits = s.simulation.parsed_splits().map_err(|e| e.to_string())?;
            assert_eq!(splits[1], Split::new(8, 2));
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/no/such/fairness.toml"))).unwrap_err();
        assert!(matches!(err, FairnessError::Config(_)));
    }

    #[test]
    fn empty_split_list_rejected() {
        let sim = SimulationSettings {
            splits: vec![],
            ..SimulationSettings::default()
        };
        assert!(sim.parsed_splits().is_err());
    }
}
