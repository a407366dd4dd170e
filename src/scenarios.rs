// src/scenarios.rs
// NEGOTIATION DESIGN
// Agent A conditions (interpersonal x informational fairness), Agent B contexts,
// the token splits under test, and the prompts that tie them together.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FairnessError;

const POLITE: &str = "Be polite and respectful.";
const DISMISSIVE: &str = "Be dismissive and controlling.";
const JUSTIFY: &str = "Clearly justify your proposed split, breakdown the tasks and responsibilities each agent undertakes.";
const NO_JUSTIFY: &str = "Do not justify your proposal.";

/// Agent A communication style. The first half of the label is the
/// interpersonal level, the second half the informational level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "High-High")]
    HighHigh,
    #[serde(rename = "High-Low")]
    HighLow,
    #[serde(rename = "Low-High")]
    LowHigh,
    #[serde(rename = "Low-Low")]
    LowLow,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::HighHigh,
        Condition::HighLow,
        Condition::LowHigh,
        Condition::LowLow,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Condition::HighHigh => "High-High",
            Condition::HighLow => "High-Low",
            Condition::LowHigh => "Low-High",
            Condition::LowLow => "Low-Low",
        }
    }

    pub fn is_polite(&self) -> bool {
        matches!(self, Condition::HighHigh | Condition::HighLow)
    }

    pub fn is_justified(&self) -> bool {
        matches!(self, Condition::HighHigh | Condition::LowHigh)
    }

    /// The style instruction handed to Agent A.
    pub fn style(&self) -> String {
        let tone = if self.is_polite() { POLITE } else { DISMISSIVE };
        let explanation = if self.is_justified() { JUSTIFY } else { NO_JUSTIFY };
        format!("{} {}", tone, explanation)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Condition {
    type Err = FairnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FairnessError::Parse(format!("unknown condition '{}'", s)))
    }
}

/// Agent B framing of the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Collaborative,
    Competitive,
}

impl Context {
    pub const ALL: [Context; 2] = [Context::Collaborative, Context::Competitive];

    pub fn label(&self) -> &'static str {
        match self {
            Context::Collaborative => "collaborative",
            Context::Competitive => "competitive",
        }
    }

    fn framing(&self) -> &'static str {
        match self {
            Context::Collaborative => {
                "You are working on a collaborative project where both agents need each other to succeed. \
                 You are inclined to collaborate and accept the offer, but you must be reasonable given the explanation in the proposal.\n\
                 Assess clarity of justification, and respectful tone. Accept or reject offer based on perceived fairness."
            }
            Context::Competitive => {
                "You are working on a competitive project where both agents aim to maximize their own gain, however, it has to be properly justified.\n\
                 You are inclined to compete, but you must be reasonable given the explanation in the proposal. \
                 Assess clarity of justification, and respectful tone. Accept or reject offer based on perceived fairness."
            }
        }
    }

    /// Agent B system prompt. The `explanaton_rating` spelling is part of the
    /// recorded experiment and stays as is.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are Agent B evaluating a resource split proposal in a negotiation.\n\
             {}\n\
             Give main reason for accepting or rejecting.\n\
             Respond with a JSON object:\n\
             - \"proposal\": string (Agent A's proposal message),\n\
             - \"respect_rating\": 1–5,\n\
             - \"respect_comment\": string,\n\
             - \"disrespect_example\": string,\n\
             - \"explanaton_rating\": 1–5,\n\
             - \"better_explanation\": string,\n\
             - \"accept\": true or false\n\
             - \"main_reason_for_decision\": string\n",
            self.framing()
        )
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Context {
    type Err = FairnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Context::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FairnessError::Parse(format!("unknown context '{}'", s)))
    }
}

/// Tokens allocated to Agent A and Agent B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Split {
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "B")]
    pub b: u32,
}

impl Split {
    pub const fn new(a: u32, b: u32) -> Self {
        Self { a, b }
    }

    pub fn default_design() -> Vec<Split> {
        vec![Split::new(5, 5), Split::new(6, 4), Split::new(7, 3)]
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.a, self.b)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.a, self.b)
    }
}

impl FromStr for Split {
    type Err = FairnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| FairnessError::Parse(format!("split '{}' is not of the form A:B", s)))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| FairnessError::Parse(format!("split '{}' has a non-numeric side", s)))
        };
        Ok(Split::new(parse(a)?, parse(b)?))
    }
}

/// Ordinal encoding of split labels: position in the design list plus `base`.
#[derive(Debug, Clone)]
pub struct SplitEncoding {
    labels: Vec<String>,
    base: u32,
}

impl SplitEncoding {
    pub fn new(design: &[Split], base: u32) -> Self {
        Self {
            labels: design.iter().map(Split::label).collect(),
            base,
        }
    }

    pub fn encode(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label.trim())
            .map(|idx| (idx as u32 + self.base) as f64)
    }
}

pub fn proposal_system_prompt(condition: Condition, split: Split) -> String {
    format!(
        "You are Agent A proposing a resource split in a negotiation. You must follow the communication style provided.\n\n\
         Style: {}\n\
         You are proposing the following split:\n\
         Agent A receives {} tokens.\n\
         Agent B receives {} tokens.\n\n\
         Propose the split in 1 message.\n",
        condition.style(),
        split.a,
        split.b
    )
}

pub const PROPOSAL_USER_PROMPT: &str = "Propose the split now.";

pub fn evaluation_user_prompt(proposal: &str, split: Split) -> String {
    format!(
        "Agent A has made the following proposal:\n\n\
         {}\n\n\
         The proposed split is:\n\
         Agent A: {} tokens\n\
         Agent B: {} tokens\n\n\
         Include the above proposal message in your response under the \"proposal\" field.\n\
         Evaluate this based on clarity of justification and respect, and answer in JSON format.",
        proposal, split.a, split.b
    )
}
