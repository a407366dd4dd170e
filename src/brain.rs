// src/brain.rs
// TEXT GENERATION BRIDGE
// One trait, two engines: the OpenAI-compatible HTTP client used for real runs,
// and a seeded offline engine that produces look-alike output for dry runs.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::config::LlmSettings;
use crate::error::{FairnessError, Result};
use crate::scenarios::{Context, Split, PROPOSAL_USER_PROMPT};

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub seed: Option<u64>,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait Brain: Send + Sync {
    async fn generate(&self, request: &ChatRequest) -> Result<String>;
}

pub struct OpenAiBrain {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiBrain {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| FairnessError::Config("missing API key (set OPENAI_API_KEY)".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            api_key,
        })
    }

    fn completions_url(&self) -> String {
        if self.base_url.ends_with('/') {
            format!("{}chat/completions", self.base_url)
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ],
            "temperature": request.temperature,
        });
        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl Brain for OpenAiBrain {
    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FairnessError::Llm(format!("API error ({}): {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FairnessError::Llm(format!("failed to parse JSON: {}", e)))?;

        completion_text(&json)
    }
}

/// `choices[0].message.content`, trimmed.
fn completion_text(json: &serde_json::Value) -> Result<String> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| FairnessError::Llm("invalid response format".to_string()))
}

/// Offline engine. Reads the style, split and context back out of the prompts
/// and answers the way a cooperative model would, with seeded noise.
pub struct DemoBrain {
    rng: Mutex<StdRng>,
}

impl DemoBrain {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn propose(&self, rng: &mut StdRng, system: &str) -> Result<String> {
        let split = split_after(system, "Agent A receives ", "Agent B receives ")?;
        let polite = system.contains("Be polite");
        let justified = system.contains("Clearly justify");

        let opener = if polite {
            ["Hi there, I hope you're doing well.", "Thank you for working with me on this."]
                [rng.gen_range(0..2)]
        } else {
            ["Here's how this is going to go.", "Listen, I've decided."][rng.gen_range(0..2)]
        };
        let offer = format!("I propose that I take {} tokens and you take {}.", split.a, split.b);
        let reason = if justified {
            " This is because I will handle the planning, coordination and final delivery, \
             while you focus on the research tasks."
        } else {
            ""
        };
        let closer = if polite {
            " I'd appreciate your thoughts."
        } else {
            " Take it or leave it."
        };
        Ok(format!("{} {}{}{}", opener, offer, reason, closer))
    }

    fn evaluate(&self, rng: &mut StdRng, request: &ChatRequest) -> Result<String> {
        let split = split_after(&request.user, "Agent A: ", "Agent B: ")?;
        let context = if request.system.contains("competitive project") {
            Context::Competitive
        } else {
            Context::Collaborative
        };
        let polite = request.user.contains("appreciate") || request.user.contains("Thank you");
        let justified = request.user.contains("because");

        let respect: i64 = if polite { rng.gen_range(4..=5) } else { rng.gen_range(1..=2) };
        let explanation: i64 = if justified { rng.gen_range(4..=5) } else { rng.gen_range(1..=3) };

        let skew = split.a.saturating_sub(split.b) as f64 / 2.0;
        let base = match context {
            Context::Collaborative => 0.8,
            Context::Competitive => 0.5,
        };
        let p_accept = (base + 0.1 * (respect as f64 - 3.0) + 0.1 * (explanation as f64 - 3.0)
            - 0.15 * skew)
            .clamp(0.02, 0.98);
        let accept = rng.gen_bool(p_accept);

        let proposal = request
            .user
            .split("\n\n")
            .nth(1)
            .unwrap_or_default()
            .to_string();
        let explanation_key = if rng.gen_bool(0.5) {
            "explanaton_rating"
        } else {
            "explanation_rating"
        };

        let mut evaluation = json!({
            "proposal": proposal,
            "respect_rating": respect,
            "respect_comment": if polite { "The tone was courteous." } else { "The tone was curt and controlling." },
            "disrespect_example": if polite { "" } else { "Take it or leave it." },
            "better_explanation": if justified { "The task breakdown was clear." } else { "Explain why the split is fair." },
            "accept": accept,
            "main_reason_for_decision": if accept { "The split is acceptable given the explanation." } else { "The split feels unfair." },
        });
        evaluation[explanation_key] = json!(explanation);

        let text = serde_json::to_string_pretty(&evaluation)?;
        if rng.gen_bool(0.25) {
            Ok(format!("```json\n{}\n```", text))
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl Brain for DemoBrain {
    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| FairnessError::Llm("demo generator lock poisoned".to_string()))?;
        if request.user == PROPOSAL_USER_PROMPT {
            self.propose(&mut rng, &request.system)
        } else {
            self.evaluate(&mut rng, request)
        }
    }
}

/// Pulls "N tokens" following each marker out of a prompt.
fn split_after(text: &str, marker_a: &str, marker_b: &str) -> Result<Split> {
    let number_after = |marker: &str| -> Result<u32> {
        let start = text
            .find(marker)
            .ok_or_else(|| FairnessError::Parse(format!("prompt lacks '{}'", marker.trim())))?
            + marker.len();
        text[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .map_err(|_| FairnessError::Parse(format!("no token count after '{}'", marker.trim())))
    };
    Ok(Split::new(number_after(marker_a)?, number_after(marker_b)?))
}
