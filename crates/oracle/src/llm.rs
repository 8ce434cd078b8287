// In crates/oracle/src/llm.rs

use async_trait::async_trait;
use core_types::Snapshot;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::types::LlmSettings;
use crate::{DecisionOracle, Error, Result};

/// Asks an OpenAI-compatible chat endpoint for a trading decision.
pub struct LlmOracle {
    client: reqwest::Client,
    settings: LlmSettings,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl LlmOracle {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    /// One chat-completion round trip, returning the assistant text.
    pub(crate) async fn chat(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.settings.base_url);
        let body = json!({
            "model": self.settings.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }
        Ok(content)
    }

    fn build_prompt(&self, snapshot: &Snapshot, signed_exposure: f64, equity: Decimal) -> String {
        let mut indicator_lines = snapshot
            .indicators
            .iter()
            .map(|(name, value)| format!("- {name}: {value:.4}"))
            .collect::<Vec<_>>();
        indicator_lines.sort();
        let indicators = if indicator_lines.is_empty() {
            "- none available".to_string()
        } else {
            indicator_lines.join("\n")
        };

        format!(
            "You are an automated trading agent for {symbol}.\n\
             \n\
             MARKET:\n\
             - Price: {price}\n\
             - Bid: {bid}, Ask: {ask}\n\
             \n\
             INDICATORS:\n\
             {indicators}\n\
             \n\
             ACCOUNT:\n\
             - Equity: {equity}\n\
             - Current net position: {signed_exposure} (positive = long, negative = short, 0 = flat)\n\
             \n\
             Decide the next action. Respond with ONLY a JSON object, no prose:\n\
             {{\"action\": \"long\"|\"short\"|\"close\"|\"hold\",\n\
             \x20 \"size_pct\": <fraction of equity, 0.0-1.0>,\n\
             \x20 \"confidence\": <0.0-1.0>,\n\
             \x20 \"position_type\": \"swing\"|\"scalp\",\n\
             \x20 \"reason\": \"<one sentence>\",\n\
             \x20 \"stop_loss\": <price or omit>,\n\
             \x20 \"take_profit\": <price or omit>}}",
            symbol = snapshot.symbol,
            price = snapshot.price,
            bid = snapshot.bid,
            ask = snapshot.ask,
        )
    }
}

#[async_trait]
impl DecisionOracle for LlmOracle {
    async fn produce_decision(
        &self,
        snapshot: &Snapshot,
        signed_exposure: f64,
        equity: Decimal,
    ) -> Result<String> {
        let prompt = self.build_prompt(snapshot, signed_exposure, equity);
        let raw = self.chat(&prompt).await?;
        debug!(symbol = %snapshot.symbol, bytes = raw.len(), "LLM decision received");
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}
