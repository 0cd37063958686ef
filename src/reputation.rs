use crate::config::CheckState;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

/// Blocklist lookup outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct BlocklistCheck {
    pub safe: bool,
    pub threat: Option<String>,
}

/// Generative classifier outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct AiCheck {
    pub safe: bool,
    pub reason: String,
}

/// Bot-detection verification outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct BotCheck {
    pub allowed: bool,
    pub score: f64,
}

/// Orchestrates the optional pre-submission second opinions: an external
/// blocklist service, a generative classifier and a bot-detection signal.
/// Every path fails open: a flaky vendor must never block a legitimate
/// submission.
#[derive(Clone)]
pub struct ReputationGateway {
    client: Client,
    blocklist: CheckState,
    ai: CheckState,
    bot: CheckState,
    min_bot_score: f64,
}

impl ReputationGateway {
    pub fn new(
        client: Client,
        blocklist: CheckState,
        ai: CheckState,
        bot: CheckState,
        min_bot_score: f64,
    ) -> Self {
        Self {
            client,
            blocklist,
            ai,
            bot,
            min_bot_score,
        }
    }

    /// Queries the Safe Browsing threat-match endpoint. Skipped entirely
    /// when no credential is configured.
    #[instrument(level = "debug", skip(self))]
    pub async fn check_blocklist(&self, url: &str) -> BlocklistCheck {
        let Some(api_key) = self.blocklist.credential() else {
            return BlocklistCheck {
                safe: true,
                threat: None,
            };
        };

        let endpoint = format!(
            "https://safebrowsing.googleapis.com/v4/threatMatches:find?key={api_key}"
        );
        let body = json!({
            "client": { "clientId": "linkshield", "clientVersion": "1.0.0" },
            "threatInfo": {
                "threatTypes": ["MALWARE", "SOCIAL_ENGINEERING", "UNWANTED_SOFTWARE"],
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{ "url": url }]
            }
        });

        let response = match self.client.post(&endpoint).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Blocklist service unreachable, failing open");
                return BlocklistCheck {
                    safe: true,
                    threat: None,
                };
            }
        };

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Blocklist response unparseable, failing open");
                return BlocklistCheck {
                    safe: true,
                    threat: None,
                };
            }
        };

        if let Some(matches) = data["matches"].as_array() {
            if let Some(first) = matches.first() {
                let threat = first["threatType"]
                    .as_str()
                    .unwrap_or("UNKNOWN")
                    .to_string();
                debug!(%url, %threat, "Blocklist match");
                return BlocklistCheck {
                    safe: false,
                    threat: Some(threat),
                };
            }
        }

        BlocklistCheck {
            safe: true,
            threat: None,
        }
    }

    /// Asks a generative classifier for a safety verdict. Malformed model
    /// output (no extractable JSON object) counts as a classifier failure
    /// and fails open.
    #[instrument(level = "debug", skip(self))]
    pub async fn check_with_ai(&self, url: &str) -> AiCheck {
        let Some(api_key) = self.ai.credential() else {
            return AiCheck {
                safe: true,
                reason: String::new(),
            };
        };

        let fail_open = || AiCheck {
            safe: true,
            reason: "AI unavailable".to_string(),
        };

        let prompt = format!(
            "Analyze URL: {url}. Is it safe (YouTube, Google, news) or unsafe \
             (porn, gambling, scam)? JSON only: {{\"safe\":true/false,\"reason\":\"\"}}"
        );
        let endpoint = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent?key={api_key}"
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.1, "maxOutputTokens": 200 }
        });

        let response = match self.client.post(&endpoint).json(&body).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "AI classifier returned an error, failing open");
                return fail_open();
            }
            Err(e) => {
                warn!(error = %e, "AI classifier unreachable, failing open");
                return fail_open();
            }
        };

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "AI classifier response unparseable, failing open");
                return fail_open();
            }
        };

        let text = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default();

        let Some(verdict) = extract_json_object(text) else {
            warn!("AI classifier produced no JSON object, failing open");
            return fail_open();
        };

        AiCheck {
            safe: verdict["safe"] != Value::Bool(false),
            reason: verdict["reason"].as_str().unwrap_or_default().to_string(),
        }
    }

    /// Verifies a bot-detection token against the configured minimum
    /// score. A missing token or an unreachable verification service is
    /// allowed through.
    #[instrument(level = "debug", skip(self, token))]
    pub async fn verify_bot_score(&self, token: Option<&str>) -> BotCheck {
        let (Some(secret), Some(token)) = (self.bot.credential(), token) else {
            return BotCheck {
                allowed: true,
                score: 1.0,
            };
        };

        let response = match self
            .client
            .post("https://www.google.com/recaptcha/api/siteverify")
            .form(&[("secret", secret), ("response", token)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Bot verification service unreachable, failing open");
                return BotCheck {
                    allowed: true,
                    score: 1.0,
                };
            }
        };

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Bot verification response unparseable, failing open");
                return BotCheck {
                    allowed: true,
                    score: 1.0,
                };
            }
        };

        if data["success"] != Value::Bool(true) {
            warn!("Bot verification rejected the token");
            return BotCheck {
                allowed: false,
                score: 0.0,
            };
        }

        let score = data["score"].as_f64().unwrap_or(0.0);
        BotCheck {
            allowed: score >= self.min_bot_score,
            score,
        }
    }
}

/// Pulls the first balanced-looking JSON object out of raw model output.
fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckState;

    fn gateway(blocklist: CheckState, ai: CheckState) -> ReputationGateway {
        ReputationGateway::new(Client::new(), blocklist, ai, CheckState::Disabled, 0.5)
    }

    #[tokio::test]
    async fn disabled_checks_default_to_safe() {
        let gateway = gateway(CheckState::Disabled, CheckState::Disabled);

        let blocklist = gateway.check_blocklist("https://example.com").await;
        assert!(blocklist.safe);
        assert_eq!(blocklist.threat, None);

        let ai = gateway.check_with_ai("https://example.com").await;
        assert!(ai.safe);
    }

    #[tokio::test]
    async fn missing_bot_token_is_allowed() {
        let gateway = gateway(CheckState::Disabled, CheckState::Disabled);

        let check = gateway.verify_bot_score(None).await;
        assert!(check.allowed);
        assert_eq!(check.score, 1.0);
    }

    #[test]
    fn test_extract_json_object() {
        let value =
            extract_json_object("```json\n{\"safe\": false, \"reason\": \"gambling\"}\n```")
                .unwrap();
        assert_eq!(value["safe"], Value::Bool(false));
        assert_eq!(value["reason"].as_str(), Some("gambling"));

        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }
}
