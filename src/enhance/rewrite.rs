//! Description rewrite backend.
//!
//! One rewrite call per enhancement against an OpenAI-compatible chat
//! completions endpoint. The backend is asked for a JSON envelope with
//! name/description/brand/score but free prose is accepted too. Every
//! failure mode here is recoverable by contract: callers treat any
//! error as "keep the template".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::EnhanceError;
use crate::model::Product;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const SYSTEM_INSTRUCTION: &str = "You are a professional e-commerce copywriter. Rewrite the \
    product facts into an appealing, truthful description. Respond with a JSON object with \
    fields: name, description, brand, score (0-5).";

/// Structured product facts offered to the rewrite backend. Never the
/// raw page, only fields the crawler already normalized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteFacts {
    pub name: String,
    pub brand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub discounted_price: f64,
    pub attributes: Vec<(String, String)>,
}

impl RewriteFacts {
    pub fn from_product(p: &Product) -> Self {
        Self {
            name: p.name.clone(),
            brand: p.brand.clone(),
            category: p.category.clone(),
            color: p.color.clone(),
            discounted_price: p.discounted_price,
            attributes: p
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
        }
    }
}

/// Usable output from one rewrite call.
#[derive(Debug, Clone, Default)]
pub struct RewriteOutcome {
    pub description: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub score: Option<f64>,
}

#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, facts: &RewriteFacts) -> Result<RewriteOutcome, EnhanceError>;
}

/// Stand-in when no backend is configured. Always fails, so the
/// enhancer keeps its deterministic template.
pub struct NoopRewriter;

#[async_trait]
impl Rewriter for NoopRewriter {
    async fn rewrite(&self, _facts: &RewriteFacts) -> Result<RewriteOutcome, EnhanceError> {
        Err(EnhanceError::rewrite_failed("no rewrite backend configured"))
    }
}

/// OpenAI-compatible chat completions client.
pub struct HttpRewriter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpRewriter {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Configure from `VITRIN_REWRITE_URL`, `VITRIN_REWRITE_MODEL` and
    /// `VITRIN_REWRITE_API_KEY`. Without an API key there is no
    /// backend and `None` is returned.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("VITRIN_REWRITE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())?;
        let endpoint = std::env::var("VITRIN_REWRITE_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let model = std::env::var("VITRIN_REWRITE_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Some(Self::new(endpoint, model, api_key))
    }
}

#[async_trait]
impl Rewriter for HttpRewriter {
    async fn rewrite(&self, facts: &RewriteFacts) -> Result<RewriteOutcome, EnhanceError> {
        let facts_json =
            serde_json::to_string(facts).map_err(|e| EnhanceError::rewrite_failed(e))?;
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_INSTRUCTION },
                { "role": "user", "content": facts_json },
            ],
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnhanceError::rewrite_failed(e))?;

        if !response.status().is_success() {
            return Err(EnhanceError::rewrite_failed(format!(
                "backend answered {}",
                response.status()
            )));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| EnhanceError::unusable_output(e))?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        parse_outcome(&content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Envelope shape the system instruction asks for. All fields optional;
/// models drop some routinely.
#[derive(Debug, Deserialize)]
struct RewriteEnvelope {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// Accept either the JSON envelope or plain prose. Code fences around
/// the envelope are stripped first; models add them routinely.
fn parse_outcome(content: &str) -> Result<RewriteOutcome, EnhanceError> {
    let trimmed = strip_code_fences(content);
    if trimmed.is_empty() {
        return Err(EnhanceError::unusable_output("empty completion"));
    }

    if let Ok(envelope) = serde_json::from_str::<RewriteEnvelope>(trimmed) {
        let description = envelope.description.unwrap_or_default();
        if description.trim().is_empty() {
            return Err(EnhanceError::unusable_output("envelope without description"));
        }
        return Ok(RewriteOutcome {
            description,
            name: envelope.name.filter(|s| !s.trim().is_empty()),
            brand: envelope.brand.filter(|s| !s.trim().is_empty()),
            score: envelope.score.filter(|s| (0.0..=5.0).contains(s)),
        });
    }

    debug!("rewrite output is not an envelope, treating it as prose");
    Ok(RewriteOutcome {
        description: trimmed.to_string(),
        ..Default::default()
    })
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn facts() -> RewriteFacts {
        RewriteFacts {
            name: "Acme Basic Tee".to_string(),
            brand: "Acme".to_string(),
            category: Some("Trendyol > Erkek > T-shirt".to_string()),
            color: Some("Red".to_string()),
            discounted_price: 342.39,
            attributes: vec![("material".to_string(), "Cotton".to_string())],
        }
    }

    #[test]
    fn parses_the_json_envelope() {
        let outcome = parse_outcome(
            r#"{"name":"Premium Tee","description":"Soft cotton.","brand":"Acme","score":4.8}"#,
        )
        .unwrap();
        assert_eq!(outcome.description, "Soft cotton.");
        assert_eq!(outcome.name.as_deref(), Some("Premium Tee"));
        assert_eq!(outcome.score, Some(4.8));
    }

    #[test]
    fn strips_code_fences_around_the_envelope() {
        let outcome = parse_outcome("```json\n{\"description\":\"Fenced.\"}\n```").unwrap();
        assert_eq!(outcome.description, "Fenced.");
    }

    #[test]
    fn plain_prose_becomes_the_description() {
        let outcome = parse_outcome("A lovely everyday tee.").unwrap();
        assert_eq!(outcome.description, "A lovely everyday tee.");
        assert!(outcome.name.is_none());
    }

    #[test]
    fn out_of_range_scores_are_dropped() {
        let outcome =
            parse_outcome(r#"{"description":"ok","score":87.0}"#).unwrap();
        assert!(outcome.score.is_none());
    }

    #[test]
    fn empty_and_descriptionless_output_is_unusable() {
        assert!(matches!(
            parse_outcome("   "),
            Err(EnhanceError::UnusableOutput { .. })
        ));
        assert!(matches!(
            parse_outcome(r#"{"name":"only a name"}"#),
            Err(EnhanceError::UnusableOutput { .. })
        ));
    }

    #[tokio::test]
    async fn calls_the_chat_endpoint_and_parses_the_choice() {
        let server = MockServer::start().await;
        let completion = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "{\"description\":\"Rewritten copy.\",\"score\":4.5}"
                }
            }]
        });
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion))
            .mount(&server)
            .await;

        let rewriter = HttpRewriter::new(
            format!("{}/v1/chat/completions", server.uri()),
            "test-model",
            "test-key",
        );
        let outcome = rewriter.rewrite(&facts()).await.unwrap();
        assert_eq!(outcome.description, "Rewritten copy.");
        assert_eq!(outcome.score, Some(4.5));
    }

    #[tokio::test]
    async fn backend_errors_are_rewrite_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let rewriter = HttpRewriter::new(server.uri(), "test-model", "test-key");
        assert!(matches!(
            rewriter.rewrite(&facts()).await,
            Err(EnhanceError::RewriteFailed { .. })
        ));
    }
}
