//! OpenRouter chat completions client (OpenAI-compatible wire format).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use eventfeed_shared::{EventFeedError, Result};

use crate::{StructuredCompletion, StructuredModel, StructuredPrompt};

const USER_AGENT: &str = concat!("EventFeed/", env!("CARGO_PKG_VERSION"));

/// Longest provider error text kept in an error message.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
    /// OpenRouter reports some upstream failures in a 200 body.
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

impl ProviderError {
    /// HTTP status carried in `code`, sent either as a number or a string.
    fn status(&self) -> Option<StatusCode> {
        let code = match self.code.as_ref()? {
            serde_json::Value::Number(n) => u16::try_from(n.as_u64()?).ok()?,
            serde_json::Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        StatusCode::from_u16(code).ok()
    }
}

/// Client for `POST {base_url}/chat/completions` with strict JSON schema output.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterClient {
    /// Create a client against `base_url` (normally `https://openrouter.ai/api/v1`).
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| EventFeedError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

/// Classify a provider failure: 429 or a quota message is a quota error.
fn provider_error(status: Option<StatusCode>, body: &str) -> EventFeedError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = match status {
        Some(status) => format!("OpenRouter API error {status}: {body}"),
        None => format!("OpenRouter API error: {body}"),
    };

    if status == Some(StatusCode::TOO_MANY_REQUESTS) || body.to_lowercase().contains("quota") {
        EventFeedError::QuotaExceeded(message)
    } else {
        EventFeedError::Extraction(message)
    }
}

#[async_trait]
impl StructuredModel for OpenRouterClient {
    #[instrument(skip_all, fields(model = %prompt.model))]
    async fn complete_structured(&self, prompt: &StructuredPrompt) -> Result<StructuredCompletion> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &prompt.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &prompt.schema_name,
                    strict: true,
                    schema: &prompt.schema,
                },
            },
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EventFeedError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "language model request rejected");
            return Err(provider_error(Some(status), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EventFeedError::Extraction(format!("failed to parse OpenRouter response: {e}")))?;

        if let Some(error) = parsed.error {
            let status = error.status();
            warn!(status = ?status, "language model reported an error");
            return Err(provider_error(status, &error.message));
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| EventFeedError::Extraction("language model returned no content".into()))?;

        let usage = parsed.usage.unwrap_or_default();
        debug!(
            tokens_in = usage.prompt_tokens,
            tokens_out = usage.completion_tokens,
            duration_ms = start.elapsed().as_millis() as u64,
            "structured completion received"
        );

        Ok(StructuredCompletion {
            content,
            model: parsed.model.unwrap_or_else(|| prompt.model.clone()),
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenRouterClient {
        OpenRouterClient::new("sk-or-test", server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn prompt() -> StructuredPrompt {
        StructuredPrompt {
            model: "google/gemini-2.5-flash".into(),
            system: "system rules".into(),
            user: "search results".into(),
            schema_name: "event_extraction".into(),
            schema: json!({"type": "object", "properties": {}, "additionalProperties": false}),
        }
    }

    #[tokio::test]
    async fn sends_strict_schema_and_reads_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-or-test"))
            .and(body_partial_json(json!({
                "model": "google/gemini-2.5-flash",
                "temperature": 0.0,
                "messages": [
                    {"role": "system", "content": "system rules"},
                    {"role": "user", "content": "search results"}
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "event_extraction", "strict": true}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "google/gemini-2.5-flash",
                "choices": [{"message": {"role": "assistant", "content": "{\"events\":[]}"}}],
                "usage": {"prompt_tokens": 120, "completion_tokens": 8}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = client_for(&server).complete_structured(&prompt()).await.unwrap();

        assert_eq!(completion.content, r#"{"events":[]}"#);
        assert_eq!(completion.tokens_in, 120);
        assert_eq!(completion.tokens_out, 8);
        assert_eq!(completion.model, "google/gemini-2.5-flash");
    }

    #[tokio::test]
    async fn status_429_is_quota() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete_structured(&prompt()).await.unwrap_err();
        assert!(matches!(err, EventFeedError::QuotaExceeded(_)));
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn quota_message_is_quota() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string(r#"{"error":{"message":"Key quota exhausted"}}"#),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).complete_structured(&prompt()).await.unwrap_err();
        assert!(matches!(err, EventFeedError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn other_status_is_extraction_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete_structured(&prompt()).await.unwrap_err();
        assert!(matches!(err, EventFeedError::Extraction(_)));
        assert!(!err.is_quota());
        assert!(err.to_string().contains("model crashed"));
    }

    #[tokio::test]
    async fn error_object_in_ok_body_is_classified() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": 429, "message": "Provider returned error"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete_structured(&prompt()).await.unwrap_err();
        assert!(matches!(err, EventFeedError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn string_error_code_is_classified() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": "429", "message": "Provider returned error"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete_structured(&prompt()).await.unwrap_err();
        assert!(matches!(err, EventFeedError::QuotaExceeded(_)));
        assert!(err.to_string().contains("429 Too Many Requests"));
    }

    #[test]
    fn provider_error_code_forms() {
        let parse = |body: serde_json::Value| serde_json::from_value::<ProviderError>(body).unwrap().status();

        assert_eq!(parse(json!({"code": 502})), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(parse(json!({"code": "503"})), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(parse(json!({"code": "rate_limited"})), None);
        assert_eq!(parse(json!({"code": null})), None);
        assert_eq!(parse(json!({"message": "no code"})), None);
    }

    #[tokio::test]
    async fn empty_choices_is_extraction_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).complete_structured(&prompt()).await.unwrap_err();
        assert!(matches!(err, EventFeedError::Extraction(_)));
    }
}
