//! Gemini embedding and generation providers over the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerativeModel;

/// The default Generative Language API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// The default generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default embedding dimensions for `gemini-embedding-001`.
const DEFAULT_DIMENSIONS: usize = 3072;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const PROVIDER: &str = "Gemini";

/// Shared HTTP plumbing for Gemini model endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a client for the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the API key is empty or the HTTP client
    /// cannot be constructed.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::Config("Gemini API key must not be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http, api_key, base_url: DEFAULT_BASE_URL.to_string() })
    }

    /// Create a client using the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY").map_err(|_| {
            RagError::Config("GOOGLE_API_KEY environment variable not set".to_string())
        })?;
        Self::new(api_key)
    }

    /// Point the client at another endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{method}", self.base_url, model_path(model))
    }

    /// POST `body` to `model:method` and decode the JSON response.
    ///
    /// Errors are returned as messages; callers wrap them in the error kind
    /// of the service they represent.
    async fn post<B, R>(&self, model: &str, method: &str, body: &B) -> std::result::Result<R, String>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(model, method))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json::<R>().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

/// `models/<name>` form of a model identifier.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") }
}

// ── API request/response types ─────────────────────────────────────

/// Intended use of an embedding, which the API optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(role: Option<&'a str>, text: &'a str) -> Self {
        Self { role, parts: vec![Part { text }] }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Text of the first candidate, or why there is none.
fn response_text(response: GenerateContentResponse) -> std::result::Result<String, String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => format!("prompt was blocked: {reason}"),
            None => "response contained no candidates".to_string(),
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(format!("candidate contained no text (finish reason: {reason})"));
    }
    Ok(text)
}

// ── Embedding provider ─────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the Gemini embedding API.
///
/// Chunks are embedded with [`TaskType::RetrievalDocument`] and questions
/// with [`TaskType::RetrievalQuery`]; both land in the same vector space.
///
/// # Example
///
/// ```rust,ignore
/// use machi_rag::gemini::{GeminiClient, GeminiEmbeddingProvider};
///
/// let provider = GeminiEmbeddingProvider::new(GeminiClient::from_env()?);
/// let embedding = provider.embed("燃えるごみの収集日").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: GeminiClient,
    model: String,
    dimensions: usize,
    /// If set, passed to the API to truncate the output vector.
    output_dimensionality: Option<usize>,
}

impl GeminiEmbeddingProvider {
    /// Create a provider for the default `gemini-embedding-001` model.
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            output_dimensionality: None,
        }
    }

    /// Set the embedding model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensionality (truncates the embedding vector).
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.output_dimensionality = Some(dims);
        self
    }

    fn request<'a>(&self, text: &'a str, task_type: TaskType) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: model_path(&self.model),
            content: Content::text(None, text),
            task_type,
            output_dimensionality: self.output_dimensionality,
        }
    }

    async fn embed_one(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), ?task_type, "embedding single text");

        let response: EmbedContentResponse = self
            .client
            .post(&self.model, "embedContent", &self.request(text, task_type))
            .await
            .map_err(|message| {
                error!(provider = PROVIDER, error = %message, "embedding request failed");
                RagError::embedding(PROVIDER, message)
            })?;

        Ok(response.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text, TaskType::RetrievalDocument).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let body = BatchEmbedContentsRequest {
            requests: texts.iter().map(|t| self.request(*t, TaskType::RetrievalDocument)).collect(),
        };
        let response: BatchEmbedContentsResponse =
            self.client.post(&self.model, "batchEmbedContents", &body).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "batch embedding request failed");
                RagError::embedding(PROVIDER, message)
            })?;

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text, TaskType::RetrievalQuery).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Generative model ───────────────────────────────────────────────

/// A [`GenerativeModel`] backed by Gemini `generateContent`.
pub struct GeminiModel {
    client: GeminiClient,
    model: String,
    generation_config: Option<GenerationConfig>,
}

impl GeminiModel {
    /// Create a model handle for the default `gemini-2.5-flash` model.
    pub fn new(client: GeminiClient) -> Self {
        Self { client, model: DEFAULT_MODEL.to_string(), generation_config: None }
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set sampling parameters.
    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating");

        let body = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            generation_config: self.generation_config.clone(),
        };
        let response: GenerateContentResponse =
            self.client.post(&self.model, "generateContent", &body).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "generation request failed");
                RagError::generation(PROVIDER, message)
            })?;

        response_text(response).map_err(|message| {
            error!(provider = PROVIDER, error = %message, "generation returned no text");
            RagError::generation(PROVIDER, message)
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GeminiClient {
        GeminiClient::new("test-key").unwrap()
    }

    #[test]
    fn rejects_empty_api_key() {
        assert!(matches!(GeminiClient::new("  "), Err(RagError::Config(_))));
    }

    #[test]
    fn endpoint_accepts_bare_and_prefixed_model_names() {
        let client = client().with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(
            client.endpoint("gemini-2.5-flash", "generateContent"),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            client.endpoint("models/gemini-embedding-001", "embedContent"),
            "http://localhost:8080/v1beta/models/gemini-embedding-001:embedContent"
        );
    }

    #[test]
    fn embed_request_uses_camel_case_and_task_type() {
        let provider = GeminiEmbeddingProvider::new(client()).with_output_dimensionality(768);
        let value = serde_json::to_value(provider.request("資源ごみ", TaskType::RetrievalQuery)).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "models/gemini-embedding-001",
                "content": { "parts": [{ "text": "資源ごみ" }] },
                "taskType": "RETRIEVAL_QUERY",
                "outputDimensionality": 768
            })
        );
        assert_eq!(provider.dimensions(), 768);
    }

    #[test]
    fn generate_request_marks_user_role() {
        let body = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), "質問")],
            generation_config: Some(GenerationConfig { temperature: Some(0.0), max_output_tokens: None }),
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({
                "contents": [{ "role": "user", "parts": [{ "text": "質問" }] }],
                "generationConfig": { "temperature": 0.0 }
            })
        );
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "燃えるごみは" }, { "text": "火曜日です。" }] }, "finishReason": "STOP" },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "燃えるごみは火曜日です。");
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).unwrap();
        assert_eq!(response_text(response).unwrap_err(), "prompt was blocked: SAFETY");
    }

    #[test]
    fn candidate_without_text_is_reported() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] })).unwrap();
        assert!(response_text(response).unwrap_err().contains("MAX_TOKENS"));
    }

    #[test]
    fn parses_batch_embeddings() {
        let response: BatchEmbedContentsResponse = serde_json::from_value(json!({
            "embeddings": [{ "values": [0.5, -0.25] }, { "values": [1.0, 0.0] }]
        }))
        .unwrap();
        let vectors: Vec<Vec<f32>> = response.embeddings.into_iter().map(|e| e.values).collect();
        assert_eq!(vectors, vec![vec![0.5, -0.25], vec![1.0, 0.0]]);
    }
}
