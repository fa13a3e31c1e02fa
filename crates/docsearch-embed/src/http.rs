//! OpenAI-compatible HTTP providers for embeddings and query suggestions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docsearch_core::config::{EmbeddingConfig, SuggestionConfig};
use docsearch_core::traits::{EmbeddingClient, SuggestionProvider};
use docsearch_core::{Error, Result};

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|_| reqwest::Client::new())
}

fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
    id: String,
}

impl HttpEmbeddingClient {
    pub fn new(cfg: &EmbeddingConfig, api_key: Option<String>, dim: usize) -> Result<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("embedding.endpoint is empty".into()));
        }
        Ok(Self {
            client: build_client(Duration::from_secs(cfg.timeout_secs.max(1))),
            url: endpoint_url(&cfg.endpoint, "embeddings"),
            model: cfg.model.clone(),
            api_key,
            dim,
            id: format!("http:{}:d{}", cfg.model, dim),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut req = self.client.post(&self.url).json(&EmbeddingRequest { model: &self.model, input: texts });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| Error::EmbeddingGeneration(format!("request to {} failed: {}", self.url, e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::EmbeddingGeneration(format!("provider returned {}: {}", status, body)));
        }
        let mut parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| Error::EmbeddingGeneration(format!("malformed embedding response: {}", e)))?;
        if parsed.data.len() != texts.len() {
            return Err(Error::EmbeddingGeneration(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        let mut out = Vec::with_capacity(parsed.data.len());
        for d in parsed.data {
            if d.embedding.len() != self.dim {
                return Err(Error::EmbeddingGeneration(format!(
                    "embedding dimension {} does not match configured {}",
                    d.embedding.len(),
                    self.dim
                )));
            }
            out.push(d.embedding);
        }
        Ok(out)
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.request(&[text.to_string()]).await?;
        batch.pop().ok_or_else(|| Error::EmbeddingGeneration("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.request(texts).await
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

/// Asks a chat-completions endpoint for related documentation queries.
pub struct HttpSuggestionClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpSuggestionClient {
    pub fn new(cfg: &SuggestionConfig, api_key: Option<String>) -> Result<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("suggestions.endpoint is empty".into()));
        }
        Ok(Self {
            client: build_client(Duration::from_secs(10)),
            url: endpoint_url(&cfg.endpoint, "chat/completions"),
            model: cfg.model.clone(),
            api_key,
        })
    }
}

/// One suggestion per line; list markers and surrounding quotes are stripped.
pub fn parse_suggestion_lines(reply: &str, limit: usize) -> Vec<String> {
    reply
        .lines()
        .map(|l| {
            l.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ')' | '•'))
                .trim()
                .trim_matches('"')
                .trim()
                .to_string()
        })
        .filter(|l| !l.is_empty())
        .take(limit)
        .collect()
}

#[async_trait]
impl SuggestionProvider for HttpSuggestionClient {
    async fn suggest(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You suggest related developer documentation searches. Reply with one query per line and nothing else.".into(),
                },
                ChatMessage { role: "user", content: format!("Suggest {} searches related to: {}", limit, query) },
            ],
            temperature: 0.3,
        };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| Error::Suggestion(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Suggestion(format!("provider returned {}", resp.status())));
        }
        let parsed: ChatResponse = resp.json().await.map_err(|e| Error::Suggestion(e.to_string()))?;
        let reply = parsed.choices.into_iter().next().map(|c| c.message.content).unwrap_or_default();
        Ok(parse_suggestion_lines(&reply, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_lines_drop_markers() {
        let reply = "1. tokio select macro\n- \"tokio spawn blocking\"\n\n* async cancellation\nextra";
        assert_eq!(
            parse_suggestion_lines(reply, 3),
            vec!["tokio select macro", "tokio spawn blocking", "async cancellation"]
        );
    }

    #[test]
    fn endpoint_join_handles_trailing_slash() {
        assert_eq!(endpoint_url("http://x/v1/", "embeddings"), "http://x/v1/embeddings");
    }
}
