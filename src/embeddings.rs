use crate::config::EmbeddingConfig;
use crate::text::normalize;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Sentence encoder seam. Both provider surfaces and request texts go through
/// the same backend; the matcher L2-normalizes whatever comes back, so
/// backends need not guarantee unit length.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encode a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;

    /// Encode a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_batch(&batch).await?;
        vectors
            .pop()
            .context("embedding backend returned an empty batch")
    }
}

// OpenAI-compatible API implementation
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    retries: u32,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct OpenAiResponseData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiResponseData>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, dims: Option<usize>, retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build reqwest client with timeout")?;

        let dims = dims.unwrap_or(match model.as_str() {
            // Known OpenAI embedding dims
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => 1536,
        });

        Ok(Self {
            client,
            api_key,
            model,
            dims,
            retries: retries.clamp(1, 5),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = OpenAiRequest {
            model: &self.model,
            input: texts,
            dimensions: if self.dims != 1536 && self.dims != 3072 {
                Some(self.dims)
            } else {
                None // Use default for standard sizes
            },
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to embeddings API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Embeddings API error {}: {}", status, error_text);
        }

        let mut parsed: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse embeddings API response")?;
        if parsed.data.len() != texts.len() {
            anyhow::bail!(
                "Embeddings API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            );
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            "Requesting embeddings (model={}, batch={})",
            self.model,
            texts.len()
        );

        // Retry with simple exponential backoff
        let mut last_err: Option<anyhow::Error> = None;
        for i in 0..self.retries {
            match self.request(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    last_err = Some(e);
                    let delay_ms = 200u64 * (1u64 << i);
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Unknown embeddings API error")))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Deterministic, local embedder for testing/dev (no network).
///
/// Hashed bag-of-words: each normalized token lands in a sha256-derived
/// bucket, the vector is L2-normalized. Texts sharing tokens get a positive
/// cosine, which is enough structure to exercise the full pipeline.
pub struct FakeEmbedder {
    dims: usize,
}

impl FakeEmbedder {
    pub fn new(dims: Option<usize>) -> Self {
        let d = dims.unwrap_or(384).max(1);
        Self { dims: d }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};
        let mut out = vec![0.0f32; self.dims];
        for token in normalize(text).split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&digest[..4]);
            let bucket = (u32::from_le_bytes(bytes) as usize) % self.dims;
            out[bucket] += 1.0;
        }

        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.generate(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

// Factory function to create embedder based on configuration and environment
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let is_placeholder = |s: &str| {
        let t = s.trim();
        t.is_empty()
            || t.contains("${")
            || t.eq_ignore_ascii_case("your-api-key-here")
            || t.eq_ignore_ascii_case("changeme")
    };

    match config.provider.as_str() {
        "openai" => {
            let key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
            if is_placeholder(&key) {
                anyhow::bail!("embedding provider is 'openai' but OPENAI_API_KEY is not set");
            }
            info!("Using OpenAI embeddings (model={})", config.model);
            Ok(Arc::new(OpenAiEmbedder::new(
                key,
                config.model.clone(),
                Some(config.dimensions),
                config.retries,
            )?))
        }
        "fake" => {
            let fake = FakeEmbedder::new(Some(config.dimensions));
            info!(
                "Using FakeEmbedder (deterministic) with {} dimensions",
                fake.dimensions()
            );
            Ok(Arc::new(fake))
        }
        other => {
            // Auto-detect: OpenAI when a key is present, deterministic fake otherwise
            let key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
            if !is_placeholder(&key) {
                info!("Using OpenAI embeddings (model={})", config.model);
                return Ok(Arc::new(OpenAiEmbedder::new(
                    key,
                    config.model.clone(),
                    Some(config.dimensions),
                    config.retries,
                )?));
            }
            if config.strict {
                anyhow::bail!(
                    "No embedding provider available (provider='{}' and no OPENAI_API_KEY)",
                    other
                );
            }
            let fake = FakeEmbedder::new(Some(config.dimensions));
            info!(
                "Using FakeEmbedder (deterministic) with {} dimensions",
                fake.dimensions()
            );
            Ok(Arc::new(fake))
        }
    }
}
