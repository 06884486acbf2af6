use anyhow::Result;
use embed_client::{hash_embed, EmbedClient};

// --- TextEmbedder trait ---

#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Embedder backed by an OpenAI-compatible embeddings API.
pub struct RemoteEmbedder {
    client: EmbedClient,
}

impl RemoteEmbedder {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: EmbedClient::new(api_key, model),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }
}

#[async_trait::async_trait]
impl TextEmbedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.client.embed(text).await?)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(self.client.embed_batch(&texts).await?)
    }
}

/// Deterministic local embedder (feature-hashed trigrams). Offline and
/// test path; same text always yields the same vector.
pub struct HashEmbedder;

#[async_trait::async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embed(text))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }
}
