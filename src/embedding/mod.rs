//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and an HTTP implementation for
//! OpenAI-compatible `/embeddings` endpoints. The provider is created via
//! [`create_provider`] from configuration; a disabled config yields `None`
//! and the store falls back to substring search.

pub mod http;

use async_trait::async_trait;
use std::sync::Arc;

/// Failure to turn text into a vector.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("request to embedding endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("embedding endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimensions { expected: usize, actual: usize },
}

/// Trait for embedding text into vectors.
///
/// Implementations produce vectors of exactly [`EmbeddingProvider::dimensions`]
/// entries. Calls are async since providers usually talk to a
/// remote inference service.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier, recorded alongside stored vectors.
    fn model(&self) -> &str;
}

/// Create an embedding provider from config, or `None` when semantic search is disabled.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Option<Arc<dyn EmbeddingProvider>>> {
    if !config.enabled {
        return Ok(None);
    }
    match config.provider.as_str() {
        "openai" | "http" => {
            let provider = http::HttpEmbeddingProvider::new(config)?;
            tracing::info!(
                endpoint = %config.endpoint,
                model = %config.model,
                dimensions = config.dimensions,
                "embedding provider ready"
            );
            Ok(Some(Arc::new(provider)))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: openai"),
    }
}

/// Ensure a vector has the expected length.
pub fn check_dimensions(embedding: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if embedding.len() != expected {
        return Err(EmbeddingError::Dimensions {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    #[test]
    fn disabled_config_yields_no_provider() {
        let config = EmbeddingConfig::default();
        assert!(create_provider(&config).unwrap().is_none());
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let config = EmbeddingConfig {
            enabled: true,
            provider: "onnx".into(),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider"));
    }

    #[test]
    fn dimension_check() {
        assert!(check_dimensions(&[0.0; 4], 4).is_ok());
        let err = check_dimensions(&[0.0; 3], 4).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Dimensions {
                expected: 4,
                actual: 3
            }
        ));
    }
}
