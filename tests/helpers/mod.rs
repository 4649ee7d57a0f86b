#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sightings::embedding::{EmbeddingError, EmbeddingProvider};
use sightings::sighting::{Sighting, SightingStore};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Vocabulary of [`KeywordEmbedder`]. The last dimension catches text with no keyword.
pub const KEYWORDS: [&str; 8] = [
    "fnord", "graffiti", "article", "debug", "news", "walk", "code", "dream",
];
pub const KEYWORD_DIMS: usize = KEYWORDS.len() + 1;

/// A fresh database file inside a temp dir. Keep the `TempDir` alive for the test.
pub fn temp_db() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("sightings.db");
    (tmp, path)
}

/// Initialized SQLite store with substring search.
pub async fn text_store() -> (TempDir, SightingStore) {
    let (tmp, path) = temp_db();
    let store = SightingStore::sqlite(path);
    store.initialize().await.unwrap();
    (tmp, store)
}

/// Initialized SQLite store with semantic search over [`KeywordEmbedder`].
pub async fn semantic_store() -> (TempDir, SightingStore) {
    let (tmp, path) = temp_db();
    let store = SightingStore::sqlite(path).with_embedder(Arc::new(KeywordEmbedder));
    store.initialize().await.unwrap();
    (tmp, store)
}

/// A valid sighting with a fixed date.
pub fn sighting(source: &str, summary: &str) -> Sighting {
    Sighting::new("2026-01-07T14:23:00Z", source, summary)
}

/// The three reference sightings: an article, graffiti on a walk, a debug log.
pub fn fnord_trio() -> [Sighting; 3] {
    [
        sighting("News", "Found fnord in article"),
        sighting("Walk", "Saw fnord graffiti"),
        sighting("Code", "Debug log had fnord"),
    ]
}

/// Create every sighting and return the stored ids in order.
pub async fn create_all(store: &SightingStore, sightings: impl IntoIterator<Item = Sighting>) -> Vec<i64> {
    let mut ids = Vec::new();
    for s in sightings {
        ids.push(store.create(s).await.unwrap().id.unwrap());
    }
    ids
}

/// Bag-of-keywords embedding, L2-normalized. Texts sharing keywords are close;
/// texts sharing none are at cosine distance 1.
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v = vec![0.0f32; KEYWORD_DIMS];
    for (i, keyword) in KEYWORDS.iter().enumerate() {
        if lower.contains(keyword) {
            v[i] = 1.0;
        }
    }
    if v.iter().all(|x| *x == 0.0) {
        v[KEYWORDS.len()] = 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in &mut v {
        *x /= norm;
    }
    v
}

pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(keyword_vector(text))
    }

    fn dimensions(&self) -> usize {
        KEYWORD_DIMS
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// Same vector for every text, with a configurable width.
pub struct ConstantEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut v = vec![0.0f32; self.dimensions];
        v[0] = 1.0;
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "constant-test"
    }
}

/// [`KeywordEmbedder`] that can be switched to fail like an unreachable endpoint.
#[derive(Default)]
pub struct FlakyEmbedder {
    failing: AtomicBool,
}

impl FlakyEmbedder {
    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Status {
                status: 503,
                body: "model not loaded".into(),
            });
        }
        Ok(keyword_vector(text))
    }

    fn dimensions(&self) -> usize {
        KEYWORD_DIMS
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// [`KeywordEmbedder`] whose next call, once armed, parks until released.
/// Lets a test hold a write between its read and its commit.
#[derive(Default)]
pub struct GatedEmbedder {
    armed: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedEmbedder {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(keyword_vector(text))
    }

    fn dimensions(&self) -> usize {
        KEYWORD_DIMS
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}
