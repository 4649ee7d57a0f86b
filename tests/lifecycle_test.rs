mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sightings::db::{self, migrations, schema};
use sightings::error::StoreError;
use sightings::sighting::{Page, SightingStore};

#[tokio::test]
async fn initialize_creates_the_database_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("dir").join("sightings.db");
    assert!(!path.exists());

    let store = SightingStore::sqlite(&path);
    store.initialize().await.unwrap();

    assert!(path.exists());
    let health = store.health().await.unwrap();
    assert!(health.integrity_ok);
    assert_eq!(health.schema_version, migrations::CURRENT_SCHEMA_VERSION);
    assert_eq!(health.embedded_count, None);
}

#[tokio::test]
async fn database_created_by_bare_schema_is_adopted() {
    let (_tmp, path) = helpers::temp_db();
    {
        let conn = db::connect(&path).unwrap();
        schema::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO sightings (occurred_at, source, summary) VALUES (?1, ?2, ?3)",
            ["2025-12-24T23:00:00Z", "Book", "Fnord on page 23"],
        )
        .unwrap();
    }

    let store = SightingStore::sqlite(&path);
    store.initialize().await.unwrap();

    assert_eq!(
        store.health().await.unwrap().schema_version,
        migrations::CURRENT_SCHEMA_VERSION
    );
    let old = store.get(1).await.unwrap().unwrap();
    assert_eq!(old.summary, "Fnord on page 23");

    let mut edited = old.clone();
    edited.place_label = Some("Library".into());
    store.update(edited).await.unwrap();
}

#[tokio::test]
async fn database_from_a_newer_release_is_refused() {
    let (_tmp, path) = helpers::temp_db();
    {
        let conn = db::connect(&path).unwrap();
        schema::init_schema(&conn).unwrap();
        conn.execute(
            "UPDATE schema_meta SET value = '99' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();
    }

    let err = SightingStore::sqlite(&path).initialize().await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));
}

#[tokio::test]
async fn semantic_initialize_records_the_model() {
    let (_tmp, store) = helpers::semantic_store().await;
    let health = store.health().await.unwrap();

    assert_eq!(health.embedding_model.as_deref(), Some("keyword-test"));
    assert_eq!(health.embedding_dimensions, Some(helpers::KEYWORD_DIMS));
    assert_eq!(health.embedded_count, Some(0));
}

#[tokio::test]
async fn dimension_change_requires_re_embed() {
    let (_tmp, path) = helpers::temp_db();
    let before = SightingStore::sqlite(&path).with_embedder(Arc::new(helpers::KeywordEmbedder));
    before.initialize().await.unwrap();
    helpers::create_all(&before, helpers::fnord_trio()).await;

    let wider = Arc::new(helpers::ConstantEmbedder { dimensions: 16 });
    let after = SightingStore::sqlite(&path).with_embedder(wider);
    let err = after.initialize().await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));

    let done = after.re_embed(2, &|_, _| {}).await.unwrap();
    assert_eq!(done, 3);
    after.initialize().await.unwrap();

    let health = after.health().await.unwrap();
    assert_eq!(health.embedding_dimensions, Some(16));
    assert_eq!(health.embedding_model.as_deref(), Some("constant-test"));
    assert_eq!(health.embedded_count, Some(3));
    assert_eq!(after.search("anything", Page::all(), None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn re_embed_backfills_rows_written_without_vectors() {
    let (_tmp, path) = helpers::temp_db();
    let plain = SightingStore::sqlite(&path);
    plain.initialize().await.unwrap();
    let ids = helpers::create_all(&plain, helpers::fnord_trio()).await;

    let semantic = SightingStore::sqlite(&path).with_embedder(Arc::new(helpers::KeywordEmbedder));
    let calls = AtomicUsize::new(0);
    let seen = Mutex::new(Vec::new());
    let done = semantic
        .re_embed(2, &|done, total| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push((done, total));
        })
        .await
        .unwrap();

    assert_eq!(done, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*seen.lock().unwrap(), vec![(2, 3), (3, 3)]);

    let results = semantic.search("graffiti", Page::all(), None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, Some(ids[1]));
}

#[tokio::test]
async fn re_embed_without_a_provider_is_invalid() {
    let (_tmp, store) = helpers::text_store().await;
    let err = store.re_embed(8, &|_, _| {}).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation(_)));
}

#[tokio::test]
async fn re_embed_of_empty_store_is_a_no_op() {
    let (_tmp, store) = helpers::semantic_store().await;
    assert_eq!(store.re_embed(8, &|_, _| {}).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_re_embed_keeps_existing_vectors() {
    let (_tmp, path) = helpers::temp_db();
    let healthy = SightingStore::sqlite(&path).with_embedder(Arc::new(helpers::KeywordEmbedder));
    healthy.initialize().await.unwrap();
    let ids = helpers::create_all(&healthy, helpers::fnord_trio()).await;

    let down = SightingStore::sqlite(&path).with_embedder(Arc::new(helpers::FlakyEmbedder::failing()));
    let err = down.re_embed(2, &|_, _| {}).await.unwrap_err();
    assert!(err.is_dependency());

    assert_eq!(healthy.health().await.unwrap().embedded_count, Some(3));
    let results = healthy.search("graffiti", Page::all(), None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, Some(ids[1]));
}

#[tokio::test]
async fn failed_width_change_leaves_old_vectors_untouched() {
    struct DownSixteen;
    #[async_trait::async_trait]
    impl sightings::embedding::EmbeddingProvider for DownSixteen {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, sightings::embedding::EmbeddingError> {
            Err(sightings::embedding::EmbeddingError::Status {
                status: 503,
                body: "model not loaded".into(),
            })
        }
        fn dimensions(&self) -> usize {
            16
        }
        fn model(&self) -> &str {
            "down-16"
        }
    }

    let (_tmp, path) = helpers::temp_db();
    let healthy = SightingStore::sqlite(&path).with_embedder(Arc::new(helpers::KeywordEmbedder));
    healthy.initialize().await.unwrap();
    helpers::create_all(&healthy, helpers::fnord_trio()).await;

    let wider = SightingStore::sqlite(&path).with_embedder(Arc::new(DownSixteen));
    assert!(wider.re_embed(8, &|_, _| {}).await.unwrap_err().is_dependency());

    let health = healthy.health().await.unwrap();
    assert_eq!(health.embedding_dimensions, Some(helpers::KEYWORD_DIMS));
    assert_eq!(health.embedding_model.as_deref(), Some("keyword-test"));
    assert_eq!(health.embedded_count, Some(3));
    healthy.initialize().await.unwrap();
    assert_eq!(healthy.search("fnord", Page::all(), None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn re_embed_at_same_width_refreshes_in_place() {
    let (_tmp, store) = helpers::semantic_store().await;
    helpers::create_all(&store, helpers::fnord_trio()).await;

    assert_eq!(store.re_embed(1, &|_, _| {}).await.unwrap(), 3);
    let health = store.health().await.unwrap();
    assert_eq!(health.embedded_count, Some(3));
    assert_eq!(store.search("fnord", Page::all(), None).await.unwrap().len(), 3);
}
