mod helpers;

use sightings::sighting::{Page, RestoreOutcome, Sighting};

#[tokio::test]
async fn restore_keeps_the_exported_id() {
    let (_tmp, store) = helpers::text_store().await;

    let mut exported = helpers::sighting("Book", "Fnord in the appendix").with_tags(["paper"]);
    exported.id = Some(100);

    let outcome = store.restore(exported.clone()).await.unwrap();
    let RestoreOutcome::Inserted(restored) = outcome else {
        panic!("expected insert, got {outcome:?}");
    };
    assert_eq!(restored, exported);
    assert_eq!(store.get(100).await.unwrap().unwrap(), exported);
}

#[tokio::test]
async fn restoring_an_existing_id_is_skipped() {
    let (_tmp, store) = helpers::text_store().await;
    let original = store
        .create(helpers::sighting("Walk", "Saw fnord graffiti"))
        .await
        .unwrap();

    let mut clash = helpers::sighting("Dream", "Something else entirely");
    clash.id = original.id;
    let outcome = store.restore(clash).await.unwrap();

    assert!(matches!(outcome, RestoreOutcome::Skipped(id) if Some(id) == original.id));
    assert_eq!(store.get(original.id.unwrap()).await.unwrap().unwrap(), original);
}

#[tokio::test]
async fn new_ids_continue_after_restored_ones() {
    let (_tmp, store) = helpers::text_store().await;

    let mut exported = helpers::sighting("Book", "Fnord in the appendix");
    exported.id = Some(100);
    store.restore(exported).await.unwrap();

    let next = store
        .create(helpers::sighting("Walk", "Saw fnord graffiti"))
        .await
        .unwrap();
    assert_eq!(next.id, Some(101));
}

#[tokio::test]
async fn restore_without_id_creates() {
    let (_tmp, store) = helpers::text_store().await;
    let outcome = store
        .restore(helpers::sighting("Walk", "Saw fnord graffiti"))
        .await
        .unwrap();
    assert!(matches!(outcome, RestoreOutcome::Inserted(Sighting { id: Some(1), .. })));
}

#[tokio::test]
async fn restore_validates() {
    let (_tmp, store) = helpers::text_store().await;
    let mut broken = Sighting::new("yesterday-ish", "Walk", "Saw fnord graffiti");
    broken.id = Some(5);

    let err = store.restore(broken).await.unwrap_err();
    assert!(err.validation().unwrap().mentions("occurred_at"));
    assert!(store.get(5).await.unwrap().is_none());
}

#[tokio::test]
async fn export_then_restore_into_a_fresh_store() {
    let (_src_tmp, source) = helpers::semantic_store().await;
    helpers::create_all(&source, helpers::fnord_trio()).await;
    source.delete(2).await.unwrap();
    let exported = source.list(Page::all()).await.unwrap();

    let (_dst_tmp, target) = helpers::semantic_store().await;
    for s in exported.iter().rev().cloned() {
        target.restore(s).await.unwrap();
    }

    assert_eq!(target.count().await.unwrap(), 2);
    assert_eq!(target.get(1).await.unwrap(), source.get(1).await.unwrap());
    assert_eq!(target.get(3).await.unwrap(), source.get(3).await.unwrap());
    assert!(target.get(2).await.unwrap().is_none());
    assert_eq!(target.search("fnord", Page::all(), None).await.unwrap().len(), 2);
}
