use anyhow::Result;

use sightings::sighting::{Page, SightingStore};

/// Search from the terminal and print matches, best first.
pub async fn search(
    store: &SightingStore,
    query: &str,
    page: Page,
    max_distance: Option<f64>,
    json: bool,
) -> Result<()> {
    let results = store.search(query, page, max_distance).await?;

    if json {
        return super::print_sightings(&results, true);
    }
    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    let mode = if store.semantic_enabled() {
        "semantic"
    } else {
        "text"
    };
    println!("Found {} result(s) ({mode} search)\n", results.len());
    super::print_sightings(&results, false)
}
