use anyhow::{bail, Result};

use sightings::sighting::{Page, SightingStore};

pub async fn count(store: &SightingStore) -> Result<()> {
    println!("{}", store.count().await?);
    Ok(())
}

/// List sightings, most recently recorded first.
pub async fn list(store: &SightingStore, page: Page, json: bool) -> Result<()> {
    let sightings = store.list(page).await?;
    if sightings.is_empty() && !json {
        println!("No sightings recorded.");
        return Ok(());
    }
    super::print_sightings(&sightings, json)
}

/// Print one sighting. Fails when the id does not exist.
pub async fn get(store: &SightingStore, id: i64, json: bool) -> Result<()> {
    let Some(sighting) = store.get(id).await? else {
        bail!("no sighting with id {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&sighting)?);
    } else {
        println!("{}", sighting.display_line());
    }
    Ok(())
}
