pub mod add;
pub mod doctor;
pub mod export;
pub mod import;
pub mod list;
pub mod re_embed;
pub mod search;
pub mod update;

use anyhow::{Context, Result};

use sightings::config::SightingsConfig;
use sightings::sighting::{Sighting, SightingStore};

/// Build the configured store and make sure its schema exists.
pub async fn open_store(config: &SightingsConfig) -> Result<SightingStore> {
    let store = SightingStore::from_config(config)?;
    store
        .initialize()
        .await
        .with_context(|| format!("failed to initialize {} store", store.backend_name()))?;
    Ok(store)
}

/// Print sightings one per line, or as a JSON array.
pub fn print_sightings(sightings: &[Sighting], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sightings)?);
        return Ok(());
    }
    for sighting in sightings {
        println!("{}", sighting.display_line());
    }
    Ok(())
}
