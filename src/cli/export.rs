use anyhow::Result;
use serde::{Deserialize, Serialize};

use sightings::sighting::validate::format_timestamp;
use sightings::sighting::{Page, Sighting, SightingStore};

/// Current export format version.
pub const EXPORT_VERSION: u32 = 1;

/// Export format, read back by `import`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub version: u32,
    pub exported_at: String,
    pub sightings: Vec<Sighting>,
}

/// Export all sightings as JSON to stdout.
pub async fn export(store: &SightingStore) -> Result<()> {
    let mut sightings = store.list(Page::all()).await?;
    // Oldest first, so a re-import replays them in the order they were recorded.
    sightings.reverse();

    let data = ExportData {
        version: EXPORT_VERSION,
        exported_at: format_timestamp(&chrono::Utc::now()),
        sightings,
    };

    println!("{}", serde_json::to_string_pretty(&data)?);
    eprintln!("Exported {} sightings.", data.sightings.len());
    Ok(())
}
