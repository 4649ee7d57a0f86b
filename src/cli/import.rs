use anyhow::{bail, Context, Result};
use std::path::Path;

use sightings::error::StoreError;
use sightings::sighting::{RestoreOutcome, SightingStore};

use super::export::{ExportData, EXPORT_VERSION};

/// Import sightings from an `export` file.
///
/// Each sighting keeps its id and is re-embedded when semantic search is on.
/// Ids that already exist are skipped. Invalid records are reported and
/// skipped; a backend or embedding failure aborts the import.
pub async fn import(store: &SightingStore, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let data: ExportData = serde_json::from_str(&json).context("failed to parse import JSON")?;
    if data.version > EXPORT_VERSION {
        bail!(
            "export format v{} is newer than this binary supports (v{EXPORT_VERSION})",
            data.version
        );
    }

    println!("Importing {} sightings...", data.sightings.len());

    let mut imported = 0u64;
    let mut skipped = 0u64;
    let mut invalid = 0u64;

    for sighting in data.sightings {
        let id = sighting.id;
        match store.restore(sighting).await {
            Ok(RestoreOutcome::Inserted(_)) => imported += 1,
            Ok(RestoreOutcome::Skipped(_)) => skipped += 1,
            Err(StoreError::Validation(e)) => {
                eprintln!("Warning: skipping sighting {id:?}: {e}");
                invalid += 1;
            }
            Err(e) => return Err(e).context("import aborted"),
        }
    }

    println!("Import complete:");
    println!("  Sightings imported: {imported}");
    println!("  Sightings skipped:  {skipped} (already exist)");
    if invalid > 0 {
        println!("  Invalid records:    {invalid}");
    }

    Ok(())
}
