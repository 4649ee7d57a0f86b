use anyhow::Result;

use sightings::error::ValidationErrors;
use sightings::sighting::validate::{format_timestamp, parse_metadata_str, parse_tags_str};
use sightings::sighting::{Sighting, SightingStore};

/// Fields for a new sighting as typed on the command line.
pub struct AddArgs {
    pub source: String,
    pub summary: String,
    pub when: Option<String>,
    pub place: Option<String>,
    pub metadata: Option<String>,
    pub tags: Option<String>,
}

/// Record a sighting and print it.
pub async fn add(store: &SightingStore, args: AddArgs) -> Result<()> {
    let mut errors = ValidationErrors::new();
    let metadata = match args.metadata.as_deref().map(parse_metadata_str).transpose() {
        Ok(m) => m.flatten(),
        Err(e) => {
            errors.merge(e);
            None
        }
    };
    let tags = match args.tags.as_deref().map(parse_tags_str).transpose() {
        Ok(t) => t.flatten(),
        Err(e) => {
            errors.merge(e);
            None
        }
    };
    errors.into_result()?;

    let sighting = Sighting {
        id: None,
        occurred_at: args
            .when
            .unwrap_or_else(|| format_timestamp(&chrono::Utc::now())),
        place_label: args.place,
        source: args.source,
        summary: args.summary,
        metadata,
        tags,
    };

    let created = store.create(sighting).await?;
    println!("Added {}", created.display_line());
    Ok(())
}
