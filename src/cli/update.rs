use anyhow::{bail, Result};

use sightings::error::ValidationErrors;
use sightings::sighting::validate::{parse_metadata_str, parse_tags_str};
use sightings::sighting::{SightingPatch, SightingStore};

/// Fields to change, as typed on the command line. An empty `--place`,
/// `--metadata` or `--tags` clears that field.
pub struct UpdateArgs {
    pub when: Option<String>,
    pub place: Option<String>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub metadata: Option<String>,
    pub tags: Option<String>,
}

impl UpdateArgs {
    fn into_patch(self) -> Result<SightingPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let metadata = match self.metadata.as_deref() {
            None => None,
            Some("") => Some(None),
            Some(raw) => match parse_metadata_str(raw) {
                Ok(m) => Some(m),
                Err(e) => {
                    errors.merge(e);
                    None
                }
            },
        };
        let tags = match self.tags.as_deref() {
            None => None,
            Some("") => Some(None),
            Some(raw) => match parse_tags_str(raw) {
                Ok(t) => Some(t),
                Err(e) => {
                    errors.merge(e);
                    None
                }
            },
        };
        errors.into_result()?;

        Ok(SightingPatch {
            occurred_at: self.when,
            place_label: self.place.map(|p| (!p.is_empty()).then_some(p)),
            source: self.source,
            summary: self.summary,
            metadata,
            tags,
        })
    }
}

/// Change some fields of a stored sighting.
pub async fn update(store: &SightingStore, id: i64, args: UpdateArgs) -> Result<()> {
    let patch = args.into_patch()?;
    let updated = store.patch(id, patch).await?;
    println!("Updated {}", updated.display_line());
    Ok(())
}

pub async fn delete(store: &SightingStore, id: i64) -> Result<()> {
    if !store.delete(id).await? {
        bail!("no sighting with id {id}");
    }
    println!("Deleted sighting {id}.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> UpdateArgs {
        UpdateArgs {
            when: None,
            place: None,
            source: None,
            summary: None,
            metadata: None,
            tags: None,
        }
    }

    #[test]
    fn empty_values_clear_nullable_fields() {
        let patch = UpdateArgs {
            place: Some(String::new()),
            tags: Some(String::new()),
            ..args()
        }
        .into_patch()
        .unwrap();
        assert_eq!(patch.place_label, Some(None));
        assert_eq!(patch.tags, Some(None));
        assert_eq!(patch.metadata, None);
    }

    #[test]
    fn bad_json_is_reported_per_field() {
        let errors = UpdateArgs {
            metadata: Some("[1]".into()),
            tags: Some("{".into()),
            ..args()
        }
        .into_patch()
        .unwrap_err();
        assert!(errors.mentions("metadata"));
        assert!(errors.mentions("tags"));
    }
}
