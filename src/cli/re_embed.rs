//! CLI `re-embed` command: regenerate all embeddings with the current model.

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use sightings::config::SightingsConfig;
use sightings::sighting::SightingStore;

const BATCH_SIZE: usize = 32;

/// Re-embed every sighting with the configured model.
pub async fn re_embed(config: &SightingsConfig, store: &SightingStore) -> Result<()> {
    if !store.semantic_enabled() {
        bail!("semantic search is disabled; set embedding.enabled = true or SIGHTINGS_EMBEDDING_URL");
    }

    let total = store.count().await?;
    if total == 0 {
        println!("No sightings to re-embed.");
    } else {
        println!(
            "Re-embedding {total} sightings with model '{}'...",
            config.embedding.model
        );
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let done = store
        .re_embed(BATCH_SIZE, &|done: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        })
        .await?;

    pb.finish_and_clear();
    println!(
        "Re-embedded {done} sightings with model '{}'.",
        config.embedding.model
    );
    Ok(())
}
