//! MCP `search_sightings` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_sightings` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchSightingsParams {
    /// Free-text query.
    #[schemars(
        description = "What to look for. Matched by meaning when semantic search is enabled, otherwise as a case-insensitive substring of source, summary and place."
    )]
    pub query: String,

    #[schemars(description = "Maximum number of results. Defaults to 10.")]
    pub limit: Option<usize>,

    #[schemars(description = "Number of results to skip. Defaults to 0.")]
    pub offset: Option<usize>,

    /// Cosine distance cutoff (0 = identical, 2 = opposite).
    #[schemars(
        description = "Semantic search only: maximum cosine distance, 0.0 (identical) to 2.0 (opposite). Defaults to the configured cutoff."
    )]
    pub max_distance: Option<f64>,
}
