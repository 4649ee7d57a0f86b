//! MCP `add_sighting` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddSightingParams {
    #[schemars(description = "Where it was found: News, Walk, Code, Dream, Book, ...")]
    pub source: String,

    #[schemars(description = "Brief description of what was seen")]
    pub summary: String,

    #[schemars(
        description = "When it was seen, ISO 8601 (e.g. '2026-01-07T14:23:00Z' or '2026-01-07'). Defaults to now."
    )]
    pub occurred_at: Option<String>,

    #[schemars(description = "Human-readable location, e.g. 'Seattle, WA' or 'my dreams'")]
    pub place_label: Option<String>,

    #[schemars(
        description = "JSON object of extra details (e.g. {\"url\": \"...\"}), or a JSON-encoded string of one"
    )]
    pub metadata: Option<serde_json::Value>,

    #[schemars(description = "JSON array of tag strings, or a JSON-encoded string of one")]
    pub tags: Option<serde_json::Value>,
}
