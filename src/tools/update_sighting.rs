//! MCP `update_sighting` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Parameters for the `update_sighting` MCP tool.
///
/// Omitted fields keep their stored value. For the nullable fields an explicit
/// `null` clears the value.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateSightingParams {
    #[schemars(description = "ID of the sighting to update")]
    pub id: i64,

    #[schemars(description = "New source")]
    pub source: Option<String>,

    #[schemars(description = "New summary")]
    pub summary: Option<String>,

    #[schemars(description = "New ISO 8601 timestamp")]
    pub occurred_at: Option<String>,

    #[serde(default, deserialize_with = "present")]
    #[schemars(description = "New location; null clears it")]
    pub place_label: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[schemars(description = "New metadata object (or JSON-encoded string); null clears it")]
    pub metadata: Option<serde_json::Value>,

    #[serde(default, deserialize_with = "present")]
    #[schemars(description = "New tag array (or JSON-encoded string); null clears it")]
    pub tags: Option<serde_json::Value>,
}

/// Maps a present field (including `null`) to `Some`, leaving absence to `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
