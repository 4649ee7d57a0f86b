use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetSightingParams {
    #[schemars(description = "ID of the sighting")]
    pub id: i64,
}
