use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteSightingParams {
    #[schemars(description = "ID of the sighting to delete permanently")]
    pub id: i64,
}
