use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListSightingsParams {
    #[schemars(description = "Maximum number of sightings to return (most recent first). Defaults to all.")]
    pub limit: Option<usize>,

    #[schemars(description = "Number of sightings to skip. Defaults to 0.")]
    pub offset: Option<usize>,
}
