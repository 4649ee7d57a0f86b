pub mod add_sighting;
pub mod delete_sighting;
pub mod get_sighting;
pub mod list_sightings;
pub mod search_sightings;
pub mod update_sighting;

use add_sighting::AddSightingParams;
use delete_sighting::DeleteSightingParams;
use get_sighting::GetSightingParams;
use list_sightings::ListSightingsParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_sightings::SearchSightingsParams;
use serde::Serialize;
use std::sync::Arc;
use update_sighting::UpdateSightingParams;

use sightings::error::{StoreError, ValidationErrors};
use sightings::sighting::validate::{self, format_timestamp};
use sightings::sighting::{Metadata, Page, Sighting, SightingPatch, SightingStore};

/// Default number of results for `search_sightings`.
const DEFAULT_SEARCH_LIMIT: usize = 10;

/// The sightings MCP tool handler. Holds the shared store and exposes every
/// operation via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct SightingTools {
    tool_router: ToolRouter<Self>,
    store: Arc<SightingStore>,
}

/// Tool error text: the error class first, so clients can tell bad input from outages.
fn tool_error(e: StoreError) -> String {
    let message = e.to_string();
    if message.starts_with(e.kind()) {
        message
    } else {
        format!("{}: {message}", e.kind())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

type JsonFields = (Option<Option<Metadata>>, Option<Option<Vec<String>>>);

/// Decode the loosely typed `metadata`/`tags` arguments, reporting both at once.
fn decode_json_fields(
    metadata: Option<serde_json::Value>,
    tags: Option<serde_json::Value>,
) -> Result<JsonFields, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let metadata = match metadata.map(validate::metadata_from_json).transpose() {
        Ok(m) => m,
        Err(e) => {
            errors.merge(e);
            None
        }
    };
    let tags = match tags.map(validate::tags_from_json).transpose() {
        Ok(t) => t,
        Err(e) => {
            errors.merge(e);
            None
        }
    };
    errors.into_result().map(|()| (metadata, tags))
}

#[tool_router]
impl SightingTools {
    pub fn new(store: Arc<SightingStore>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            store,
        }
    }

    #[tool(description = "Count all recorded fnord sightings.")]
    async fn count_sightings(&self) -> Result<String, String> {
        let count = self.store.count().await.map_err(tool_error)?;
        Ok(serde_json::json!({ "count": count }).to_string())
    }

    /// Record a new sighting.
    #[tool(description = "Record a new fnord sighting. Requires source and summary; occurred_at defaults to now.")]
    async fn add_sighting(
        &self,
        Parameters(params): Parameters<AddSightingParams>,
    ) -> Result<String, String> {
        tracing::info!(source = %params.source, "add_sighting called");

        let (metadata, tags) = decode_json_fields(params.metadata, params.tags)
            .map_err(|e| tool_error(e.into()))?;
        let sighting = Sighting {
            id: None,
            occurred_at: params
                .occurred_at
                .unwrap_or_else(|| format_timestamp(&chrono::Utc::now())),
            place_label: params.place_label,
            source: params.source,
            summary: params.summary,
            metadata: metadata.flatten(),
            tags: tags.flatten(),
        };

        let created = self.store.create(sighting).await.map_err(tool_error)?;
        to_json(&created)
    }

    #[tool(description = "List sightings, most recently recorded first.")]
    async fn list_sightings(
        &self,
        Parameters(params): Parameters<ListSightingsParams>,
    ) -> Result<String, String> {
        let page = Page::new(params.limit, params.offset.unwrap_or(0));
        let sightings = self.store.list(page).await.map_err(tool_error)?;
        to_json(&sightings)
    }

    #[tool(description = "Get a single sighting by ID.")]
    async fn get_sighting(
        &self,
        Parameters(params): Parameters<GetSightingParams>,
    ) -> Result<String, String> {
        match self.store.get(params.id).await.map_err(tool_error)? {
            Some(sighting) => to_json(&sighting),
            None => Err(format!("not found: no sighting with id {}", params.id)),
        }
    }

    /// Partial update; omitted fields keep their stored values.
    #[tool(description = "Update some fields of an existing sighting. Omitted fields are left unchanged; null clears place_label, metadata or tags.")]
    async fn update_sighting(
        &self,
        Parameters(params): Parameters<UpdateSightingParams>,
    ) -> Result<String, String> {
        tracing::info!(id = params.id, "update_sighting called");

        let (metadata, tags) = decode_json_fields(params.metadata, params.tags)
            .map_err(|e| tool_error(e.into()))?;
        let patch = SightingPatch {
            occurred_at: params.occurred_at,
            place_label: params.place_label,
            source: params.source,
            summary: params.summary,
            metadata,
            tags,
        };

        let updated = self
            .store
            .patch(params.id, patch)
            .await
            .map_err(tool_error)?;
        to_json(&updated)
    }

    #[tool(description = "Permanently delete a sighting by ID.")]
    async fn delete_sighting(
        &self,
        Parameters(params): Parameters<DeleteSightingParams>,
    ) -> Result<String, String> {
        let deleted = self.store.delete(params.id).await.map_err(tool_error)?;
        Ok(serde_json::json!({ "id": params.id, "deleted": deleted }).to_string())
    }

    /// Search by meaning when semantic search is enabled, else by substring.
    #[tool(description = "Search sightings. Uses semantic similarity when an embedding endpoint is configured, otherwise case-insensitive substring matching.")]
    async fn search_sightings(
        &self,
        Parameters(params): Parameters<SearchSightingsParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, "search_sightings called");

        let page = Page::new(
            Some(params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)),
            params.offset.unwrap_or(0),
        );
        let results = self
            .store
            .search(&params.query, page, params.max_distance)
            .await
            .map_err(tool_error)?;
        to_json(&results)
    }
}

#[tool_handler]
impl ServerHandler for SightingTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Fnord sighting logger. Use add_sighting to record what you saw, \
                 search_sightings to find earlier sightings, and update_sighting or \
                 delete_sighting to correct them."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
