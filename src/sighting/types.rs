//! Core sighting type definitions.
//!
//! Defines [`Sighting`] (a full record), [`SightingPatch`] (sparse field
//! assignments for server-side partial updates) and [`Page`] (limit/offset
//! pagination).

use serde::{Deserialize, Serialize};

/// Arbitrary JSON metadata attached to a sighting.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A sighting record, matching the `sightings` table schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sighting {
    /// Store-assigned id. `None` until persisted.
    pub id: Option<i64>,
    /// When the thing was seen. Any ISO 8601 form on input; RFC 3339 UTC on output.
    pub occurred_at: String,
    /// Human-readable location, e.g. `"Seattle, WA"` or `"my dreams"`.
    pub place_label: Option<String>,
    /// Where it was found: News, Walk, Code, Dream, Book, ...
    pub source: String,
    /// Brief description of what was seen.
    pub summary: String,
    /// Arbitrary JSON metadata (e.g. `{"url": "...", "author": "..."}`).
    pub metadata: Option<Metadata>,
    /// Ordered free-form labels.
    pub tags: Option<Vec<String>>,
}

impl Sighting {
    /// A new, unpersisted sighting with the required fields set.
    pub fn new(
        occurred_at: impl Into<String>,
        source: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            occurred_at: occurred_at.into(),
            source: source.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_place(mut self, place: impl Into<String>) -> Self {
        self.place_label = Some(place.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// One-line human-readable rendering used by the CLI.
    pub fn display_line(&self) -> String {
        let where_ = self.place_label.as_deref().unwrap_or("Unknown location");
        let mut line = format!(
            "[{}] {}: {} @ {}",
            self.occurred_at, self.source, self.summary, where_
        );
        if let Some(meta) = self.metadata.as_ref().filter(|m| !m.is_empty()) {
            line.push_str(&format!(" [metadata: {}]", serde_json::Value::Object(meta.clone())));
        }
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            line.push_str(&format!(" [tags: {}]", tags.join(", ")));
        }
        match self.id {
            Some(id) => format!("ID {id}: {line}"),
            None => line,
        }
    }
}

/// Sparse field assignments applied against the stored record.
///
/// `None` keeps the current value. For nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SightingPatch {
    pub occurred_at: Option<String>,
    pub place_label: Option<Option<String>>,
    pub source: Option<String>,
    pub summary: Option<String>,
    pub metadata: Option<Option<Metadata>>,
    pub tags: Option<Option<Vec<String>>>,
}

impl SightingPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the assignments to `current`, keeping its id.
    pub fn apply_to(self, mut current: Sighting) -> Sighting {
        if let Some(v) = self.occurred_at {
            current.occurred_at = v;
        }
        if let Some(v) = self.place_label {
            current.place_label = v;
        }
        if let Some(v) = self.source {
            current.source = v;
        }
        if let Some(v) = self.summary {
            current.summary = v;
        }
        if let Some(v) = self.metadata {
            current.metadata = v;
        }
        if let Some(v) = self.tags {
            current.tags = v;
        }
        current
    }
}

/// Limit/offset pagination. An absent limit returns everything from `offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    /// Limit as a SQL integer, saturating at `i64::MAX`.
    pub(crate) fn sql_limit(&self) -> Option<i64> {
        self.limit.map(saturating_i64)
    }

    /// Limit as SQLite expects it: a negative LIMIT means "no limit".
    pub(crate) fn sqlite_limit(&self) -> i64 {
        self.sql_limit().unwrap_or(-1)
    }

    /// Offset as a SQL integer, saturating at `i64::MAX`.
    pub(crate) fn sql_offset(&self) -> i64 {
        saturating_i64(self.offset)
    }
}

fn saturating_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
