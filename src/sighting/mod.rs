//! Sighting records and the store that persists and searches them.

pub mod ids;
mod postgres;
mod sqlite;
pub mod store;
pub mod types;
pub mod validate;

pub use ids::{ChaosSkip, IdAssignment, IdPolicy, Sequential};
pub use store::{RestoreOutcome, SightingStore, DEFAULT_MAX_DISTANCE};
pub use types::{Metadata, Page, Sighting, SightingPatch};
