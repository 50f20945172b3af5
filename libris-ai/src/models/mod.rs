//! Data models for libris-ai
//!
//! - Enrichment status state machine
//! - Enrichment kinds and their per-kind policy
//! - Catalog items and enrichment slots
//! - Kind-specific result payloads

pub mod item;
pub mod kind;
pub mod payload;
pub mod status;

pub use item::{EnrichmentSlot, Item, MediaType, NewItem};
pub use kind::{CacheScope, EnrichmentKind};
pub use payload::{
    Character, CharacterRoster, CoverImage, DetailsResult, EnrichmentPayload, GraphLink,
    GraphNode, MoodResult, QuoteResult, RelationGraph, Relationship, Track,
};
pub use status::{EnrichmentStatus, InvalidTransition};
