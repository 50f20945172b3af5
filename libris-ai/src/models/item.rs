//! Catalog items and their enrichment slots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::kind::EnrichmentKind;
use super::status::EnrichmentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Book,
    Movie,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Book => "book",
            MediaType::Movie => "movie",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "book" => Ok(MediaType::Book),
            "movie" => Ok(MediaType::Movie),
            other => Err(format!("unknown media type '{}'", other)),
        }
    }
}

/// A book or movie owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    /// Opaque user id from the auth provider
    pub owner_id: String,
    pub media_type: MediaType,
    pub title: String,
    /// Author(s) for books, director for movies
    pub creator: String,
    /// Catalogue identifier (Open Library work key, TMDB id)
    pub external_id: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an item
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub owner_id: String,
    pub media_type: MediaType,
    pub title: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Queue the default enrichment kinds immediately
    #[serde(default)]
    pub auto_enrich: bool,
}

impl Item {
    pub fn new(new: &NewItem, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: new.owner_id.trim().to_string(),
            media_type: new.media_type,
            title: new.title.trim().to_string(),
            creator: new.creator.trim().to_string(),
            external_id: new.external_id.clone().filter(|id| !id.trim().is_empty()),
            description: new.description.clone(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One enrichment slot of an item
///
/// An absent row is reported as status `none` with no timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentSlot {
    pub item_id: Uuid,
    pub kind: EnrichmentKind,
    pub status: EnrichmentStatus,
    pub result: Option<serde_json::Value>,
    pub note: Option<String>,
    /// Natural key of the cache row the result came from or was published to
    pub cache_key: Option<String>,
    #[serde(skip)]
    pub force_refresh: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EnrichmentSlot {
    pub fn absent(item_id: Uuid, kind: EnrichmentKind) -> Self {
        Self {
            item_id,
            kind,
            status: EnrichmentStatus::None,
            result: None,
            note: None,
            cache_key: None,
            force_refresh: false,
            created_at: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_trims_and_drops_blank_external_id() {
        let new = NewItem {
            owner_id: "user-1".to_string(),
            media_type: MediaType::Book,
            title: "  Moby Dick ".to_string(),
            creator: " Herman Melville".to_string(),
            external_id: Some("  ".to_string()),
            description: String::new(),
            auto_enrich: false,
        };
        let item = Item::new(&new, Utc::now());
        assert_eq!(item.title, "Moby Dick");
        assert_eq!(item.creator, "Herman Melville");
        assert_eq!(item.external_id, None);
        assert!(item.tags.is_empty());
    }

    #[test]
    fn test_absent_slot_is_none() {
        let slot = EnrichmentSlot::absent(Uuid::new_v4(), EnrichmentKind::Quote);
        assert_eq!(slot.status, EnrichmentStatus::None);
        assert!(slot.result.is_none());
    }

    #[test]
    fn test_media_type_parse() {
        assert_eq!("movie".parse::<MediaType>().unwrap(), MediaType::Movie);
        assert!("album".parse::<MediaType>().is_err());
    }
}
