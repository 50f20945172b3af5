//! Kind-specific enrichment results
//!
//! Generative models are loose about field casing, so the structured payloads
//! accept the common variants (`Name`/`name`, `Relationships`/`relationships`)
//! on input and always serialize in lowercase.

use serde::{Deserialize, Deserializer, Serialize};

use super::kind::EnrichmentKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailsResult {
    #[serde(alias = "Description", alias = "summary", alias = "Summary")]
    pub description: String,
    #[serde(default, alias = "Tags", alias = "genres")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(alias = "Target", alias = "with", alias = "With", alias = "name")]
    pub target: String,
    #[serde(rename = "type", alias = "Type", alias = "relation", alias = "Relation", default)]
    pub relation_type: String,
    #[serde(default, alias = "Detail", alias = "details", alias = "Details", alias = "description")]
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Role")]
    pub role: String,
    #[serde(default, alias = "Traits")]
    pub traits: Vec<String>,
    #[serde(default, alias = "Relationships")]
    pub relationships: Vec<Relationship>,
}

/// Character roster; arrives either as a bare array or wrapped in an object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterRoster {
    pub characters: Vec<Character>,
}

impl<'de> Deserialize<'de> for CharacterRoster {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapped {
            #[serde(alias = "Characters")]
            characters: Vec<Character>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Bare(Vec<Character>),
            Wrapped(Wrapped),
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Bare(characters) => CharacterRoster { characters },
            Shape::Wrapped(w) => CharacterRoster { characters: w.characters },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(alias = "Id", alias = "name", alias = "Name")]
    pub id: String,
    #[serde(default, alias = "Group", deserialize_with = "string_or_number")]
    pub group: String,
    #[serde(default, alias = "Bio", alias = "description")]
    pub bio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    #[serde(alias = "Source")]
    pub source: String,
    #[serde(alias = "Target")]
    pub target: String,
    #[serde(rename = "type", alias = "Type", default)]
    pub link_type: String,
    #[serde(default, alias = "Label")]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationGraph {
    #[serde(alias = "Nodes")]
    pub nodes: Vec<GraphNode>,
    #[serde(default, alias = "Links", alias = "edges")]
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverImage {
    /// Blob reference name, served under `/files/`
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodResult {
    pub moods: Vec<String>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Result payload of one enrichment slot
///
/// Stored as plain JSON; the slot's kind selects the shape when reading back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnrichmentPayload {
    Details(DetailsResult),
    Characters(CharacterRoster),
    RelationGraph(RelationGraph),
    Quote(QuoteResult),
    Cover(CoverImage),
    Mood(MoodResult),
}

impl EnrichmentPayload {
    pub fn kind(&self) -> EnrichmentKind {
        match self {
            EnrichmentPayload::Details(_) => EnrichmentKind::Details,
            EnrichmentPayload::Characters(_) => EnrichmentKind::Characters,
            EnrichmentPayload::RelationGraph(_) => EnrichmentKind::RelationGraph,
            EnrichmentPayload::Quote(_) => EnrichmentKind::Quote,
            EnrichmentPayload::Cover(_) => EnrichmentKind::Cover,
            EnrichmentPayload::Mood(_) => EnrichmentKind::Mood,
        }
    }

    /// A payload with nothing in it does not count as a result
    pub fn is_empty(&self) -> bool {
        match self {
            EnrichmentPayload::Details(d) => d.description.trim().is_empty() || d.tags.is_empty(),
            EnrichmentPayload::Characters(r) => r.characters.is_empty(),
            EnrichmentPayload::RelationGraph(g) => g.nodes.is_empty(),
            EnrichmentPayload::Quote(q) => q.text.trim().is_empty(),
            EnrichmentPayload::Cover(c) => c.file.trim().is_empty(),
            EnrichmentPayload::Mood(m) => m.moods.is_empty() && m.tracks.is_empty(),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Every variant is a plain struct of strings and vectors
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Decode a stored result for a kind
    pub fn from_value(kind: EnrichmentKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            EnrichmentKind::Details => EnrichmentPayload::Details(serde_json::from_value(value)?),
            EnrichmentKind::Characters => EnrichmentPayload::Characters(serde_json::from_value(value)?),
            EnrichmentKind::RelationGraph => {
                EnrichmentPayload::RelationGraph(serde_json::from_value(value)?)
            }
            EnrichmentKind::Quote => EnrichmentPayload::Quote(serde_json::from_value(value)?),
            EnrichmentKind::Cover => EnrichmentPayload::Cover(serde_json::from_value(value)?),
            EnrichmentKind::Mood => EnrichmentPayload::Mood(serde_json::from_value(value)?),
        })
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
