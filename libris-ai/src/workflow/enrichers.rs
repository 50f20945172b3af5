//! Per-kind external callers
//!
//! Each enricher builds a prompt from the item, calls its provider and
//! parses the answer into a payload. Parse failures and empty answers are
//! errors; an enricher never reports a partial success.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::EnrichError;
use crate::models::{
    CharacterRoster, CoverImage, DetailsResult, EnrichmentKind, EnrichmentPayload, Item, MoodResult,
    QuoteResult, RelationGraph,
};
use crate::services::prompts;
use crate::services::response_parser::{clean_quote, parse_any_shape, parse_structured, JsonShape};
use crate::services::{BlobStore, ImageGenerator, MusicSearch, TextGenerator};

const MAX_TAGS: usize = 8;
const MAX_MOODS: usize = 5;
const MOOD_TRACK_LIMIT: usize = 8;

#[async_trait]
pub trait Enricher: Send + Sync {
    fn kind(&self) -> EnrichmentKind;

    async fn enrich(&self, item: &Item) -> Result<EnrichmentPayload, EnrichError>;
}

/// Enrichers keyed by the kind they produce
pub type EnricherSet = HashMap<EnrichmentKind, Arc<dyn Enricher>>;

/// Provider handles shared by the enrichers
#[derive(Clone)]
pub struct Providers {
    pub text: Arc<dyn TextGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub music: Arc<dyn MusicSearch>,
    pub blobs: Arc<dyn BlobStore>,
}

/// One enricher per kind
pub fn default_enrichers(providers: &Providers) -> EnricherSet {
    let enrichers: Vec<Arc<dyn Enricher>> = vec![
        Arc::new(DetailsEnricher { text: providers.text.clone() }),
        Arc::new(CharactersEnricher { text: providers.text.clone() }),
        Arc::new(RelationGraphEnricher { text: providers.text.clone() }),
        Arc::new(QuoteEnricher { text: providers.text.clone() }),
        Arc::new(CoverEnricher {
            images: providers.images.clone(),
            blobs: providers.blobs.clone(),
        }),
        Arc::new(MoodEnricher {
            text: providers.text.clone(),
            music: providers.music.clone(),
        }),
    ];
    enrichers.into_iter().map(|e| (e.kind(), e)).collect()
}

pub struct DetailsEnricher {
    text: Arc<dyn TextGenerator>,
}

#[async_trait]
impl Enricher for DetailsEnricher {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::Details
    }

    async fn enrich(&self, item: &Item) -> Result<EnrichmentPayload, EnrichError> {
        let raw = self.text.generate(&prompts::details_prompt(item)).await?;
        let parsed: DetailsResult = parse_structured(&raw, JsonShape::Object)?;

        let details = DetailsResult {
            description: parsed.description.trim().to_string(),
            tags: clean_list(parsed.tags, MAX_TAGS),
        };
        non_empty(EnrichmentPayload::Details(details))
    }
}

pub struct CharactersEnricher {
    text: Arc<dyn TextGenerator>,
}

#[async_trait]
impl Enricher for CharactersEnricher {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::Characters
    }

    async fn enrich(&self, item: &Item) -> Result<EnrichmentPayload, EnrichError> {
        let raw = self.text.generate(&prompts::characters_prompt(item)).await?;
        let mut roster: CharacterRoster = parse_any_shape(&raw, &[JsonShape::Object, JsonShape::Array])?;
        roster.characters.retain(|c| !c.name.trim().is_empty());
        non_empty(EnrichmentPayload::Characters(roster))
    }
}

pub struct RelationGraphEnricher {
    text: Arc<dyn TextGenerator>,
}

#[async_trait]
impl Enricher for RelationGraphEnricher {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::RelationGraph
    }

    async fn enrich(&self, item: &Item) -> Result<EnrichmentPayload, EnrichError> {
        let raw = self.text.generate(&prompts::relation_graph_prompt(item)).await?;
        let mut graph: RelationGraph = parse_structured(&raw, JsonShape::Object)?;

        // Links must join two known nodes
        graph.nodes.retain(|n| !n.id.trim().is_empty());
        let known: std::collections::HashSet<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        graph.links.retain(|l| known.contains(&l.source) && known.contains(&l.target));

        non_empty(EnrichmentPayload::RelationGraph(graph))
    }
}

pub struct QuoteEnricher {
    text: Arc<dyn TextGenerator>,
}

#[async_trait]
impl Enricher for QuoteEnricher {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::Quote
    }

    async fn enrich(&self, item: &Item) -> Result<EnrichmentPayload, EnrichError> {
        let raw = self.text.generate(&prompts::quote_prompt(item)).await?;
        non_empty(EnrichmentPayload::Quote(QuoteResult { text: clean_quote(&raw) }))
    }
}

pub struct CoverEnricher {
    images: Arc<dyn ImageGenerator>,
    blobs: Arc<dyn BlobStore>,
}

#[async_trait]
impl Enricher for CoverEnricher {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::Cover
    }

    async fn enrich(&self, item: &Item) -> Result<EnrichmentPayload, EnrichError> {
        let image = self.images.generate_image(&prompts::cover_prompt(item)).await?;
        let file = self
            .blobs
            .put(&image.bytes, image.extension)
            .await
            .map_err(|e| EnrichError::Blob(e.to_string()))?;
        non_empty(EnrichmentPayload::Cover(CoverImage { file }))
    }
}

pub struct MoodEnricher {
    text: Arc<dyn TextGenerator>,
    music: Arc<dyn MusicSearch>,
}

#[async_trait]
impl Enricher for MoodEnricher {
    fn kind(&self) -> EnrichmentKind {
        EnrichmentKind::Mood
    }

    async fn enrich(&self, item: &Item) -> Result<EnrichmentPayload, EnrichError> {
        let raw = self.text.generate(&prompts::mood_prompt(item)).await?;
        let parsed: MoodResult = parse_structured(&raw, JsonShape::Object)?;
        let moods = clean_list(parsed.moods, MAX_MOODS);
        if moods.is_empty() {
            return Err(EnrichError::EmptyResult);
        }

        let tracks = self.music.search_tracks(&moods.join(" "), MOOD_TRACK_LIMIT).await?;
        non_empty(EnrichmentPayload::Mood(MoodResult { moods, tracks }))
    }
}

fn non_empty(payload: EnrichmentPayload) -> Result<EnrichmentPayload, EnrichError> {
    if payload.is_empty() {
        Err(EnrichError::EmptyResult)
    } else {
        Ok(payload)
    }
}

/// Trim, drop blanks and case-insensitive duplicates, cap the count
fn clean_list(values: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_list() {
        let cleaned = clean_list(
            vec![" Sea ".into(), "sea".into(), "".into(), "Obsession".into()],
            8,
        );
        assert_eq!(cleaned, vec!["Sea", "Obsession"]);
        assert_eq!(clean_list(vec!["a".into(), "b".into(), "c".into()], 2).len(), 2);
    }
}
