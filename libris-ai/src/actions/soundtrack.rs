//! Soundtrack action: model picks search terms, music catalogue supplies tracks

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use super::recommend::validate_request;
use super::{bounded, ActionError, ActionOutcome, PaidActions};
use crate::models::Track;
use crate::services::prompts;
use crate::services::response_parser::{parse_structured, JsonShape};
use crate::services::ProviderError;

const MAX_SEARCH_TERMS: usize = 3;
const TRACKS_PER_TERM: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct SoundtrackRequest {
    pub user_id: String,
    pub request: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundtrackResult {
    pub message: String,
    pub search_terms: Vec<String>,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct SoundtrackResponse {
    #[serde(default, alias = "offTopic")]
    off_topic: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "searchTerms")]
    search_terms: Vec<String>,
}

impl PaidActions {
    pub async fn soundtrack(&self, req: &SoundtrackRequest) -> Result<ActionOutcome<SoundtrackResult>, ActionError> {
        let text = validate_request(&req.request)?;
        self.ledger.check_and_reserve(&req.user_id, self.cost).await?;

        let raw = bounded(self.text.generate(&prompts::soundtrack_prompt(text))).await?;
        let parsed: SoundtrackResponse = parse_structured(&raw, JsonShape::Object)?;

        if parsed.off_topic {
            return Ok(ActionOutcome::OffTopic {
                message: parsed
                    .message
                    .unwrap_or_else(|| "I can only suggest music.".to_string()),
                balance: self.ledger.balance(&req.user_id).await?,
            });
        }

        let terms: Vec<String> = parsed
            .search_terms
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(MAX_SEARCH_TERMS)
            .collect();
        if terms.is_empty() {
            return Err(ProviderError::Parse("no search terms in response".to_string()).into());
        }

        let mut seen = HashSet::new();
        let mut tracks = Vec::new();
        for term in &terms {
            match bounded(self.music.search_tracks(term, TRACKS_PER_TERM)).await {
                Ok(found) => tracks.extend(
                    found
                        .into_iter()
                        .filter(|t| seen.insert((t.title.to_lowercase(), t.artist.to_lowercase()))),
                ),
                Err(e) => warn!(term = %term, error = %e, "Music search failed for term"),
            }
        }
        if tracks.is_empty() {
            return Err(ProviderError::Parse("music search returned no tracks".to_string()).into());
        }

        let balance = self.ledger.deduct(&req.user_id, self.cost).await?;
        info!(user_id = %req.user_id, tracks = tracks.len(), "Soundtrack delivered");

        Ok(ActionOutcome::Delivered {
            result: SoundtrackResult {
                message: parsed.message.unwrap_or_default(),
                search_terms: terms,
                tracks,
            },
            balance,
        })
    }
}
