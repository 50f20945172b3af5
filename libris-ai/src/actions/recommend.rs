//! Recommendation action

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{bounded, ActionError, ActionOutcome, PaidActions};
use crate::models::MediaType;
use crate::services::prompts;
use crate::services::response_parser::{parse_structured, JsonShape};
use crate::services::ProviderError;

const MAX_REQUEST_CHARS: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendRequest {
    pub user_id: String,
    pub request: String,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(default, alias = "Creator", alias = "author", alias = "director")]
    pub creator: String,
    #[serde(default, alias = "Reason")]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct RecommendResponse {
    #[serde(default, alias = "offTopic")]
    off_topic: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    recommendations: Vec<Recommendation>,
}

impl PaidActions {
    pub async fn recommend(&self, req: &RecommendRequest) -> Result<ActionOutcome<Vec<Recommendation>>, ActionError> {
        let text = validate_request(&req.request)?;
        self.ledger.check_and_reserve(&req.user_id, self.cost).await?;

        let raw = bounded(self.text.generate(&prompts::recommend_prompt(text, req.media_type))).await?;
        let parsed: RecommendResponse = parse_structured(&raw, JsonShape::Object)?;

        if parsed.off_topic {
            return Ok(ActionOutcome::OffTopic {
                message: parsed
                    .message
                    .unwrap_or_else(|| format!("I can only recommend {}s.", req.media_type)),
                balance: self.ledger.balance(&req.user_id).await?,
            });
        }

        let recommendations: Vec<Recommendation> = parsed
            .recommendations
            .into_iter()
            .filter(|r| !r.title.trim().is_empty())
            .collect();
        if recommendations.is_empty() {
            return Err(ProviderError::Parse("no recommendations in response".to_string()).into());
        }

        let balance = self.ledger.deduct(&req.user_id, self.cost).await?;
        info!(user_id = %req.user_id, count = recommendations.len(), "Recommendations delivered");

        Ok(ActionOutcome::Delivered {
            result: recommendations,
            balance,
        })
    }
}

pub(super) fn validate_request(request: &str) -> Result<&str, ActionError> {
    let text = request.trim();
    if text.is_empty() {
        return Err(ActionError::InvalidRequest("request text is empty".to_string()));
    }
    if text.chars().count() > MAX_REQUEST_CHARS {
        return Err(ActionError::InvalidRequest(format!(
            "request text longer than {} characters",
            MAX_REQUEST_CHARS
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request() {
        assert_eq!(validate_request("  space opera ").unwrap(), "space opera");
        assert!(validate_request("   ").is_err());
        assert!(validate_request(&"x".repeat(501)).is_err());
    }

    #[test]
    fn test_off_topic_shape_parses() {
        let parsed: RecommendResponse =
            parse_structured("{\"off_topic\": true, \"message\": \"Ask me about books\"}", JsonShape::Object)
                .unwrap();
        assert!(parsed.off_topic);
        assert!(parsed.recommendations.is_empty());
    }
}
