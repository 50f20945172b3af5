//! Enrichment kinds and their per-kind policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::item::MediaType;

/// One named background-computed attribute of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentKind {
    /// Summary description and tag list
    Details,
    /// Character roster with relationships (books)
    Characters,
    /// Node/link relationship graph (movies)
    RelationGraph,
    /// Generated quotation
    Quote,
    /// Generated cover image stored as a blob
    Cover,
    /// Mood tags plus matching music tracks
    Mood,
}

/// How a cached kind identifies "the same work" across owners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// Title combined with the first listed author
    TitleAndFirstAuthor,
    /// Title combined with the external catalogue id (title alone when absent)
    TitleAndExternalId,
}

impl EnrichmentKind {
    pub const ALL: [EnrichmentKind; 6] = [
        EnrichmentKind::Details,
        EnrichmentKind::Characters,
        EnrichmentKind::RelationGraph,
        EnrichmentKind::Quote,
        EnrichmentKind::Cover,
        EnrichmentKind::Mood,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentKind::Details => "details",
            EnrichmentKind::Characters => "characters",
            EnrichmentKind::RelationGraph => "relation_graph",
            EnrichmentKind::Quote => "quote",
            EnrichmentKind::Cover => "cover",
            EnrichmentKind::Mood => "mood",
        }
    }

    /// Whether this kind can be requested for the given media type
    pub fn applies_to(&self, media: MediaType) -> bool {
        match self {
            EnrichmentKind::Characters => media == MediaType::Book,
            EnrichmentKind::RelationGraph => media == MediaType::Movie,
            _ => true,
        }
    }

    /// Cross-owner cache policy; `None` means results are novel per request
    pub fn cache_scope(&self) -> Option<CacheScope> {
        match self {
            EnrichmentKind::Characters => Some(CacheScope::TitleAndFirstAuthor),
            EnrichmentKind::RelationGraph => Some(CacheScope::TitleAndExternalId),
            _ => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cache_scope().is_some()
    }

    /// Upper bound on one external call for this kind
    pub fn call_timeout(&self) -> Duration {
        match self {
            EnrichmentKind::Details => Duration::from_secs(60),
            EnrichmentKind::Characters | EnrichmentKind::RelationGraph => Duration::from_secs(120),
            EnrichmentKind::Quote => Duration::from_secs(15),
            EnrichmentKind::Cover => Duration::from_secs(120),
            EnrichmentKind::Mood => Duration::from_secs(30),
        }
    }

    /// Age after which a `processing` claim is considered abandoned
    pub fn stale_timeout(&self) -> Duration {
        match self {
            EnrichmentKind::Characters | EnrichmentKind::RelationGraph | EnrichmentKind::Cover => {
                Duration::from_secs(10 * 60)
            }
            EnrichmentKind::Details | EnrichmentKind::Quote | EnrichmentKind::Mood => {
                Duration::from_secs(5 * 60)
            }
        }
    }

    /// Kinds queued automatically when an item is created with auto-enrichment
    pub fn auto_kinds(media: MediaType) -> Vec<EnrichmentKind> {
        match media {
            MediaType::Book => vec![EnrichmentKind::Details, EnrichmentKind::Characters],
            MediaType::Movie => vec![EnrichmentKind::Details, EnrichmentKind::RelationGraph],
        }
    }
}

impl fmt::Display for EnrichmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrichmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnrichmentKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown enrichment kind '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_applicability() {
        assert!(EnrichmentKind::Characters.applies_to(MediaType::Book));
        assert!(!EnrichmentKind::Characters.applies_to(MediaType::Movie));
        assert!(EnrichmentKind::RelationGraph.applies_to(MediaType::Movie));
        assert!(!EnrichmentKind::RelationGraph.applies_to(MediaType::Book));
        assert!(EnrichmentKind::Quote.applies_to(MediaType::Book));
        assert!(EnrichmentKind::Mood.applies_to(MediaType::Movie));
    }

    #[test]
    fn test_only_analysis_kinds_are_cached() {
        let cached: Vec<_> = EnrichmentKind::ALL.iter().filter(|k| k.is_cached()).collect();
        assert_eq!(cached, vec![&EnrichmentKind::Characters, &EnrichmentKind::RelationGraph]);
    }

    #[test]
    fn test_timeouts_within_observed_bounds() {
        for kind in EnrichmentKind::ALL {
            let call = kind.call_timeout();
            let stale = kind.stale_timeout();
            assert!(call >= Duration::from_secs(15) && call <= Duration::from_secs(120));
            assert!(stale >= Duration::from_secs(300) && stale <= Duration::from_secs(600));
            assert!(stale > call, "{} stale timeout must outlast its call", kind);
        }
    }

    #[test]
    fn test_auto_kinds_per_media() {
        assert_eq!(
            EnrichmentKind::auto_kinds(MediaType::Book),
            vec![EnrichmentKind::Details, EnrichmentKind::Characters]
        );
        assert_eq!(
            EnrichmentKind::auto_kinds(MediaType::Movie),
            vec![EnrichmentKind::Details, EnrichmentKind::RelationGraph]
        );
    }

    #[test]
    fn test_parse_and_serde_agree() {
        for kind in EnrichmentKind::ALL {
            assert_eq!(kind.as_str().parse::<EnrichmentKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("summary".parse::<EnrichmentKind>().is_err());
    }
}
