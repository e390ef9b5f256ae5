//! MusicBrainz recording search client
//!
//! Finds candidate recording MBIDs for a title/artist pair. Queries run from
//! most to least specific and the ladder stops at the first query that yields
//! a usable candidate:
//!
//! 1. exact-phrase title AND exact-phrase artist
//! 2. exact-phrase title AND unquoted artist
//! 3. title only
//!
//! The looser queries exist because the search backend penalizes strict
//! phrase queries for recordings with messy featured-artist credits.
//!
//! Every request goes through the shared MusicBrainz rate limiter.

use crate::rate_limiter::RateLimiter;
use crate::text_match::escape_search_phrase;
use crate::transport::{HttpRequest, HttpTransport};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const SEARCH_LIMIT: u32 = 10;

/// Relevance floor below which search hits are considered unreliable
pub const MIN_CANDIDATE_SCORE: u32 = 60;

/// Candidates kept per query
pub const MAX_CANDIDATES: usize = 6;

/// A recording that may be the requested song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingCandidate {
    pub mbid: String,
    /// Search relevance, 0-100
    pub score: u32,
}

/// One rung of the search ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub label: &'static str,
    pub lucene: String,
}

/// Search ladder for a title/artist pair, most specific first
pub fn search_queries(title: &str, artist: &str) -> Vec<SearchQuery> {
    let title = escape_search_phrase(title);
    let artist = escape_search_phrase(artist);

    vec![
        SearchQuery {
            label: "phrase title + phrase artist",
            lucene: format!("recording:\"{}\" AND artist:\"{}\"", title, artist),
        },
        SearchQuery {
            label: "phrase title + loose artist",
            lucene: format!("recording:\"{}\" AND artist:({})", title, artist),
        },
        SearchQuery {
            label: "title only",
            lucene: format!("recording:\"{}\"", title),
        },
    ]
}

/// Recording search response (only the fields used here)
#[derive(Debug, Deserialize)]
struct MBSearchResponse {
    #[serde(default)]
    recordings: Vec<MBSearchRecording>,
}

/// One search hit
#[derive(Debug, Clone, Deserialize)]
pub struct MBSearchRecording {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "score_from_number_or_string")]
    pub score: Option<u32>,
}

/// MusicBrainz has served `score` both as a number and as a string
fn score_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Keep hits with an MBID and a score at or above the floor, best first
pub fn filter_candidates(recordings: Vec<MBSearchRecording>) -> Vec<RecordingCandidate> {
    let mut candidates: Vec<RecordingCandidate> = recordings
        .into_iter()
        .filter_map(|r| {
            let mbid = r.id.filter(|id| !id.trim().is_empty())?;
            let score = r.score.filter(|s| *s >= MIN_CANDIDATE_SCORE)?;
            Some(RecordingCandidate { mbid, score })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

/// MusicBrainz recording search client
pub struct MusicBrainzClient {
    transport: Arc<dyn HttpTransport>,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl MusicBrainzClient {
    pub fn new(transport: Arc<dyn HttpTransport>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            transport,
            rate_limiter,
            base_url: MUSICBRAINZ_BASE_URL.to_string(),
        }
    }

    /// Search for candidate recordings
    ///
    /// Returns an empty list when no rung of the ladder produced a candidate.
    /// A failed query counts as an empty one and the next rung is tried.
    pub async fn search_recordings(&self, title: &str, artist: &str) -> Vec<RecordingCandidate> {
        for query in search_queries(title, artist) {
            let Some(recordings) = self.run_query(&query).await else {
                continue;
            };

            let candidates = filter_candidates(recordings);
            if !candidates.is_empty() {
                info!(
                    query = query.label,
                    count = candidates.len(),
                    top_score = candidates[0].score,
                    "MusicBrainz candidates found"
                );
                return candidates;
            }

            debug!(query = query.label, "No MusicBrainz candidates above score floor");
        }

        Vec::new()
    }

    async fn run_query(&self, query: &SearchQuery) -> Option<Vec<MBSearchRecording>> {
        self.rate_limiter.wait().await;

        let request = HttpRequest::get(format!("{}/recording", self.base_url))
            .query("query", query.lucene.clone())
            .query("limit", SEARCH_LIMIT.to_string())
            .query("fmt", "json")
            .header("Accept", "application/json");

        debug!(query = %query.lucene, "Querying MusicBrainz recording search");

        let response = match self.transport.get(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, query = query.label, "MusicBrainz search failed");
                return None;
            }
        };

        if !response.is_success() {
            warn!(
                status = response.status,
                query = query.label,
                "MusicBrainz search returned non-success status"
            );
            return None;
        }

        match serde_json::from_str::<MBSearchResponse>(&response.body) {
            Ok(parsed) => Some(parsed.recordings),
            Err(e) => {
                warn!(error = %e, "MusicBrainz search response could not be parsed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: Option<&str>, score: Option<u32>) -> MBSearchRecording {
        MBSearchRecording {
            id: id.map(str::to_string),
            score,
        }
    }

    #[test]
    fn test_query_ladder() {
        let queries = search_queries("Strobe", "deadmau5");
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].lucene, r#"recording:"Strobe" AND artist:"deadmau5""#);
        assert_eq!(queries[1].lucene, r#"recording:"Strobe" AND artist:(deadmau5)"#);
        assert_eq!(queries[2].lucene, r#"recording:"Strobe""#);
    }

    #[test]
    fn test_queries_escape_quotes() {
        let queries = search_queries("The \"Real\" Slim", "  Eminem ");
        assert_eq!(
            queries[0].lucene,
            r#"recording:"The \"Real\" Slim" AND artist:"Eminem""#
        );
    }

    #[test]
    fn test_filter_candidates() {
        let recordings = vec![
            hit(Some("low"), Some(59)),
            hit(Some("mid"), Some(75)),
            hit(None, Some(100)),
            hit(Some(""), Some(100)),
            hit(Some("top"), Some(98)),
            hit(Some("edge"), Some(60)),
            hit(Some("unscored"), None),
        ];

        let candidates = filter_candidates(recordings);
        let ids: Vec<&str> = candidates.iter().map(|c| c.mbid.as_str()).collect();
        assert_eq!(ids, vec!["top", "mid", "edge"]);
    }

    #[test]
    fn test_filter_truncates_to_six() {
        let recordings = (0..10)
            .map(|i| hit(Some(&format!("r{}", i)), Some(90 + i)))
            .collect();
        let candidates = filter_candidates(recordings);

        assert_eq!(candidates.len(), MAX_CANDIDATES);
        assert_eq!(candidates[0].mbid, "r9");
        assert_eq!(candidates[5].mbid, "r4");
    }

    #[test]
    fn test_score_accepts_number_or_string() {
        let parsed: MBSearchResponse = serde_json::from_str(
            r#"{"recordings":[{"id":"a","score":100},{"id":"b","score":"87"},{"id":"c"}]}"#,
        )
        .unwrap();

        let scores: Vec<Option<u32>> = parsed.recordings.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![Some(100), Some(87), None]);
    }
}
