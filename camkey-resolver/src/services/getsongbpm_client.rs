//! GetSongBPM API client
//!
//! Primary key provider. One search request per lookup; results are ranked by
//! fuzzy title/artist similarity and the first of the top five whose key
//! string parses wins, even when a higher-ranked result carries no usable key.
//!
//! Every failure (no credential, transport error, non-success status, empty
//! result list, unusable keys) yields `None` so the caller falls back to
//! MusicBrainz.

use crate::config::SharedApiKey;
use crate::key_theory::{camelot_code, parse_provider_key_string};
use crate::text_match::{collapse_whitespace, token_overlap_score};
use crate::transport::{HttpRequest, HttpTransport};
use camkey_common::{KeyMatch, Provider};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const GETSONGBPM_BASE_URL: &str = "https://api.getsong.co/";
const SEARCH_LIMIT: u32 = 10;

/// How many of the best-ranked results are checked for a usable key
const CANDIDATES_EXAMINED: usize = 5;

const TITLE_WEIGHT: f64 = 0.7;
const ARTIST_WEIGHT: f64 = 0.3;

/// Search endpoint response
///
/// `search` is an array of songs on success and an object such as
/// `{"error": "no result"}` when nothing matched.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Option<SearchField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchField {
    Songs(Vec<GsbSong>),
    Other(serde_json::Value),
}

/// One song in the search results
#[derive(Debug, Clone, Deserialize)]
pub struct GsbSong {
    #[serde(default, alias = "song_id")]
    pub id: Option<String>,
    #[serde(default, alias = "song_title")]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<GsbArtist>,
    /// Raw key string, e.g. `F♯m`, `Bb`, `E minor`
    #[serde(default)]
    pub key_of: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GsbArtist {
    #[serde(default)]
    pub name: Option<String>,
}

impl GsbSong {
    fn artist_name(&self) -> &str {
        self.artist
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or("")
    }

    /// Weighted similarity to the requested title and artist
    fn match_score(&self, title: &str, artist: &str) -> f64 {
        TITLE_WEIGHT * token_overlap_score(self.title.as_deref().unwrap_or(""), title)
            + ARTIST_WEIGHT * token_overlap_score(self.artist_name(), artist)
    }
}

/// GetSongBPM API client
pub struct GetSongBpmClient {
    transport: Arc<dyn HttpTransport>,
    api_key: SharedApiKey,
    base_url: String,
}

impl GetSongBpmClient {
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: SharedApiKey) -> Self {
        Self {
            transport,
            api_key,
            base_url: GETSONGBPM_BASE_URL.to_string(),
        }
    }

    /// Build the search request for a title/artist pair
    pub fn search_request(&self, title: &str, artist: &str, api_key: &str) -> HttpRequest {
        let lookup = format!(
            "song:{} artist:{}",
            collapse_whitespace(title),
            collapse_whitespace(artist)
        );

        HttpRequest::get(format!("{}search/", self.base_url))
            .query("type", "both")
            .query("lookup", lookup)
            .query("limit", SEARCH_LIMIT.to_string())
            .header("X-API-KEY", api_key)
            .header("Accept", "application/json")
    }

    /// Look up the key of a song
    pub async fn lookup(&self, title: &str, artist: &str) -> Option<KeyMatch> {
        let Some(api_key) = self.api_key.get().await else {
            warn!("GetSongBPM API key not configured, skipping primary provider");
            return None;
        };

        let request = self.search_request(title, artist, &api_key);
        debug!(title = %title, artist = %artist, "Querying GetSongBPM search");

        let response = match self.transport.get(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "GetSongBPM request failed");
                return None;
            }
        };

        if !response.is_success() {
            warn!(status = response.status, "GetSongBPM returned non-success status");
            return None;
        }

        let songs = match serde_json::from_str::<SearchResponse>(&response.body) {
            Ok(SearchResponse {
                search: Some(SearchField::Songs(songs)),
            }) => songs,
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "GetSongBPM response could not be parsed");
                return None;
            }
        };

        if songs.is_empty() {
            debug!(title = %title, artist = %artist, "GetSongBPM returned no results");
            return None;
        }

        let key_match = select_candidate(songs, title, artist);
        match &key_match {
            Some(m) => info!(
                title = %title,
                artist = %artist,
                camelot = %m.camelot,
                "Key resolved via GetSongBPM"
            ),
            None => debug!(title = %title, artist = %artist, "No usable GetSongBPM key"),
        }
        key_match
    }
}

/// Rank results and take the first usable key among the top candidates
pub fn select_candidate(songs: Vec<GsbSong>, title: &str, artist: &str) -> Option<KeyMatch> {
    let mut scored: Vec<(f64, GsbSong)> = songs
        .into_iter()
        .map(|song| (song.match_score(title, artist), song))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    scored
        .into_iter()
        .take(CANDIDATES_EXAMINED)
        .find_map(|(_, song)| {
            let parsed = parse_provider_key_string(song.key_of.as_deref()?)?;
            let camelot = camelot_code(&parsed.key, parsed.mode)?;
            Some(KeyMatch {
                camelot,
                key: parsed.key,
                mode: parsed.mode,
                provider: Provider::GetSongBpm,
                provider_id: song.id,
                mbid: None,
                score: None,
            })
        })
}
