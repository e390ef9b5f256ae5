//! Fallback provider: MusicBrainz search, then AcousticBrainz tonal data
//!
//! Candidates from the recording search are tried in relevance order; the
//! first one with tonal data becomes the hit. When none has any, the miss
//! keeps the best candidate's MBID and score for diagnostics.

use crate::key_theory::camelot_code;
use crate::rate_limiter::RateLimiter;
use crate::services::{AcousticBrainzClient, MusicBrainzClient};
use crate::transport::HttpTransport;
use camkey_common::{KeyMatch, KeyOutcome, MissDiagnostics, Provider};
use std::sync::Arc;
use tracing::info;

/// Two-stage MusicBrainz/AcousticBrainz provider
pub struct MusicBrainzProvider {
    musicbrainz: MusicBrainzClient,
    acousticbrainz: AcousticBrainzClient,
}

impl MusicBrainzProvider {
    /// Both stages share `rate_limiter`
    pub fn new(transport: Arc<dyn HttpTransport>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            musicbrainz: MusicBrainzClient::new(Arc::clone(&transport), Arc::clone(&rate_limiter)),
            acousticbrainz: AcousticBrainzClient::new(transport, rate_limiter),
        }
    }

    pub async fn lookup(&self, title: &str, artist: &str) -> KeyOutcome {
        let candidates = self.musicbrainz.search_recordings(title, artist).await;

        for candidate in &candidates {
            let Some(parsed) = self.acousticbrainz.fetch_tonal_data(&candidate.mbid).await else {
                continue;
            };
            let Some(camelot) = camelot_code(&parsed.key, parsed.mode) else {
                continue;
            };

            info!(
                title = %title,
                artist = %artist,
                mbid = %candidate.mbid,
                camelot = %camelot,
                "Key resolved via MusicBrainz/AcousticBrainz"
            );

            return KeyOutcome::Hit(KeyMatch {
                camelot,
                key: parsed.key,
                mode: parsed.mode,
                provider: Provider::MusicBrainz,
                provider_id: None,
                mbid: Some(candidate.mbid.clone()),
                score: Some(candidate.score),
            });
        }

        info!(
            title = %title,
            artist = %artist,
            candidates = candidates.len(),
            "No tonal data for any MusicBrainz candidate"
        );

        let top = candidates.first();
        KeyOutcome::Miss(MissDiagnostics {
            mbid: top.map(|c| c.mbid.clone()),
            score: top.map(|c| c.score),
        })
    }
}
