//! Resolution orchestrator
//!
//! `resolve` checks the cache, tries GetSongBPM, falls back to
//! MusicBrainz/AcousticBrainz, and caches whatever the last stage produced.
//! Misses are cached too, so a song with no data is not re-queried until its
//! record goes stale.

use crate::cache::KeyCache;
use crate::config::{ResolverSettings, SharedApiKey};
use crate::rate_limiter::RateLimiter;
use crate::services::{GetSongBpmClient, MusicBrainzProvider};
use crate::transport::HttpTransport;
use camkey_common::{KeyOutcome, LookupRequest, ResolvedKey, Result};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Top-level key resolver
pub struct KeyResolver {
    cache: KeyCache,
    getsongbpm: GetSongBpmClient,
    musicbrainz: MusicBrainzProvider,
}

impl KeyResolver {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: KeyCache,
        api_key: SharedApiKey,
        settings: &ResolverSettings,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(settings.musicbrainz_interval));

        Self {
            cache,
            getsongbpm: GetSongBpmClient::new(Arc::clone(&transport), api_key),
            musicbrainz: MusicBrainzProvider::new(transport, rate_limiter),
        }
    }

    /// Resolve the key for one request
    ///
    /// Only storage failures are returned as errors; provider failures fall
    /// through to the next provider and finally to a cached miss.
    pub async fn resolve(&self, request: &LookupRequest) -> Result<ResolvedKey> {
        if let Some(cached) = self.cache.get_fresh(&request.cache_key).await? {
            debug!(cache_key = %request.cache_key, hit = cached.is_hit(), "Cache hit");
            return Ok(cached);
        }

        let outcome = match self.getsongbpm.lookup(&request.title, &request.artist).await {
            Some(key_match) => KeyOutcome::Hit(key_match),
            None => {
                self.musicbrainz
                    .lookup(&request.title, &request.artist)
                    .await
            }
        };

        let resolved = ResolvedKey {
            outcome,
            cached_at: record_timestamp(),
        };
        self.cache.set(&request.cache_key, &resolved).await?;

        info!(
            cache_key = %request.cache_key,
            camelot = %resolved.camelot().map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            provider = %resolved.provider().map(|p| p.as_str()).unwrap_or("none"),
            "Resolution cached"
        );

        Ok(resolved)
    }
}

/// Current time at the millisecond precision records are stored with
///
/// Keeps a freshly resolved record equal to the one later read from cache.
fn record_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
