//! Shared test utilities for camkey-resolver integration tests
//!
//! `FakeTransport` stands in for the network: it answers from a handler
//! closure, logs every request with its arrival time and tracks how many
//! requests overlap.

#![allow(dead_code)]

use async_trait::async_trait;
use camkey_resolver::cache::{CacheStorage, KeyCache};
use camkey_resolver::config::{ResolverSettings, SharedApiKey};
use camkey_resolver::resolver::KeyResolver;
use camkey_resolver::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Minimum provider spacing used by tests (the production floor is 1100ms)
pub const TEST_INTERVAL: Duration = Duration::from_millis(40);

/// Which upstream a request was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    GetSongBpm,
    MusicBrainz,
    AcousticBrainz,
    Unknown,
}

impl Upstream {
    pub fn of(request: &HttpRequest) -> Self {
        if request.url.contains("getsong.co") {
            Upstream::GetSongBpm
        } else if request.url.contains("acousticbrainz.org") {
            Upstream::AcousticBrainz
        } else if request.url.contains("musicbrainz.org") {
            Upstream::MusicBrainz
        } else {
            Upstream::Unknown
        }
    }
}

/// A logged request
#[derive(Debug, Clone)]
pub struct LoggedRequest {
    pub at: Instant,
    pub upstream: Upstream,
    pub request: HttpRequest,
}

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Canned-response transport
pub struct FakeTransport {
    handler: Box<Handler>,
    delay: Duration,
    log: Mutex<Vec<LoggedRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self::with_delay(Duration::ZERO, handler)
    }

    /// Every response is held back by `delay`
    pub fn with_delay<F>(delay: Duration, handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            delay,
            log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_to(&self, upstream: Upstream) -> Vec<LoggedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.upstream == upstream)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        self.log.lock().unwrap().push(LoggedRequest {
            at: Instant::now(),
            upstream: Upstream::of(&request),
            request: request.clone(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = (self.handler)(&request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// Resolver over a fake transport with test-friendly provider spacing
pub fn test_resolver(
    transport: Arc<FakeTransport>,
    storage: Arc<dyn CacheStorage>,
    api_key: Option<&str>,
) -> Arc<KeyResolver> {
    let settings = ResolverSettings {
        musicbrainz_interval: TEST_INTERVAL,
        http_timeout: Duration::from_secs(5),
    };

    Arc::new(KeyResolver::new(
        transport,
        KeyCache::new(storage),
        SharedApiKey::new(api_key.map(str::to_string)),
        &settings,
    ))
}

pub fn ok(body: String) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(200, body))
}

pub fn status(code: u16) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(code, ""))
}

/// GetSongBPM search body: (id, title, artist, key_of)
pub fn gsb_songs(songs: &[(&str, &str, &str, Option<&str>)]) -> String {
    let search: Vec<_> = songs
        .iter()
        .map(|(id, title, artist, key_of)| {
            json!({
                "song_id": id,
                "song_title": title,
                "artist": { "name": artist },
                "key_of": key_of,
            })
        })
        .collect();

    json!({ "search": search }).to_string()
}

/// GetSongBPM body for an empty search
pub fn gsb_no_result() -> String {
    json!({ "search": { "error": "no result" } }).to_string()
}

/// MusicBrainz recording search body: (mbid, score)
pub fn mb_recordings(recordings: &[(&str, u32)]) -> String {
    let recordings: Vec<_> = recordings
        .iter()
        .map(|(id, score)| json!({ "id": id, "score": score, "title": "whatever" }))
        .collect();

    json!({ "created": "2024-01-01T00:00:00.000Z", "count": recordings.len(), "recordings": recordings })
        .to_string()
}

/// AcousticBrainz low-level body with `key_*` tonal fields
pub fn ab_key(key: &str, scale: &str) -> String {
    json!({
        "metadata": { "audio_properties": { "length": 300.0 } },
        "tonal": { "key_key": key, "key_scale": scale, "key_strength": 0.6 },
    })
    .to_string()
}

/// AcousticBrainz low-level body with only `chords_*` tonal fields
pub fn ab_chords(key: &str, scale: &str) -> String {
    json!({
        "tonal": { "chords_key": key, "chords_scale": scale },
    })
    .to_string()
}

/// AcousticBrainz low-level body with no tonal section
pub fn ab_without_tonal() -> String {
    json!({ "rhythm": { "bpm": 128.0 } }).to_string()
}

/// MBID addressed by an AcousticBrainz low-level URL
pub fn ab_mbid(request: &HttpRequest) -> &str {
    request
        .url
        .trim_end_matches("/low-level")
        .rsplit('/')
        .next()
        .unwrap_or("")
}

/// Submission index of an AcousticBrainz request
pub fn ab_submission(request: &HttpRequest) -> u32 {
    request
        .query_value("n")
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

/// Position of a MusicBrainz search in the query ladder (1 = most specific)
pub fn mb_rung(request: &HttpRequest) -> u8 {
    let query = request.query_value("query").unwrap_or("");
    if query.contains("AND artist:\"") {
        1
    } else if query.contains("AND artist:(") {
        2
    } else {
        3
    }
}
