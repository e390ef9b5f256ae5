//! Resolution pipeline tests
//!
//! Provider order, cache behavior, fallback and rate limiting, all over a fake
//! transport.

mod helpers;

use camkey_common::{LookupRequest, MissDiagnostics, Mode, Provider, ResolvedKey};
use camkey_resolver::cache::{CacheStorage, KeyCache, MemoryCacheStorage};
use camkey_resolver::transport::TransportError;
use chrono::{Duration, SubsecRound, Utc};
use helpers::*;
use std::sync::Arc;

#[tokio::test]
async fn test_getsongbpm_hit_skips_musicbrainz() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::GetSongBpm => ok(gsb_songs(&[
            ("gsb-1", "Strobe", "deadmau5", Some("F#m")),
            ("gsb-2", "Ghosts 'n' Stuff", "deadmau5", Some("Cm")),
        ])),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), Some("k"));

    let resolved = resolver
        .resolve(&LookupRequest::new("Strobe", "deadmau5"))
        .await
        .unwrap();

    let m = resolved.key_match().expect("expected a hit");
    assert_eq!(m.camelot.to_string(), "11A");
    assert_eq!(m.key, "F#");
    assert_eq!(m.mode, Mode::Minor);
    assert_eq!(m.provider, Provider::GetSongBpm);
    assert_eq!(m.provider_id.as_deref(), Some("gsb-1"));

    assert_eq!(transport.request_count(), 1);
    let gsb = &transport.requests_to(Upstream::GetSongBpm)[0].request;
    assert_eq!(gsb.query_value("lookup"), Some("song:Strobe artist:deadmau5"));
}

#[tokio::test]
async fn test_no_credential_goes_straight_to_musicbrainz() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => ok(mb_recordings(&[("mb-1", 100)])),
        Upstream::AcousticBrainz => ok(ab_key("A", "minor")),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), None);

    let resolved = resolver
        .resolve(&LookupRequest::new("Strobe", "deadmau5"))
        .await
        .unwrap();

    assert!(transport.requests_to(Upstream::GetSongBpm).is_empty());
    let m = resolved.key_match().unwrap();
    assert_eq!(m.camelot.to_string(), "8A");
    assert_eq!(m.provider, Provider::MusicBrainz);
    assert_eq!(m.mbid.as_deref(), Some("mb-1"));
    assert_eq!(m.score, Some(100));
}

#[tokio::test]
async fn test_miss_when_nothing_clears_score_floor() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => ok(mb_recordings(&[("weak", 59), ("weaker", 20)])),
        _ => status(500),
    });
    let storage = Arc::new(MemoryCacheStorage::new());
    let resolver = test_resolver(transport.clone(), storage.clone(), None);
    let request = LookupRequest::new("Obscure", "Nobody");

    let resolved = resolver.resolve(&request).await.unwrap();

    assert!(!resolved.is_hit());
    assert_eq!(resolved.outcome, camkey_common::KeyOutcome::Miss(MissDiagnostics::default()));

    // whole search ladder was walked, no tonal lookups
    assert_eq!(transport.requests_to(Upstream::MusicBrainz).len(), 3);
    assert!(transport.requests_to(Upstream::AcousticBrainz).is_empty());

    // the miss is cached and served without further requests
    assert_eq!(storage.len().await, 1);
    let again = resolver.resolve(&request).await.unwrap();
    assert_eq!(again, resolved);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn test_cached_result_served_without_provider_calls() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::GetSongBpm => ok(gsb_songs(&[("id", "Levels", "Avicii", Some("C#m"))])),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), Some("k"));

    let first = resolver
        .resolve(&LookupRequest::new("Levels", "Avicii"))
        .await
        .unwrap();
    // same cache key regardless of case
    let second = resolver
        .resolve(&LookupRequest::new("LEVELS", "avicii"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.camelot().unwrap().to_string(), "12A");
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_stale_record_is_resolved_again() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::GetSongBpm => ok(gsb_songs(&[("new", "Strobe", "deadmau5", Some("F#m"))])),
        _ => status(500),
    });
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let cache = KeyCache::new(storage.clone());
    let request = LookupRequest::new("Strobe", "deadmau5");

    let stale = ResolvedKey::miss(
        MissDiagnostics::default(),
        (Utc::now() - Duration::days(31)).trunc_subsecs(3),
    );
    cache.set(&request.cache_key, &stale).await.unwrap();

    let resolver = test_resolver(transport.clone(), storage, Some("k"));
    let resolved = resolver.resolve(&request).await.unwrap();

    assert_eq!(transport.request_count(), 1);
    assert_eq!(resolved.camelot().unwrap().to_string(), "11A");
    assert!(resolved.cached_at > stale.cached_at);

    let stored = cache.get(&request.cache_key).await.unwrap().unwrap();
    assert_eq!(stored, resolved);
}

#[tokio::test]
async fn test_fresh_record_just_inside_ttl_is_used() {
    let transport = FakeTransport::new(|_| status(500));
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let request = LookupRequest::new("Old", "Song");

    let cached = ResolvedKey::miss(
        MissDiagnostics {
            mbid: Some("mb-x".to_string()),
            score: Some(77),
        },
        (Utc::now() - Duration::days(29)).trunc_subsecs(3),
    );
    KeyCache::new(storage.clone())
        .set(&request.cache_key, &cached)
        .await
        .unwrap();

    let resolver = test_resolver(transport.clone(), storage, Some("k"));
    assert_eq!(resolver.resolve(&request).await.unwrap(), cached);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_getsongbpm_failure_falls_back() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::GetSongBpm => Err(TransportError::Timeout("deadline elapsed".to_string())),
        Upstream::MusicBrainz => ok(mb_recordings(&[("mb-1", 95)])),
        Upstream::AcousticBrainz => ok(ab_key("Bb", "major")),
        Upstream::Unknown => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), Some("k"));

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Artist"))
        .await
        .unwrap();

    let m = resolved.key_match().unwrap();
    assert_eq!(m.key, "A#");
    assert_eq!(m.camelot.to_string(), "6B");
    assert_eq!(m.provider, Provider::MusicBrainz);
}

#[tokio::test]
async fn test_unusable_getsongbpm_keys_fall_back() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::GetSongBpm => ok(gsb_songs(&[
            ("a", "Song", "Artist", None),
            ("b", "Song", "Artist", Some("")),
        ])),
        Upstream::MusicBrainz => ok(mb_recordings(&[])),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), Some("k"));

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Artist"))
        .await
        .unwrap();

    assert!(!resolved.is_hit());
    assert_eq!(transport.requests_to(Upstream::MusicBrainz).len(), 3);
}

#[tokio::test]
async fn test_acousticbrainz_walks_candidates_and_submissions() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::GetSongBpm => ok(gsb_no_result()),
        Upstream::MusicBrainz => ok(mb_recordings(&[("mb-2", 90), ("mb-1", 100)])),
        Upstream::AcousticBrainz => match (ab_mbid(request), ab_submission(request)) {
            ("mb-1", _) => status(404),
            ("mb-2", 0) => ok(ab_without_tonal()),
            ("mb-2", 1) => ok(ab_chords("E", "minor")),
            _ => status(500),
        },
        Upstream::Unknown => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), Some("k"));

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Artist"))
        .await
        .unwrap();

    let m = resolved.key_match().unwrap();
    assert_eq!(m.camelot.to_string(), "9A");
    assert_eq!(m.mbid.as_deref(), Some("mb-2"));
    assert_eq!(m.score, Some(90));

    // first rung already had candidates
    assert_eq!(transport.requests_to(Upstream::MusicBrainz).len(), 1);

    let ab: Vec<(String, u32)> = transport
        .requests_to(Upstream::AcousticBrainz)
        .iter()
        .map(|r| (ab_mbid(&r.request).to_string(), ab_submission(&r.request)))
        .collect();
    assert_eq!(
        ab,
        vec![
            ("mb-1".to_string(), 0),
            ("mb-2".to_string(), 0),
            ("mb-2".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn test_miss_keeps_top_candidate_diagnostics() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => ok(mb_recordings(&[("second", 80), ("first", 97)])),
        Upstream::AcousticBrainz => ok(ab_without_tonal()),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), None);

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Artist"))
        .await
        .unwrap();

    assert_eq!(
        resolved.outcome,
        camkey_common::KeyOutcome::Miss(MissDiagnostics {
            mbid: Some("first".to_string()),
            score: Some(97),
        })
    );
    // three submissions for each of the two candidates
    assert_eq!(transport.requests_to(Upstream::AcousticBrainz).len(), 6);
}

#[tokio::test]
async fn test_musicbrainz_family_requests_are_spaced() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => ok(mb_recordings(&[("a", 90), ("b", 85)])),
        Upstream::AcousticBrainz => status(404),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), None);

    resolver
        .resolve(&LookupRequest::new("One", "Artist"))
        .await
        .unwrap();
    resolver
        .resolve(&LookupRequest::new("Two", "Artist"))
        .await
        .unwrap();

    let times: Vec<_> = transport
        .requests()
        .iter()
        .filter(|r| r.upstream != Upstream::GetSongBpm)
        .map(|r| r.at)
        .collect();
    assert_eq!(times.len(), 6);

    let tolerance = std::time::Duration::from_millis(5);
    for pair in times.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(
            gap + tolerance >= TEST_INTERVAL,
            "requests only {:?} apart",
            gap
        );
    }
}

#[tokio::test]
async fn test_search_stops_at_second_query() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => match mb_rung(request) {
            1 => ok(mb_recordings(&[("weak", 40)])),
            2 => ok(mb_recordings(&[("b", 70)])),
            _ => status(500),
        },
        Upstream::AcousticBrainz => ok(ab_key("D", "major")),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), None);

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Feat. Artist"))
        .await
        .unwrap();

    let m = resolved.key_match().unwrap();
    assert_eq!(m.camelot.to_string(), "10B");
    assert_eq!(m.mbid.as_deref(), Some("b"));
    assert_eq!(m.score, Some(70));

    let rungs: Vec<u8> = transport
        .requests_to(Upstream::MusicBrainz)
        .iter()
        .map(|r| mb_rung(&r.request))
        .collect();
    assert_eq!(rungs, vec![1, 2]);
}

#[tokio::test]
async fn test_search_reaches_title_only_query() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => match mb_rung(request) {
            3 => ok(mb_recordings(&[("c", 65)])),
            _ => ok(mb_recordings(&[])),
        },
        Upstream::AcousticBrainz => ok(ab_key("G", "minor")),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), None);

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Artist"))
        .await
        .unwrap();

    assert_eq!(resolved.camelot().unwrap().to_string(), "6A");
    assert_eq!(resolved.key_match().unwrap().mbid.as_deref(), Some("c"));
    assert_eq!(transport.requests_to(Upstream::MusicBrainz).len(), 3);
}

#[tokio::test]
async fn test_failed_search_query_moves_to_next() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => match mb_rung(request) {
            1 => status(503),
            2 => ok(mb_recordings(&[("b", 70)])),
            _ => status(500),
        },
        Upstream::AcousticBrainz => status(500),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), None);

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Artist"))
        .await
        .unwrap();

    // a server error on submission 0 ends the recording, like a 404
    assert_eq!(
        resolved.outcome,
        camkey_common::KeyOutcome::Miss(MissDiagnostics {
            mbid: Some("b".to_string()),
            score: Some(70),
        })
    );
    assert_eq!(transport.requests_to(Upstream::MusicBrainz).len(), 2);

    let ab = transport.requests_to(Upstream::AcousticBrainz);
    assert_eq!(ab.len(), 1);
    assert_eq!(ab_submission(&ab[0].request), 0);
}

#[tokio::test]
async fn test_search_transport_error_moves_to_next() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => match mb_rung(request) {
            1 | 2 => Err(TransportError::Network("connection reset".to_string())),
            _ => ok(mb_recordings(&[("c", 88)])),
        },
        Upstream::AcousticBrainz => ok(ab_key("F", "minor")),
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), None);

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Artist"))
        .await
        .unwrap();

    assert_eq!(resolved.camelot().unwrap().to_string(), "4A");
    assert_eq!(transport.requests_to(Upstream::MusicBrainz).len(), 3);
}

#[tokio::test]
async fn test_unparseable_submission_moves_to_next_index() {
    let transport = FakeTransport::new(|request| match Upstream::of(request) {
        Upstream::MusicBrainz => ok(mb_recordings(&[("mb-1", 99)])),
        Upstream::AcousticBrainz => match ab_submission(request) {
            0 => ok("{\"tonal\": [truncated".to_string()),
            1 => ok(ab_key("C", "major")),
            _ => status(500),
        },
        _ => status(500),
    });
    let resolver = test_resolver(transport.clone(), Arc::new(MemoryCacheStorage::new()), None);

    let resolved = resolver
        .resolve(&LookupRequest::new("Song", "Artist"))
        .await
        .unwrap();

    assert_eq!(resolved.camelot().unwrap().to_string(), "8B");
    let submissions: Vec<u32> = transport
        .requests_to(Upstream::AcousticBrainz)
        .iter()
        .map(|r| ab_submission(&r.request))
        .collect();
    assert_eq!(submissions, vec![0, 1]);
}
