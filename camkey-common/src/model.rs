//! Resolved-key data model and the lookup message contract
//!
//! A resolution ends in either a [`KeyMatch`] (a provider produced usable tonal
//! data) or a [`MissDiagnostics`] record (nothing usable was found). Both are
//! wrapped in a [`ResolvedKey`] stamped with the time it was produced, and both
//! are cached.
//!
//! On the wire and in storage a `ResolvedKey` is the flat record the page
//! overlay consumes:
//!
//! ```json
//! { "camelot": "11A", "key": "F#", "mode": "minor", "provider": "getsongbpm",
//!   "providerId": "x9Ke", "mbid": null, "score": null, "cachedAt": 1760000000000 }
//! ```
//!
//! A miss has every field except `cachedAt` null, apart from the optional
//! MusicBrainz diagnostics (`mbid`, `score`) of the best candidate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Build the cache key for a (title, artist) pair
///
/// `"ta:" + lowercase(title) + "|" + lowercase(artist)`
pub fn cache_key(title: &str, artist: &str) -> String {
    format!("ta:{}|{}", title.to_lowercase(), artist.to_lowercase())
}

/// Musical scale of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    /// Accepts `major` / `minor` in any case, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(Mode::Major),
            "minor" => Ok(Mode::Minor),
            other => Err(format!("unknown scale: {:?}", other)),
        }
    }
}

/// External data provider that produced a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    /// Commercial song-metadata API (primary)
    #[serde(rename = "getsongbpm")]
    GetSongBpm,
    /// MusicBrainz recording search + AcousticBrainz tonal data (fallback)
    #[serde(rename = "musicbrainz")]
    MusicBrainz,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GetSongBpm => "getsongbpm",
            Provider::MusicBrainz => "musicbrainz",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position on the Camelot wheel: `1A`..`12A` (minor), `1B`..`12B` (major)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CamelotCode {
    number: u8,
    mode: Mode,
}

impl CamelotCode {
    /// Returns `None` unless `number` is within 1..=12
    pub fn new(number: u8, mode: Mode) -> Option<Self> {
        (1..=12).contains(&number).then_some(Self { number, mode })
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// `A` for minor keys, `B` for major keys
    pub fn letter(&self) -> char {
        match self.mode {
            Mode::Minor => 'A',
            Mode::Major => 'B',
        }
    }
}

impl fmt::Display for CamelotCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.letter())
    }
}

impl FromStr for CamelotCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || format!("invalid Camelot code: {:?}", s);

        let letter = s.chars().last().ok_or_else(invalid)?;
        let mode = match letter.to_ascii_uppercase() {
            'A' => Mode::Minor,
            'B' => Mode::Major,
            _ => return Err(invalid()),
        };
        let number: u8 = s[..s.len() - letter.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;

        CamelotCode::new(number, mode).ok_or_else(invalid)
    }
}

impl From<CamelotCode> for String {
    fn from(code: CamelotCode) -> Self {
        code.to_string()
    }
}

impl TryFrom<String> for CamelotCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A usable key found by one of the providers
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMatch {
    pub camelot: CamelotCode,
    /// Normalized note name (sharps only, e.g. `F#`)
    pub key: String,
    pub mode: Mode,
    pub provider: Provider,
    /// Provider-side song identifier (GetSongBPM only)
    pub provider_id: Option<String>,
    /// MusicBrainz recording identifier (MusicBrainz only)
    pub mbid: Option<String>,
    /// MusicBrainz search relevance (MusicBrainz only)
    pub score: Option<u32>,
}

/// Diagnostics retained when no provider produced a usable key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissDiagnostics {
    /// Best MusicBrainz candidate, if the search found any
    pub mbid: Option<String>,
    pub score: Option<u32>,
}

/// Terminal outcome of one resolution
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Hit(KeyMatch),
    Miss(MissDiagnostics),
}

/// Outcome of a resolution plus the time it was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ResolvedKeyRecord", try_from = "ResolvedKeyRecord")]
pub struct ResolvedKey {
    pub outcome: KeyOutcome,
    pub cached_at: DateTime<Utc>,
}

impl ResolvedKey {
    pub fn hit(key_match: KeyMatch, cached_at: DateTime<Utc>) -> Self {
        Self {
            outcome: KeyOutcome::Hit(key_match),
            cached_at,
        }
    }

    pub fn miss(diagnostics: MissDiagnostics, cached_at: DateTime<Utc>) -> Self {
        Self {
            outcome: KeyOutcome::Miss(diagnostics),
            cached_at,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.outcome, KeyOutcome::Hit(_))
    }

    pub fn key_match(&self) -> Option<&KeyMatch> {
        match &self.outcome {
            KeyOutcome::Hit(m) => Some(m),
            KeyOutcome::Miss(_) => None,
        }
    }

    pub fn camelot(&self) -> Option<CamelotCode> {
        self.key_match().map(|m| m.camelot)
    }

    pub fn provider(&self) -> Option<Provider> {
        self.key_match().map(|m| m.provider)
    }
}

/// Flat persisted / wire form of [`ResolvedKey`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedKeyRecord {
    camelot: Option<CamelotCode>,
    key: Option<String>,
    mode: Option<Mode>,
    provider: Option<Provider>,
    provider_id: Option<String>,
    mbid: Option<String>,
    score: Option<u32>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    cached_at: DateTime<Utc>,
}

impl From<ResolvedKey> for ResolvedKeyRecord {
    fn from(resolved: ResolvedKey) -> Self {
        match resolved.outcome {
            KeyOutcome::Hit(m) => Self {
                camelot: Some(m.camelot),
                key: Some(m.key),
                mode: Some(m.mode),
                provider: Some(m.provider),
                provider_id: m.provider_id,
                mbid: m.mbid,
                score: m.score,
                cached_at: resolved.cached_at,
            },
            KeyOutcome::Miss(d) => Self {
                camelot: None,
                key: None,
                mode: None,
                provider: None,
                provider_id: None,
                mbid: d.mbid,
                score: d.score,
                cached_at: resolved.cached_at,
            },
        }
    }
}

impl TryFrom<ResolvedKeyRecord> for ResolvedKey {
    type Error = String;

    fn try_from(record: ResolvedKeyRecord) -> Result<Self, Self::Error> {
        let outcome = match (record.camelot, record.key, record.mode, record.provider) {
            (Some(camelot), Some(key), Some(mode), Some(provider)) => KeyOutcome::Hit(KeyMatch {
                camelot,
                key,
                mode,
                provider,
                provider_id: record.provider_id,
                mbid: record.mbid,
                score: record.score,
            }),
            (None, None, None, None) => KeyOutcome::Miss(MissDiagnostics {
                mbid: record.mbid,
                score: record.score,
            }),
            _ => return Err("inconsistent record: hit fields partially set".to_string()),
        };

        Ok(ResolvedKey {
            outcome,
            cached_at: record.cached_at,
        })
    }
}

/// One (title, artist) lookup, immutable once enqueued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub cache_key: String,
    pub title: String,
    pub artist: String,
}

impl LookupRequest {
    /// Request with the cache key derived from title and artist
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        let title = title.into();
        let artist = artist.into();
        Self {
            cache_key: cache_key(&title, &artist),
            title,
            artist,
        }
    }
}

/// Inbound lookup message as sent by the overlay (fields may be absent)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupMessage {
    #[serde(default)]
    pub cache_key: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
}

impl LookupMessage {
    /// `None` when any field is missing or blank
    pub fn into_request(self) -> Option<LookupRequest> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(LookupRequest {
            cache_key: present(self.cache_key)?,
            title: present(self.title)?,
            artist: present(self.artist)?,
        })
    }
}

/// Reply to a lookup message
///
/// Serializes as `{ "ok": true, "data": ... }` or `{ "ok": false, "error": ... }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "LookupResponsePayload")]
pub enum LookupResponse {
    /// `None` when the message was incomplete and no work was done
    Success(Option<ResolvedKey>),
    Failure(String),
}

impl Serialize for LookupResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("LookupResponse", 2)?;
        match self {
            LookupResponse::Success(data) => {
                state.serialize_field("ok", &true)?;
                state.serialize_field("data", data)?;
            }
            LookupResponse::Failure(error) => {
                state.serialize_field("ok", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LookupResponsePayload {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<ResolvedKey>,
}

impl TryFrom<LookupResponsePayload> for LookupResponse {
    type Error = String;

    fn try_from(payload: LookupResponsePayload) -> Result<Self, Self::Error> {
        if payload.ok {
            Ok(LookupResponse::Success(payload.data))
        } else {
            Ok(LookupResponse::Failure(
                payload.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}
