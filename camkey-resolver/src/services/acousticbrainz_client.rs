//! AcousticBrainz API client
//!
//! Fetches tonal data (key and scale) for a recording MBID from the
//! AcousticBrainz low-level endpoint.
//!
//! A recording can have several community-submitted analyses, addressed by
//! submission index `n`. Some lack tonal data, so up to three are tried in
//! order. A 404 (or any other non-success status) on any submission ends the
//! lookup for that recording: it means the recording itself has no analysis.
//!
//! Note: AcousticBrainz stopped accepting submissions in 2022, so data is only
//! available for recordings analyzed before then.

use crate::key_theory::{parse_key_and_scale, ParsedKey};
use crate::rate_limiter::RateLimiter;
use crate::transport::{HttpRequest, HttpTransport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const ACOUSTICBRAINZ_BASE_URL: &str = "https://acousticbrainz.org/api/v1";

/// Submission indices tried per recording
pub const MAX_SUBMISSIONS: u32 = 3;

/// AcousticBrainz low-level response (only the tonal section is used)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ABLowLevel {
    /// Tonal features (key, scale, chords)
    #[serde(default)]
    pub tonal: Option<ABTonal>,
}

/// Tonal features
///
/// Analyses expose the key under either the `key_*` or the `chords_*`
/// field names; `key_*` is preferred when both are complete.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ABTonal {
    /// Musical key (e.g., "C", "Bb")
    pub key_key: Option<String>,
    /// Musical scale ("major" / "minor")
    pub key_scale: Option<String>,
    /// Predominant chord key
    pub chords_key: Option<String>,
    /// Predominant chord scale
    pub chords_scale: Option<String>,
}

impl ABTonal {
    /// First complete and recognizable (key, scale) pair
    pub fn parsed_key(&self) -> Option<ParsedKey> {
        let pairs = [
            (&self.key_key, &self.key_scale),
            (&self.chords_key, &self.chords_scale),
        ];

        pairs.into_iter().find_map(|(key, scale)| {
            parse_key_and_scale(key.as_deref()?, scale.as_deref()?)
        })
    }
}

/// AcousticBrainz API client
pub struct AcousticBrainzClient {
    transport: Arc<dyn HttpTransport>,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl AcousticBrainzClient {
    pub fn new(transport: Arc<dyn HttpTransport>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            transport,
            rate_limiter,
            base_url: ACOUSTICBRAINZ_BASE_URL.to_string(),
        }
    }

    /// Request for one submission of a recording's low-level analysis
    pub fn lowlevel_request(&self, recording_mbid: &str, submission: u32) -> HttpRequest {
        HttpRequest::get(format!("{}/{}/low-level", self.base_url, recording_mbid))
            .query("n", submission.to_string())
            .header("Accept", "application/json")
    }

    /// Key and scale for a recording, trying submissions 0, 1, 2
    pub async fn fetch_tonal_data(&self, recording_mbid: &str) -> Option<ParsedKey> {
        for submission in 0..MAX_SUBMISSIONS {
            self.rate_limiter.wait().await;

            let request = self.lowlevel_request(recording_mbid, submission);
            debug!(mbid = %recording_mbid, n = submission, "Querying AcousticBrainz low-level");

            let response = match self.transport.get(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(mbid = %recording_mbid, error = %e, "AcousticBrainz request failed");
                    return None;
                }
            };

            if response.status == 404 {
                debug!(mbid = %recording_mbid, "Recording not found in AcousticBrainz");
                return None;
            }

            if !response.is_success() {
                warn!(
                    mbid = %recording_mbid,
                    status = response.status,
                    "AcousticBrainz returned non-success status"
                );
                return None;
            }

            let lowlevel = match serde_json::from_str::<ABLowLevel>(&response.body) {
                Ok(lowlevel) => lowlevel,
                Err(e) => {
                    debug!(mbid = %recording_mbid, n = submission, error = %e, "Unparseable submission");
                    continue;
                }
            };

            if let Some(parsed) = lowlevel.tonal.as_ref().and_then(ABTonal::parsed_key) {
                debug!(
                    mbid = %recording_mbid,
                    n = submission,
                    key = %parsed.key,
                    mode = %parsed.mode,
                    "AcousticBrainz tonal data found"
                );
                return Some(parsed);
            }

            debug!(mbid = %recording_mbid, n = submission, "Submission has no tonal data");
        }

        None
    }
}
