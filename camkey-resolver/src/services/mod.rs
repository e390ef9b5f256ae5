//! Provider clients

pub mod acousticbrainz_client;
pub mod getsongbpm_client;
pub mod musicbrainz_client;
pub mod musicbrainz_provider;

pub use acousticbrainz_client::AcousticBrainzClient;
pub use getsongbpm_client::GetSongBpmClient;
pub use musicbrainz_client::{MusicBrainzClient, RecordingCandidate};
pub use musicbrainz_provider::MusicBrainzProvider;
