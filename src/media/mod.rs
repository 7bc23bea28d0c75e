pub mod stream;
pub mod synthetic;
pub mod track;

use crate::config::MediaConstraints;
use crate::error::MediaError;
use async_trait::async_trait;

pub use stream::{RemoteSource, RemoteStream};
pub use synthetic::SyntheticMedia;
pub use track::{LocalTrack, TrackEnd, TrackInfo, TrackKind, TrackSet, TrackSource};

/// Захват камеры/микрофона и экрана
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    /// Camera and microphone. Fails if any requested kind cannot be granted.
    async fn user_media(&self, constraints: MediaConstraints) -> Result<TrackSet, MediaError>;

    /// A single screen video track.
    async fn display_media(&self) -> Result<LocalTrack, MediaError>;
}

/// Проверяет, что набор содержит всё, что запрашивали
pub fn check_granted(set: &TrackSet, constraints: MediaConstraints) -> Result<(), MediaError> {
    if constraints.audio && set.audio().is_none() {
        return Err(MediaError::NotFound("microphone".into()));
    }
    if constraints.video && set.video().is_none() {
        return Err(MediaError::NotFound("camera".into()));
    }
    Ok(())
}
