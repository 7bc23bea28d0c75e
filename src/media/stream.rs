use crate::media::track::{TrackInfo, TrackKind};
use std::fmt;
use std::sync::Arc;

/// Источник входящего медиа. Принадлежит транспорту, сессия только читает.
pub trait RemoteSource: Send + Sync {
    fn tracks(&self) -> Vec<TrackInfo>;
}

/// Inbound media from the other participant.
#[derive(Clone)]
pub struct RemoteStream {
    id: String,
    source: Arc<dyn RemoteSource>,
}

impl RemoteStream {
    pub fn new(id: impl Into<String>, source: Arc<dyn RemoteSource>) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.source.tracks()
    }

    pub fn video(&self) -> Option<TrackInfo> {
        self.first_of(TrackKind::Video)
    }

    pub fn audio(&self) -> Option<TrackInfo> {
        self.first_of(TrackKind::Audio)
    }

    fn first_of(&self, kind: TrackKind) -> Option<TrackInfo> {
        self.source.tracks().into_iter().find(|t| t.kind == kind)
    }
}

impl PartialEq for RemoteStream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && std::ptr::addr_eq(Arc::as_ptr(&self.source), Arc::as_ptr(&other.source))
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("id", &self.id)
            .field("tracks", &self.source.tracks())
            .finish()
    }
}
