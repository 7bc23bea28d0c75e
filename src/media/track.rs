use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use webrtc::track::track_local::TrackLocal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Откуда пришёл трек
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(self) -> TrackKind {
        match self {
            TrackSource::Microphone => TrackKind::Audio,
            TrackSource::Camera | TrackSource::Screen => TrackKind::Video,
        }
    }
}

/// Why a track stopped producing media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEnd {
    /// `stop()` was called locally
    Stopped,
    /// the device or the OS ended capture (e.g. "stop sharing" button)
    DeviceEnded,
}

pub type Release = Box<dyn FnOnce() + Send>;

struct TrackInner {
    id: String,
    source: TrackSource,
    enabled: AtomicBool,
    ended: watch::Sender<Option<TrackEnd>>,
    release: Mutex<Option<Release>>,
    rtc: Option<Arc<dyn TrackLocal + Send + Sync>>,
}

/// Локальный захваченный трек. Клоны указывают на один и тот же трек.
#[derive(Clone)]
pub struct LocalTrack(Arc<TrackInner>);

impl LocalTrack {
    pub fn new(id: impl Into<String>, source: TrackSource) -> Self {
        Self::build(id.into(), source, None, None)
    }

    /// Трек, который держит устройство: `release` вызывается ровно один раз
    pub fn with_release(
        id: impl Into<String>,
        source: TrackSource,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self::build(id.into(), source, Some(Box::new(release)), None)
    }

    /// Трек, привязанный к транспортному треку webrtc
    pub fn bound(
        source: TrackSource,
        rtc: Arc<dyn TrackLocal + Send + Sync>,
        release: Option<Release>,
    ) -> Self {
        let id = rtc.id().to_string();
        Self::build(id, source, release, Some(rtc))
    }

    fn build(
        id: String,
        source: TrackSource,
        release: Option<Release>,
        rtc: Option<Arc<dyn TrackLocal + Send + Sync>>,
    ) -> Self {
        let (ended, _) = watch::channel(None);
        Self(Arc::new(TrackInner {
            id,
            source,
            enabled: AtomicBool::new(true),
            ended,
            release: Mutex::new(release),
            rtc,
        }))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn source(&self) -> TrackSource {
        self.0.source
    }

    pub fn kind(&self) -> TrackKind {
        self.0.source.kind()
    }

    pub fn is_enabled(&self) -> bool {
        self.0.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.0.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.0.ended.borrow().is_none()
    }

    pub fn rtc_track(&self) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        self.0.rtc.clone()
    }

    /// Останавливает захват. Повторный вызов ничего не делает.
    pub fn stop(&self) {
        self.finish(TrackEnd::Stopped);
    }

    /// Захват закончился со стороны устройства/ОС
    pub fn end(&self) {
        self.finish(TrackEnd::DeviceEnded);
    }

    fn finish(&self, reason: TrackEnd) {
        let changed = self.0.ended.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(reason);
                true
            } else {
                false
            }
        });
        if !changed {
            return;
        }
        let release = self.0.release.lock().ok().and_then(|mut r| r.take());
        if let Some(release) = release {
            release();
        }
    }

    /// Resolves once the track has stopped, with the reason.
    pub async fn ended(&self) -> TrackEnd {
        let mut rx = self.0.ended.subscribe();
        let reason = match rx.wait_for(|state| state.is_some()).await {
            Ok(state) => (*state).unwrap_or(TrackEnd::Stopped),
            Err(_) => TrackEnd::Stopped,
        };
        reason
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            id: self.0.id.clone(),
            kind: self.kind(),
            source: self.0.source,
            enabled: self.is_enabled(),
            live: self.is_live(),
        }
    }
}

impl PartialEq for LocalTrack {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.0.id)
            .field("source", &self.0.source)
            .field("enabled", &self.is_enabled())
            .field("live", &self.is_live())
            .finish()
    }
}

/// Снимок состояния трека для UI и удалённой стороны
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub enabled: bool,
    pub live: bool,
}

/// Набор локальных треков. При демонстрации экрана заменяется целиком.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSet {
    tracks: Vec<LocalTrack>,
}

impl TrackSet {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn audio(&self) -> Option<&LocalTrack> {
        self.first_of(TrackKind::Audio)
    }

    pub fn video(&self) -> Option<&LocalTrack> {
        self.first_of(TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> Vec<LocalTrack> {
        self.of_kind(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<LocalTrack> {
        self.of_kind(TrackKind::Video)
    }

    fn first_of(&self, kind: TrackKind) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    fn of_kind(&self, kind: TrackKind) -> Vec<LocalTrack> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn infos(&self) -> Vec<TrackInfo> {
        self.tracks.iter().map(LocalTrack::info).collect()
    }
}
