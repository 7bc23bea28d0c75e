use crate::config::MediaConstraints;
use crate::error::MediaError;
use crate::logger::log;
use crate::media::track::{LocalTrack, TrackSet, TrackSource};
use crate::media::MediaAcquirer;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Switches {
    deny_camera: bool,
    deny_microphone: bool,
    deny_display: bool,
    delay: Option<Duration>,
    last_screen: Option<LocalTrack>,
}

/// Устройства без железа: для демо и тестов.
/// Считает открытые "устройства", чтобы проверять их освобождение.
#[derive(Clone)]
pub struct SyntheticMedia {
    label: String,
    switches: Arc<Mutex<Switches>>,
    open: Arc<AtomicUsize>,
    seq: Arc<AtomicUsize>,
    user_media_calls: Arc<AtomicUsize>,
}

impl SyntheticMedia {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            switches: Arc::new(Mutex::new(Switches::default())),
            open: Arc::new(AtomicUsize::new(0)),
            seq: Arc::new(AtomicUsize::new(0)),
            user_media_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn deny_camera(&self, deny: bool) {
        self.with_switches(|s| s.deny_camera = deny);
    }

    pub fn deny_microphone(&self, deny: bool) {
        self.with_switches(|s| s.deny_microphone = deny);
    }

    pub fn deny_display(&self, deny: bool) {
        self.with_switches(|s| s.deny_display = deny);
    }

    /// Задержка перед выдачей треков, имитирует диалог разрешений
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.with_switches(|s| s.delay = delay);
    }

    /// Сколько треков сейчас держат устройство
    pub fn open_devices(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn user_media_calls(&self) -> usize {
        self.user_media_calls.load(Ordering::SeqCst)
    }

    /// Последний выданный трек экрана (чтобы "нажать" системную кнопку остановки)
    pub fn last_screen(&self) -> Option<LocalTrack> {
        self.switches.lock().ok().and_then(|s| s.last_screen.clone())
    }

    fn with_switches(&self, f: impl FnOnce(&mut Switches)) {
        if let Ok(mut s) = self.switches.lock() {
            f(&mut s);
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Switches) -> T) -> T
    where
        T: Default,
    {
        self.switches.lock().map(|s| f(&s)).unwrap_or_default()
    }

    fn open_track(&self, source: TrackSource) -> LocalTrack {
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-{:?}-{}", self.label, source, n).to_lowercase();
        self.open.fetch_add(1, Ordering::SeqCst);
        let open = self.open.clone();
        LocalTrack::with_release(id, source, move || {
            open.fetch_sub(1, Ordering::SeqCst);
        })
    }

    async fn pause(&self) {
        if let Some(delay) = self.read(|s| s.delay) {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MediaAcquirer for SyntheticMedia {
    async fn user_media(&self, constraints: MediaConstraints) -> Result<TrackSet, MediaError> {
        self.user_media_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if constraints.video && self.read(|s| s.deny_camera) {
            return Err(MediaError::PermissionDenied("camera".into()));
        }
        if constraints.audio && self.read(|s| s.deny_microphone) {
            return Err(MediaError::PermissionDenied("microphone".into()));
        }

        let mut tracks = Vec::new();
        if constraints.video {
            tracks.push(self.open_track(TrackSource::Camera));
        }
        if constraints.audio {
            tracks.push(self.open_track(TrackSource::Microphone));
        }
        log(&format!("{}: acquired {} local tracks", self.label, tracks.len()));
        Ok(TrackSet::new(tracks))
    }

    async fn display_media(&self) -> Result<LocalTrack, MediaError> {
        self.pause().await;
        if self.read(|s| s.deny_display) {
            return Err(MediaError::PermissionDenied("display".into()));
        }
        let track = self.open_track(TrackSource::Screen);
        self.with_switches(|s| s.last_screen = Some(track.clone()));
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn denied_camera_opens_nothing() {
        let media = SyntheticMedia::new("a");
        media.deny_camera(true);
        let res = media.user_media(MediaConstraints::default()).await;
        assert_eq!(res, Err(MediaError::PermissionDenied("camera".into())));
        assert_eq!(media.open_devices(), 0);
    }

    #[tokio::test]
    async fn stopping_tracks_releases_devices() {
        let media = SyntheticMedia::new("a");
        let set = media.user_media(MediaConstraints::default()).await.unwrap();
        assert_eq!(media.open_devices(), 2);
        set.stop_all();
        assert_eq!(media.open_devices(), 0);
    }
}
