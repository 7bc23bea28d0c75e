//! Демонстрация экрана: подмена видеотрека на отправителях без
//! пересогласования звонка.

use crate::error::{CallError, ReplaceError};
use crate::events::SessionEvent;
use crate::logger::log;
use crate::media::{check_granted, LocalTrack, TrackEnd, TrackSet};
use crate::peer::coordinator::{Coordinator, Input};
use crate::signaling::{replace_on_call, MediaCall};
use std::sync::Arc;

impl Coordinator {
    pub(super) async fn toggle_screen_share(&mut self) -> Result<bool, CallError> {
        let sharing = self
            .live
            .as_ref()
            .filter(|l| !l.torn_down)
            .ok_or(CallError::SessionClosed)?
            .screen
            .is_some();
        if sharing {
            self.stop_share().await
        } else {
            self.start_share().await
        }
    }

    async fn start_share(&mut self) -> Result<bool, CallError> {
        let screen = match self.deps.media.display_media().await {
            Ok(track) => track,
            Err(e) => {
                let err = CallError::DisplayCapture(e);
                self.raise(err.clone());
                return Err(err);
            }
        };

        let Some(live) = self.live.as_ref().filter(|l| !l.torn_down) else {
            screen.stop();
            return Err(CallError::SessionClosed);
        };
        let calls = live.calls();
        let previous = live.local.clone();

        if let Err(e) = swap_on_calls(&calls, &[screen.clone()], &previous).await {
            screen.stop();
            let err = CallError::TrackReplacement(e);
            self.raise(err.clone());
            return Err(err);
        }

        // камера больше не отправляется, её можно отпустить
        for camera in previous.video_tracks() {
            camera.stop();
        }
        let mut tracks = vec![screen.clone()];
        tracks.extend(previous.audio_tracks());

        if let Some(live) = self.live.as_mut() {
            live.local = TrackSet::new(tracks);
            live.screen = Some(screen.clone());
        }
        self.watch_screen(&screen);
        log(&format!("Screen share started with track {}", screen.id()));

        self.snap.screen_sharing = true;
        self.after_local_change();
        self.emit(SessionEvent::ScreenShare(true));
        Ok(true)
    }

    async fn stop_share(&mut self) -> Result<bool, CallError> {
        let constraints = self.config.media;
        let fresh = match self.deps.media.user_media(constraints).await {
            Ok(set) => match check_granted(&set, constraints) {
                Ok(()) => set,
                Err(e) => {
                    set.stop_all();
                    return Err(self.camera_failed(e));
                }
            },
            Err(e) => return Err(self.camera_failed(e)),
        };

        let Some(live) = self.live.as_ref().filter(|l| !l.torn_down) else {
            fresh.stop_all();
            return Err(CallError::SessionClosed);
        };
        let calls = live.calls();
        let previous = live.local.clone();

        if let Err(e) = swap_on_calls(&calls, fresh.tracks(), &previous).await {
            fresh.stop_all();
            let err = CallError::TrackReplacement(e);
            self.raise(err.clone());
            return Err(err);
        }

        // флаги mute/camera-off переживают смену треков
        if let Some(audio) = fresh.audio() {
            audio.set_enabled(self.snap.audio_enabled);
        }
        if let Some(video) = fresh.video() {
            video.set_enabled(self.snap.video_enabled);
        }
        previous.stop_all();

        if let Some(live) = self.live.as_mut() {
            if let Some(screen) = live.screen.take() {
                screen.stop();
            }
            live.local = fresh;
        }
        log("Screen share stopped, camera restored");

        self.snap.screen_sharing = false;
        self.after_local_change();
        self.emit(SessionEvent::ScreenShare(false));
        Ok(false)
    }

    fn camera_failed(&mut self, e: crate::error::MediaError) -> CallError {
        let err = CallError::CameraReacquisition(e);
        self.raise(err.clone());
        err
    }

    pub(super) async fn on_screen_ended(&mut self, track_id: &str) {
        let current = self
            .live
            .as_ref()
            .and_then(|l| l.screen.as_ref())
            .map(|s| s.id() == track_id)
            .unwrap_or(false);
        if !current {
            return;
        }
        log("Screen capture ended by the system, reverting to camera");
        // ошибки уже отправлены в UI как Fault
        let _ = self.stop_share().await;
    }

    /// Системная кнопка "остановить показ" ведёт к тому же откату
    fn watch_screen(&self, screen: &LocalTrack) {
        let tx = self.tx.clone();
        let screen = screen.clone();
        tokio::spawn(async move {
            if screen.ended().await == TrackEnd::DeviceEnded {
                let _ = tx.send(Input::ScreenEnded {
                    track_id: screen.id().to_string(),
                });
            }
        });
    }
}

/// Ставит `next` на отправители всех звонков. При ошибке возвращает
/// уже подменённые отправители к трекам из `previous`.
async fn swap_on_calls(
    calls: &[Arc<dyn MediaCall>],
    next: &[LocalTrack],
    previous: &TrackSet,
) -> Result<(), ReplaceError> {
    let mut swapped: Vec<(usize, &LocalTrack)> = Vec::new();
    for (i, call) in calls.iter().enumerate() {
        for track in next {
            match replace_on_call(call.as_ref(), track).await {
                Ok(true) => swapped.push((i, track)),
                // звонок уже закрывается, его событие ещё в очереди
                Ok(false) | Err(ReplaceError::Closed) => {}
                Err(e) => {
                    for (j, done) in swapped {
                        let old = previous.tracks().iter().find(|t| t.kind() == done.kind());
                        if let Some(old) = old {
                            let _ = replace_on_call(calls[j].as_ref(), old).await;
                        }
                    }
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}
