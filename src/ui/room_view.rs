use crate::media::{TrackInfo, TrackSource};
use crate::peer::{CallStatus, SessionSnapshot};
use crate::ui::control_bar::{control_bar, Button};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tile {
    pub label: String,
    pub is_local: bool,
    pub screen_share: bool,
    pub mic_off: bool,
    /// `None` renders the placeholder avatar
    pub video: Option<TrackInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "overlay", rename_all = "kebab-case")]
pub enum Overlay {
    WaitingForPeer { invite: String },
    Connecting,
    Error,
}

impl Overlay {
    pub fn message(&self) -> &'static str {
        match self {
            Overlay::WaitingForPeer { .. } => "Waiting for others",
            Overlay::Connecting => "Establishing secure connection...",
            Overlay::Error => "Connection Error. Please refresh page.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomView {
    pub local: Tile,
    pub remote: Option<Tile>,
    pub overlay: Option<Overlay>,
    pub controls: Vec<Button>,
}

pub fn render(snap: &SessionSnapshot, invite: &str) -> RoomView {
    let local = Tile {
        label: if snap.status == CallStatus::Waiting {
            "You (Host)".into()
        } else {
            "You".into()
        },
        is_local: true,
        screen_share: snap.screen_sharing,
        mic_off: !snap.audio_enabled,
        video: snap.local.video().map(|t| t.info()),
    };

    let remote = snap.remote.as_ref().map(|stream| {
        let audio = stream.audio();
        Tile {
            label: "Peer".into(),
            is_local: false,
            screen_share: stream
                .video()
                .is_some_and(|v| v.source == TrackSource::Screen),
            mic_off: audio.is_some_and(|a| !a.enabled),
            video: stream.video(),
        }
    });

    let overlay = match snap.status {
        CallStatus::Waiting if remote.is_none() => Some(Overlay::WaitingForPeer {
            invite: invite.to_string(),
        }),
        CallStatus::Connecting => Some(Overlay::Connecting),
        CallStatus::Error => Some(Overlay::Error),
        _ => None,
    };

    RoomView {
        local,
        remote,
        overlay,
        controls: control_bar(snap),
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.label)?;
        match &self.video {
            Some(v) if v.enabled => write!(f, " | {:?} {}", v.source, v.id)?,
            Some(_) => write!(f, " | camera off")?,
            None => write!(f, " | no video")?,
        }
        if self.screen_share {
            write!(f, " | sharing")?;
        }
        if self.mic_off {
            write!(f, " | mic off")?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for RoomView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(overlay) = &self.overlay {
            writeln!(f, "** {} **", overlay.message())?;
            if let Overlay::WaitingForPeer { invite } = overlay {
                writeln!(f, "   invite: {invite}")?;
            }
        }
        write!(f, "{}", self.local)?;
        if let Some(remote) = &self.remote {
            write!(f, "  {remote}")?;
        }
        writeln!(f)?;
        let titles: Vec<&str> = self.controls.iter().map(|b| b.title).collect();
        write!(f, "   controls: {}", titles.join(" / "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_host_sees_invite_overlay() {
        let mut snap = SessionSnapshot::for_room("abc");
        snap.status = CallStatus::Waiting;
        let view = render(&snap, "http://x/#/room/abc");
        assert_eq!(view.local.label, "You (Host)");
        assert_eq!(
            view.overlay,
            Some(Overlay::WaitingForPeer {
                invite: "http://x/#/room/abc".into()
            })
        );
        assert!(view.remote.is_none());
    }

    #[test]
    fn error_status_shows_refresh_hint() {
        let mut snap = SessionSnapshot::for_room("abc");
        snap.status = CallStatus::Error;
        snap.audio_enabled = false;
        let view = render(&snap, "");
        assert_eq!(
            view.overlay.as_ref().map(Overlay::message),
            Some("Connection Error. Please refresh page.")
        );
        assert!(view.local.mic_off);
        assert_eq!(view.local.label, "You");
    }
}
