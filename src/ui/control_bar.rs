use crate::error::CallError;
use crate::peer::SessionSnapshot;
use crate::session::CallSession;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    ToggleAudio,
    ToggleVideo,
    ToggleScreenShare,
    CopyInvite,
    EndCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub action: Action,
    pub title: &'static str,
    /// highlighted: muted mic, camera off, sharing
    pub alert: bool,
}

pub fn control_bar(snap: &SessionSnapshot) -> Vec<Button> {
    vec![
        Button {
            action: Action::ToggleAudio,
            title: if snap.audio_enabled { "Mute" } else { "Unmute" },
            alert: !snap.audio_enabled,
        },
        Button {
            action: Action::ToggleVideo,
            title: if snap.video_enabled {
                "Turn off camera"
            } else {
                "Turn on camera"
            },
            alert: !snap.video_enabled,
        },
        Button {
            action: Action::ToggleScreenShare,
            title: "Share Screen",
            alert: snap.screen_sharing,
        },
        Button {
            action: Action::CopyInvite,
            title: "Copy Invite Link",
            alert: false,
        },
        Button {
            action: Action::EndCall,
            title: "End Call",
            alert: false,
        },
    ]
}

/// Результат нажатия кнопки
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// text for the clipboard
    Invite(String),
}

pub async fn dispatch(session: &CallSession, action: Action) -> Result<Outcome, CallError> {
    match action {
        Action::ToggleAudio => {
            session.toggle_audio().await?;
        }
        Action::ToggleVideo => {
            session.toggle_video().await?;
        }
        Action::ToggleScreenShare => {
            session.toggle_screen_share().await?;
        }
        Action::CopyInvite => {
            let link = session.invite_link().ok_or(CallError::MissingRoom)?;
            return Ok(Outcome::Invite(link));
        }
        Action::EndCall => session.hang_up().await?,
    }
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_follow_track_flags() {
        let mut snap = SessionSnapshot::for_room("r");
        let bar = control_bar(&snap);
        assert_eq!(bar[0].title, "Mute");
        assert_eq!(bar[1].title, "Turn off camera");
        assert!(!bar[2].alert);

        snap.audio_enabled = false;
        snap.video_enabled = false;
        snap.screen_sharing = true;
        let bar = control_bar(&snap);
        assert_eq!(bar[0].title, "Unmute");
        assert!(bar[0].alert);
        assert_eq!(bar[1].title, "Turn on camera");
        assert!(bar[2].alert);
    }
}
