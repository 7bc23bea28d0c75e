use crate::error::CallError;
use crate::media::{RemoteStream, TrackSet};
use serde::Serialize;

/// Статус звонка, который видит UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Connecting,
    Waiting,
    Connected,
    Error,
    Ended,
}

impl CallStatus {
    /// Allowed status moves. Staying in place is always allowed.
    pub fn can_transition(self, next: CallStatus) -> bool {
        use CallStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (_, Ended)
                | (Connecting, Waiting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Waiting, Error)
                | (Waiting, Connecting)
                | (Connected, Waiting)
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, CallStatus::Error | CallStatus::Ended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

/// Всё, что сессия показывает наружу
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub room: Option<String>,
    pub role: Option<Role>,
    pub local_id: Option<String>,
    pub status: CallStatus,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
    /// persistent fatal error, rendered until the user leaves
    pub fault: Option<CallError>,
    #[serde(skip)]
    pub local: TrackSet,
    #[serde(skip)]
    pub remote: Option<RemoteStream>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            room: None,
            role: None,
            local_id: None,
            status: CallStatus::Connecting,
            audio_enabled: true,
            video_enabled: true,
            screen_sharing: false,
            fault: None,
            local: TrackSet::default(),
            remote: None,
        }
    }
}

impl SessionSnapshot {
    pub fn for_room(room: &str) -> Self {
        Self {
            room: Some(room.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CallStatus::*;

    #[test]
    fn hang_up_is_reachable_from_everywhere() {
        for s in [Connecting, Waiting, Connected, Error, Ended] {
            assert!(s.can_transition(Ended));
        }
    }

    #[test]
    fn finished_sessions_do_not_come_back() {
        assert!(!Ended.can_transition(Connecting));
        assert!(!Error.can_transition(Waiting));
        assert!(!Error.can_transition(Connected));
    }

    #[test]
    fn connected_host_falls_back_to_waiting_not_error() {
        assert!(Connected.can_transition(Waiting));
        assert!(!Connected.can_transition(Error));
        assert!(!Waiting.can_transition(Connected));
    }
}
