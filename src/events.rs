use crate::error::CallError;
use crate::media::TrackInfo;
use crate::peer::state::{CallStatus, Role};
use crate::ui::route::Route;
use serde::Serialize;

/// События сессии для UI (аналог emit в окно)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SessionEvent {
    Status(CallStatus),
    Role { role: Role, id: String },
    LocalTracks(Vec<TrackInfo>),
    /// id of the new remote stream, `None` once it is gone
    Remote(Option<String>),
    ScreenShare(bool),
    Fault(CallError),
    Navigate(Route),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Status(_) => "room-status",
            SessionEvent::Role { .. } => "room-role",
            SessionEvent::LocalTracks(_) => "room-local-tracks",
            SessionEvent::Remote(_) => "room-remote-stream",
            SessionEvent::ScreenShare(_) => "room-screen-share",
            SessionEvent::Fault(_) => "room-fault",
            SessionEvent::Navigate(_) => "room-navigate",
        }
    }
}
