use serde::Serialize;
use thiserror::Error;

/// Ошибка захвата камеры/микрофона/экрана
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum MediaError {
    #[error("permission denied for {0}")]
    PermissionDenied(String),
    #[error("no device available for {0}")]
    NotFound(String),
    #[error("capture device error: {0}")]
    Device(String),
}

/// Kinds of signaling failures. `UnavailableId` is the identity collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingErrorKind {
    UnavailableId,
    InvalidId,
    PeerUnavailable,
    Network,
    ServerError,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind:?}: {message}")]
pub struct SignalingError {
    pub kind: SignalingErrorKind,
    pub message: String,
}

impl SignalingError {
    pub fn new(kind: SignalingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_id_taken(&self) -> bool {
        self.kind == SignalingErrorKind::UnavailableId
    }
}

/// Ошибка подмены трека на отправителе
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ReplaceError {
    #[error("track kind does not match the sender")]
    KindMismatch,
    #[error("track is not bound to a transport track")]
    Unbound,
    #[error("call is closed")]
    Closed,
    #[error("transport rejected the track: {0}")]
    Transport(String),
}

/// Everything the session reports outward.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum CallError {
    #[error("local media denied: {0}")]
    MediaAcquisition(MediaError),
    #[error("signaling registration failed: {0}")]
    Signaling(SignalingError),
    #[error("display media denied: {0}")]
    DisplayCapture(MediaError),
    #[error("camera reacquisition failed: {0}")]
    CameraReacquisition(MediaError),
    #[error("track replacement failed: {0}")]
    TrackReplacement(ReplaceError),
    #[error("room id is missing")]
    MissingRoom,
    #[error("session is closed")]
    SessionClosed,
}

impl CallError {
    /// Fatal errors move the session to ERROR, the rest are toggle scoped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MediaAcquisition(_) | Self::Signaling(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
