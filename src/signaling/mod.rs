//! Граница с внешней библиотекой сигналинга/соединения.
//!
//! Коллаборатор сообщает о событиях через `SignalSink` и `CallSink`, которые
//! создаёт координатор. Сам он никогда не вызывает координатор напрямую.

pub mod loopback;

use crate::error::{ReplaceError, SignalingError};
use crate::media::{LocalTrack, RemoteStream, TrackKind, TrackSet};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub use loopback::LoopbackSignaling;

/// Идентичность в сигналинге: id комнаты у хоста, случайный токен у гостя
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub enum SignalEvent {
    Open(PeerId),
    Error(SignalingError),
    Call(Arc<dyn MediaCall>),
}

impl fmt::Debug for SignalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalEvent::Open(id) => write!(f, "Open({id})"),
            SignalEvent::Error(e) => write!(f, "Error({e})"),
            SignalEvent::Call(call) => write!(f, "Call(from {})", call.peer()),
        }
    }
}

#[derive(Debug)]
pub enum CallEvent {
    Stream(RemoteStream),
    Closed,
}

type Emit<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Куда endpoint отдаёт `open`/`error`/`call`
#[derive(Clone)]
pub struct SignalSink(Emit<SignalEvent>);

impl SignalSink {
    pub fn new(emit: impl Fn(SignalEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(emit))
    }

    pub fn open(&self, id: PeerId) {
        (self.0)(SignalEvent::Open(id));
    }

    pub fn error(&self, err: SignalingError) {
        (self.0)(SignalEvent::Error(err));
    }

    pub fn incoming(&self, call: Arc<dyn MediaCall>) {
        (self.0)(SignalEvent::Call(call));
    }
}

/// Куда звонок отдаёт `stream`/`close`
#[derive(Clone)]
pub struct CallSink(Emit<CallEvent>);

impl CallSink {
    pub fn new(emit: impl Fn(CallEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(emit))
    }

    pub fn stream(&self, stream: RemoteStream) {
        (self.0)(CallEvent::Stream(stream));
    }

    pub fn closed(&self) {
        (self.0)(CallEvent::Closed);
    }
}

pub trait Signaling: Send + Sync {
    /// Registers `id`. The outcome arrives on `sink` as `Open` or `Error`.
    fn register(&self, id: PeerId, sink: SignalSink) -> Arc<dyn PeerEndpoint>;
}

pub trait PeerEndpoint: Send + Sync {
    fn id(&self) -> &PeerId;

    /// Outbound call carrying `tracks`; `stream`/`close` arrive on `sink`.
    fn call(&self, target: &PeerId, tracks: &TrackSet, sink: CallSink) -> Arc<dyn MediaCall>;

    /// Releases the identity and closes every call of this endpoint.
    fn destroy(&self);
}

pub trait MediaCall: Send + Sync {
    fn peer(&self) -> &PeerId;

    fn answer(&self, tracks: &TrackSet, sink: CallSink);

    /// Outbound RTP senders, one per sent track
    fn senders(&self) -> Vec<Arc<dyn TrackSender>>;

    fn close(&self);
}

/// Отправитель одного исходящего трека
#[async_trait]
pub trait TrackSender: Send + Sync {
    fn kind(&self) -> Option<TrackKind>;

    /// Swaps the source track in place, without renegotiation.
    async fn replace_track(&self, track: &LocalTrack) -> Result<(), ReplaceError>;
}

/// Подменяет трек на отправителе того же типа.
/// `Ok(false)` если у звонка нет такого отправителя.
pub async fn replace_on_call(call: &dyn MediaCall, track: &LocalTrack) -> Result<bool, ReplaceError> {
    let sender = call
        .senders()
        .into_iter()
        .find(|s| s.kind() == Some(track.kind()));
    match sender {
        Some(sender) => {
            sender.replace_track(track).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}
