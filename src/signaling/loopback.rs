//! In-process signaling broker. Matches identities inside one process and
//! wires two sessions' senders to each other's remote streams.

use crate::error::{ReplaceError, SignalingError, SignalingErrorKind};
use crate::logger::log;
use crate::media::{LocalTrack, RemoteSource, RemoteStream, TrackInfo, TrackKind, TrackSet};
use crate::signaling::{CallSink, MediaCall, PeerEndpoint, PeerId, SignalSink, Signaling, TrackSender};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Broker {
    peers: HashMap<PeerId, Arc<EndpointShared>>,
    fail_next: Option<SignalingError>,
    registrations: Vec<PeerId>,
}

struct EndpointShared {
    serial: u64,
    sink: SignalSink,
    calls: Mutex<Vec<Arc<CallCore>>>,
}

impl EndpointShared {
    fn track_call(&self, core: &Arc<CallCore>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.retain(|c| !c.is_closed());
            calls.push(core.clone());
        }
    }

    fn close_calls(&self) {
        let calls = self
            .calls
            .lock()
            .map(|mut c| c.drain(..).collect::<Vec<_>>())
            .unwrap_or_default();
        for core in calls {
            core.close();
        }
    }
}

/// Брокер сигналинга в памяти процесса
#[derive(Clone, Default)]
pub struct LoopbackSignaling {
    broker: Arc<Mutex<Broker>>,
    serial: Arc<AtomicU64>,
    negotiations: Arc<AtomicUsize>,
    fail_replace: Arc<AtomicBool>,
}

impl LoopbackSignaling {
    pub fn new() -> Self {
        Self::default()
    }

    /// Следующая регистрация завершится этой ошибкой
    pub fn fail_next_registration(&self, err: SignalingError) {
        if let Ok(mut b) = self.broker.lock() {
            b.fail_next = Some(err);
        }
    }

    /// Следующая подмена трека на любом отправителе упадёт
    pub fn fail_next_replace(&self) {
        self.fail_replace.store(true, Ordering::SeqCst);
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.broker
            .lock()
            .map(|b| b.peers.contains_key(&PeerId::new(id)))
            .unwrap_or(false)
    }

    /// Every id ever passed to `register`, in order.
    pub fn registrations(&self) -> Vec<PeerId> {
        self.broker
            .lock()
            .map(|b| b.registrations.clone())
            .unwrap_or_default()
    }

    /// Offers plus answers seen so far. Track replacement never counts.
    pub fn negotiations(&self) -> usize {
        self.negotiations.load(Ordering::SeqCst)
    }

    /// Рвёт все звонки peer'а, как при потере соединения
    pub fn sever(&self, id: &str) {
        let shared = self
            .broker
            .lock()
            .ok()
            .and_then(|b| b.peers.get(&PeerId::new(id)).cloned());
        if let Some(shared) = shared {
            log(&format!("loopback: severing calls of {id}"));
            shared.close_calls();
        }
    }

    fn unregister(&self, id: &PeerId, serial: u64) {
        if let Ok(mut b) = self.broker.lock() {
            if b.peers.get(id).map(|p| p.serial) == Some(serial) {
                b.peers.remove(id);
            }
        }
    }

    fn lookup(&self, id: &PeerId) -> Option<Arc<EndpointShared>> {
        self.broker.lock().ok().and_then(|b| b.peers.get(id).cloned())
    }
}

impl Signaling for LoopbackSignaling {
    fn register(&self, id: PeerId, sink: SignalSink) -> Arc<dyn PeerEndpoint> {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::new(EndpointShared {
            serial,
            sink: sink.clone(),
            calls: Mutex::new(Vec::new()),
        });

        let outcome = match self.broker.lock() {
            Ok(mut b) => {
                b.registrations.push(id.clone());
                if let Some(err) = b.fail_next.take() {
                    Err(err)
                } else if b.peers.contains_key(&id) {
                    Err(SignalingError::new(
                        SignalingErrorKind::UnavailableId,
                        format!("ID \"{id}\" is taken"),
                    ))
                } else {
                    b.peers.insert(id.clone(), shared.clone());
                    Ok(())
                }
            }
            Err(_) => Err(SignalingError::new(
                SignalingErrorKind::ServerError,
                "broker poisoned",
            )),
        };

        match outcome {
            Ok(()) => sink.open(id.clone()),
            Err(err) => sink.error(err),
        }

        Arc::new(LoopbackEndpoint {
            id,
            broker: self.clone(),
            shared,
            destroyed: AtomicBool::new(false),
        })
    }
}

struct LoopbackEndpoint {
    id: PeerId,
    broker: LoopbackSignaling,
    shared: Arc<EndpointShared>,
    destroyed: AtomicBool,
}

impl PeerEndpoint for LoopbackEndpoint {
    fn id(&self) -> &PeerId {
        &self.id
    }

    fn call(&self, target: &PeerId, tracks: &TrackSet, sink: CallSink) -> Arc<dyn MediaCall> {
        let core = Arc::new(CallCore::new(
            self.id.clone(),
            target.clone(),
            self.broker.fail_replace.clone(),
            self.broker.negotiations.clone(),
        ));

        let callee = if self.destroyed.load(Ordering::SeqCst) {
            None
        } else {
            self.broker.lookup(target)
        };
        let Some(callee) = callee else {
            core.closed.store(true, Ordering::SeqCst);
            self.shared.sink.error(SignalingError::new(
                SignalingErrorKind::PeerUnavailable,
                format!("could not connect to peer {target}"),
            ));
            return Arc::new(LoopbackCall { core, side: CALLER });
        };

        core.attach(CALLER, tracks, sink);
        core.negotiations.fetch_add(1, Ordering::SeqCst);
        self.shared.track_call(&core);
        callee.track_call(&core);

        log(&format!("loopback: {} calls {}", self.id, target));
        callee.sink.incoming(Arc::new(LoopbackCall {
            core: core.clone(),
            side: CALLEE,
        }));
        Arc::new(LoopbackCall { core, side: CALLER })
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        log(&format!("loopback: destroying endpoint {}", self.id));
        self.broker.unregister(&self.id, self.shared.serial);
        self.shared.close_calls();
    }
}

const CALLER: usize = 0;
const CALLEE: usize = 1;

#[derive(Default)]
struct Side {
    senders: Vec<Arc<LoopbackSender>>,
    sink: Option<CallSink>,
}

struct CallCore {
    /// `peers[side]` is the remote identity as seen from that side
    peers: [PeerId; 2],
    sides: Mutex<[Side; 2]>,
    closed: Arc<AtomicBool>,
    fail_replace: Arc<AtomicBool>,
    negotiations: Arc<AtomicUsize>,
}

impl CallCore {
    fn new(
        caller: PeerId,
        callee: PeerId,
        fail_replace: Arc<AtomicBool>,
        negotiations: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            peers: [callee, caller],
            sides: Mutex::new([Side::default(), Side::default()]),
            closed: Arc::new(AtomicBool::new(false)),
            fail_replace,
            negotiations,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn attach(&self, side: usize, tracks: &TrackSet, sink: CallSink) {
        let senders = tracks
            .tracks()
            .iter()
            .map(|t| {
                Arc::new(LoopbackSender {
                    kind: t.kind(),
                    track: Mutex::new(t.clone()),
                    closed: self.closed.clone(),
                    fail: self.fail_replace.clone(),
                })
            })
            .collect();
        if let Ok(mut sides) = self.sides.lock() {
            sides[side] = Side {
                senders,
                sink: Some(sink),
            };
        }
    }

    fn sink(&self, side: usize) -> Option<CallSink> {
        self.sides.lock().ok().and_then(|s| s[side].sink.clone())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for side in [CALLER, CALLEE] {
            if let Some(sink) = self.sink(side) {
                sink.closed();
            }
        }
    }
}

struct LoopbackCall {
    core: Arc<CallCore>,
    side: usize,
}

impl MediaCall for LoopbackCall {
    fn peer(&self) -> &PeerId {
        &self.core.peers[self.side]
    }

    fn answer(&self, tracks: &TrackSet, sink: CallSink) {
        if self.side != CALLEE || self.core.is_closed() {
            return;
        }
        self.core.attach(CALLEE, tracks, sink);
        self.core.negotiations.fetch_add(1, Ordering::SeqCst);

        // обе стороны получают поток друг друга
        for (side, remote) in [(CALLER, CALLEE), (CALLEE, CALLER)] {
            if let Some(sink) = self.core.sink(side) {
                let view = SenderView {
                    core: self.core.clone(),
                    side: remote,
                };
                let id = format!("stream-{}", self.core.peers[side]);
                sink.stream(RemoteStream::new(id, Arc::new(view)));
            }
        }
    }

    fn senders(&self) -> Vec<Arc<dyn TrackSender>> {
        self.core
            .sides
            .lock()
            .map(|s| {
                s[self.side]
                    .senders
                    .iter()
                    .map(|snd| snd.clone() as Arc<dyn TrackSender>)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn close(&self) {
        self.core.close();
    }
}

/// Что видит удалённая сторона: текущие треки отправителей
struct SenderView {
    core: Arc<CallCore>,
    side: usize,
}

impl RemoteSource for SenderView {
    fn tracks(&self) -> Vec<TrackInfo> {
        self.core
            .sides
            .lock()
            .map(|s| {
                s[self.side]
                    .senders
                    .iter()
                    .filter_map(|snd| snd.track.lock().ok().map(|t| t.info()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct LoopbackSender {
    kind: TrackKind,
    track: Mutex<LocalTrack>,
    closed: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

#[async_trait]
impl TrackSender for LoopbackSender {
    fn kind(&self) -> Option<TrackKind> {
        Some(self.kind)
    }

    async fn replace_track(&self, track: &LocalTrack) -> Result<(), ReplaceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ReplaceError::Closed);
        }
        if track.kind() != self.kind {
            return Err(ReplaceError::KindMismatch);
        }
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(ReplaceError::Transport("injected failure".into()));
        }
        if let Ok(mut current) = self.track.lock() {
            *current = track.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::TrackSource;
    use crate::signaling::{CallEvent, SignalEvent};
    use tokio::sync::mpsc;

    fn signal_sink() -> (SignalSink, mpsc::UnboundedReceiver<SignalEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SignalSink::new(move |e| {
                let _ = tx.send(e);
            }),
            rx,
        )
    }

    fn call_sink() -> (CallSink, mpsc::UnboundedReceiver<CallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            CallSink::new(move |e| {
                let _ = tx.send(e);
            }),
            rx,
        )
    }

    fn tracks(tag: &str) -> TrackSet {
        TrackSet::new(vec![
            LocalTrack::new(format!("{tag}-cam"), TrackSource::Camera),
            LocalTrack::new(format!("{tag}-mic"), TrackSource::Microphone),
        ])
    }

    #[tokio::test]
    async fn second_registration_of_same_id_is_rejected() {
        let broker = LoopbackSignaling::new();
        let (a, mut a_rx) = signal_sink();
        let (b, mut b_rx) = signal_sink();

        let _first = broker.register(PeerId::new("room"), a);
        let _second = broker.register(PeerId::new("room"), b);

        assert!(matches!(a_rx.recv().await, Some(SignalEvent::Open(_))));
        match b_rx.recv().await {
            Some(SignalEvent::Error(e)) => assert!(e.is_id_taken()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn destroy_frees_the_id() {
        let broker = LoopbackSignaling::new();
        let (a, _a_rx) = signal_sink();
        let ep = broker.register(PeerId::new("room"), a);
        assert!(broker.is_registered("room"));
        ep.destroy();
        ep.destroy();
        assert!(!broker.is_registered("room"));
    }

    #[tokio::test]
    async fn answered_call_streams_both_ways_and_replacement_is_visible() {
        let broker = LoopbackSignaling::new();
        let (host_sink, mut host_rx) = signal_sink();
        let (guest_sink, _guest_rx) = signal_sink();
        let _host = broker.register(PeerId::new("room"), host_sink);
        let guest = broker.register(PeerId::new("guest"), guest_sink);
        let _ = host_rx.recv().await;

        let (out_sink, mut out_rx) = call_sink();
        let outbound = guest.call(&PeerId::new("room"), &tracks("g"), out_sink);

        let Some(SignalEvent::Call(incoming)) = host_rx.recv().await else {
            panic!("no incoming call");
        };
        assert_eq!(incoming.peer().as_str(), "guest");
        let (in_sink, mut in_rx) = call_sink();
        incoming.answer(&tracks("h"), in_sink);

        let Some(CallEvent::Stream(at_guest)) = out_rx.recv().await else {
            panic!("guest got no stream");
        };
        let Some(CallEvent::Stream(at_host)) = in_rx.recv().await else {
            panic!("host got no stream");
        };
        assert_eq!(at_guest.video().unwrap().id, "h-cam");
        assert_eq!(at_host.video().unwrap().id, "g-cam");
        assert_eq!(broker.negotiations(), 2);

        let screen = LocalTrack::new("g-screen", TrackSource::Screen);
        assert!(crate::signaling::replace_on_call(outbound.as_ref(), &screen)
            .await
            .unwrap());
        assert_eq!(at_host.video().unwrap().source, TrackSource::Screen);
        assert_eq!(broker.negotiations(), 2);

        broker.sever("room");
        assert!(matches!(out_rx.recv().await, Some(CallEvent::Closed)));
        assert!(matches!(in_rx.recv().await, Some(CallEvent::Closed)));
    }

    #[tokio::test]
    async fn calling_an_unknown_peer_reports_peer_unavailable() {
        let broker = LoopbackSignaling::new();
        let (sink, mut rx) = signal_sink();
        let ep = broker.register(PeerId::new("lonely"), sink);
        let _ = rx.recv().await;

        let (cs, _crx) = call_sink();
        let _call = ep.call(&PeerId::new("nobody"), &tracks("x"), cs);
        match rx.recv().await {
            Some(SignalEvent::Error(e)) => assert_eq!(e.kind, SignalingErrorKind::PeerUnavailable),
            other => panic!("unexpected {other:?}"),
        }
    }
}
