//! Координатор сессии звонка.
//!
//! Одна задача tokio владеет всем состоянием сессии. Команды UI и события
//! сигналинга/звонков приходят в один канал и обрабатываются по очереди.

use crate::config::CallConfig;
use crate::error::CallError;
use crate::events::SessionEvent;
use crate::logger::{emit_event, log, log_error};
use crate::media::{check_granted, LocalTrack, MediaAcquirer, TrackSet};
use crate::peer::role::{resolve, Registration, RoleDecision, RolePhase};
use crate::peer::state::{CallStatus, Role, SessionSnapshot};
use crate::signaling::{
    CallEvent, CallSink, MediaCall, PeerEndpoint, PeerId, SignalEvent, SignalSink, Signaling,
};
use crate::ui::route::Route;
use crate::utils::random_id;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

pub(crate) enum Command {
    Join {
        room: String,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    ToggleAudio {
        reply: oneshot::Sender<Option<bool>>,
    },
    ToggleVideo {
        reply: oneshot::Sender<Option<bool>>,
    },
    ToggleScreenShare {
        reply: oneshot::Sender<Result<bool, CallError>>,
    },
    HangUp {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) enum Input {
    Command(Command),
    Signal { endpoint: u64, event: SignalEvent },
    Call { call: u64, event: CallEvent },
    ScreenEnded { track_id: String },
    Shutdown,
}

/// Внешние коллабораторы сессии
#[derive(Clone)]
pub struct Collaborators {
    pub signaling: Arc<dyn Signaling>,
    pub media: Arc<dyn MediaAcquirer>,
}

pub(super) struct ActiveCall {
    pub(super) token: u64,
    pub(super) call: Arc<dyn MediaCall>,
}

/// Ресурсы одной сессии (одного входа в комнату)
pub(super) struct Live {
    pub(super) room: String,
    pub(super) phase: RolePhase,
    pub(super) endpoint: Option<(u64, Arc<dyn PeerEndpoint>)>,
    pub(super) outbound: Option<ActiveCall>,
    pub(super) inbound: Option<ActiveCall>,
    pub(super) local: TrackSet,
    pub(super) screen: Option<LocalTrack>,
    pub(super) torn_down: bool,
}

impl Live {
    fn new(room: String, local: TrackSet) -> Self {
        Self {
            room,
            phase: RolePhase::Idle,
            endpoint: None,
            outbound: None,
            inbound: None,
            local,
            screen: None,
            torn_down: false,
        }
    }

    pub(super) fn calls(&self) -> Vec<Arc<dyn MediaCall>> {
        self.outbound
            .iter()
            .chain(self.inbound.iter())
            .map(|c| c.call.clone())
            .collect()
    }

    fn role(&self) -> Option<Role> {
        match self.phase {
            RolePhase::Resolved(role) => Some(role),
            _ => None,
        }
    }
}

pub(crate) struct Coordinator {
    pub(super) deps: Collaborators,
    pub(super) config: CallConfig,
    pub(super) tx: mpsc::UnboundedSender<Input>,
    pub(super) state: watch::Sender<SessionSnapshot>,
    pub(super) events: broadcast::Sender<SessionEvent>,
    pub(super) snap: SessionSnapshot,
    pub(super) live: Option<Live>,
    next_token: u64,
}

impl Coordinator {
    pub(crate) fn new(
        deps: Collaborators,
        config: CallConfig,
        tx: mpsc::UnboundedSender<Input>,
        state: watch::Sender<SessionSnapshot>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            deps,
            config,
            tx,
            state,
            events,
            snap: SessionSnapshot::default(),
            live: None,
            next_token: 0,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Input>) {
        log("Call session coordinator started");
        while let Some(input) = rx.recv().await {
            match input {
                Input::Command(cmd) => self.handle_command(cmd).await,
                Input::Signal { endpoint, event } => self.on_signal(endpoint, event),
                Input::Call { call, event } => self.on_call_event(call, event),
                Input::ScreenEnded { track_id } => self.on_screen_ended(&track_id).await,
                Input::Shutdown => {
                    log("Session handle dropped, shutting down coordinator");
                    self.end_session("handle dropped", false);
                    break;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Join { room, reply } => {
                let res = self.join(room).await;
                let _ = reply.send(res);
            }
            Command::ToggleAudio { reply } => {
                let _ = reply.send(self.toggle_audio());
            }
            Command::ToggleVideo { reply } => {
                let _ = reply.send(self.toggle_video());
            }
            Command::ToggleScreenShare { reply } => {
                let res = self.toggle_screen_share().await;
                let _ = reply.send(res);
            }
            Command::HangUp { reply } => {
                self.end_session("hang-up", true);
                let _ = reply.send(());
            }
        }
    }

    // ========== JOIN / ROLE RESOLUTION ==========

    async fn join(&mut self, room: String) -> Result<(), CallError> {
        let room = room.trim().to_string();
        if room.is_empty() {
            log("join called without a room id, redirecting to landing");
            self.emit(SessionEvent::Navigate(Route::Landing));
            return Err(CallError::MissingRoom);
        }

        if let Some(live) = &self.live {
            if live.room == room && !live.torn_down && !self.snap.status.is_finished() {
                log(&format!("Already in room {room}, join ignored"));
                return Ok(());
            }
        }

        // предыдущая сессия закрывается до захвата устройств
        self.teardown("re-join");
        self.live = None;
        self.snap = SessionSnapshot::for_room(&room);
        self.publish();
        self.emit(SessionEvent::Status(CallStatus::Connecting));

        let constraints = self.config.media;
        let acquired = match self.deps.media.user_media(constraints).await {
            Ok(set) => match check_granted(&set, constraints) {
                Ok(()) => Ok(set),
                Err(e) => {
                    set.stop_all();
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };
        let local = match acquired {
            Ok(set) => set,
            Err(e) => {
                let err = CallError::MediaAcquisition(e);
                self.raise(err.clone());
                return Err(err);
            }
        };

        self.live = Some(Live::new(room.clone(), local.clone()));
        self.snap.local = local.clone();
        self.publish();
        self.emit(SessionEvent::LocalTracks(local.infos()));

        self.register(PeerId::new(room), Role::Host);
        Ok(())
    }

    fn register(&mut self, id: PeerId, role: Role) {
        let token = self.token();
        let tx = self.tx.clone();
        let sink = SignalSink::new(move |event| {
            let _ = tx.send(Input::Signal {
                endpoint: token,
                event,
            });
        });

        log(&format!("Registering identity {id} as {role:?}"));
        let endpoint = self.deps.signaling.register(id, sink);
        if let Some(live) = self.live.as_mut() {
            live.endpoint = Some((token, endpoint));
            live.phase = RolePhase::Resolving(role);
        } else {
            endpoint.destroy();
        }
    }

    fn on_signal(&mut self, token: u64, event: SignalEvent) {
        let current = self
            .live
            .as_ref()
            .filter(|l| !l.torn_down)
            .and_then(|l| l.endpoint.as_ref())
            .map(|(t, _)| *t);
        if current != Some(token) {
            log(&format!("Stale signaling event ignored: {event:?}"));
            if let SignalEvent::Call(call) = event {
                call.close();
            }
            return;
        }

        let phase = self.live.as_ref().map(|l| l.phase).unwrap_or(RolePhase::Idle);
        match event {
            SignalEvent::Open(id) => match resolve(phase, Registration::Opened) {
                RoleDecision::BecomeHost => {
                    log(&format!("My peer ID is: {id}"));
                    self.settle_role(Role::Host, &id);
                    self.set_status(CallStatus::Waiting);
                }
                RoleDecision::BecomeGuest => {
                    log(&format!("Joined as guest {id}, calling the host"));
                    self.settle_role(Role::Guest, &id);
                    self.set_status(CallStatus::Connecting);
                    self.dial_host();
                }
                _ => {}
            },
            SignalEvent::Error(err) => match resolve(phase, Registration::Failed(&err)) {
                RoleDecision::FallBackToGuest => {
                    log("Room ID taken, entering as Guest...");
                    if let Some((_, ep)) = self.live.as_mut().and_then(|l| l.endpoint.take()) {
                        ep.destroy();
                    }
                    self.set_status(CallStatus::Connecting);
                    let guest = random_id(self.config.guest_id_bytes);
                    self.register(PeerId::new(guest), Role::Guest);
                }
                RoleDecision::Fail(err) => {
                    self.raise(CallError::Signaling(err));
                }
                _ => {}
            },
            SignalEvent::Call(call) => self.on_incoming(call),
        }
    }

    fn settle_role(&mut self, role: Role, id: &PeerId) {
        if let Some(live) = self.live.as_mut() {
            live.phase = RolePhase::Resolved(role);
        }
        self.snap.role = Some(role);
        self.snap.local_id = Some(id.to_string());
        self.publish();
        self.emit(SessionEvent::Role {
            role,
            id: id.to_string(),
        });
    }

    // ========== CALLS ==========

    fn call_sink(&self, token: u64) -> CallSink {
        let tx = self.tx.clone();
        CallSink::new(move |event| {
            let _ = tx.send(Input::Call { call: token, event });
        })
    }

    /// Гость звонит хосту ровно один раз
    fn dial_host(&mut self) {
        let token = self.token();
        let sink = self.call_sink(token);
        let Some(live) = self.live.as_mut() else {
            return;
        };
        if live.outbound.is_some() {
            return;
        }
        let Some((_, endpoint)) = live.endpoint.as_ref() else {
            return;
        };
        let call = endpoint.call(&PeerId::new(live.room.clone()), &live.local, sink);
        live.outbound = Some(ActiveCall { token, call });
    }

    fn on_incoming(&mut self, call: Arc<dyn MediaCall>) {
        let token = self.token();
        let sink = self.call_sink(token);
        let Some(live) = self.live.as_mut() else {
            call.close();
            return;
        };
        let Some(role) = live.role() else {
            log("Incoming call before role resolution, rejecting");
            call.close();
            return;
        };
        if live.inbound.is_some() {
            log(&format!(
                "Already in a call, rejecting incoming call from {}",
                call.peer()
            ));
            call.close();
            return;
        }

        log(&format!("Receiving call from {}", call.peer()));
        call.answer(&live.local, sink);
        live.inbound = Some(ActiveCall { token, call });
        if role == Role::Host {
            self.set_status(CallStatus::Connecting);
        }
    }

    fn on_call_event(&mut self, token: u64, event: CallEvent) {
        let Some(live) = self.live.as_mut().filter(|l| !l.torn_down) else {
            return;
        };
        let is_outbound = live.outbound.as_ref().map(|c| c.token) == Some(token);
        let is_inbound = live.inbound.as_ref().map(|c| c.token) == Some(token);
        if !is_outbound && !is_inbound {
            log(&format!("Event for a finished call ignored: {event:?}"));
            return;
        }

        match event {
            CallEvent::Stream(stream) => {
                log(&format!("Remote stream {} received", stream.id()));
                let id = stream.id().to_string();
                self.snap.remote = Some(stream);
                self.publish();
                self.emit(SessionEvent::Remote(Some(id)));
                self.set_status(CallStatus::Connected);
            }
            CallEvent::Closed => {
                if is_outbound {
                    live.outbound = None;
                } else {
                    live.inbound = None;
                }
                let no_calls = live.outbound.is_none() && live.inbound.is_none();
                match live.role() {
                    Some(Role::Host) => {
                        log("Call closed, waiting for a new participant");
                        self.clear_remote();
                        if matches!(
                            self.snap.status,
                            CallStatus::Connected | CallStatus::Connecting
                        ) {
                            self.set_status(CallStatus::Waiting);
                        }
                    }
                    _ if no_calls => {
                        log("Call with the host closed, leaving the room");
                        self.end_session("call closed", true);
                    }
                    _ => {}
                }
            }
        }
    }

    fn clear_remote(&mut self) {
        if self.snap.remote.take().is_some() {
            self.publish();
            self.emit(SessionEvent::Remote(None));
        }
    }

    // ========== TRACK TOGGLES ==========

    fn toggle_audio(&mut self) -> Option<bool> {
        let track = self.live.as_ref()?.local.audio().cloned()?;
        track.set_enabled(!track.is_enabled());
        self.snap.audio_enabled = track.is_enabled();
        self.after_local_change();
        Some(self.snap.audio_enabled)
    }

    fn toggle_video(&mut self) -> Option<bool> {
        let track = self.live.as_ref()?.local.video().cloned()?;
        track.set_enabled(!track.is_enabled());
        self.snap.video_enabled = track.is_enabled();
        self.after_local_change();
        Some(self.snap.video_enabled)
    }

    pub(super) fn after_local_change(&mut self) {
        if let Some(live) = self.live.as_ref() {
            self.snap.local = live.local.clone();
        }
        self.publish();
        self.emit(SessionEvent::LocalTracks(self.snap.local.infos()));
    }

    // ========== TEARDOWN ==========

    /// Releases everything the session holds. Runs once per session.
    pub(super) fn teardown(&mut self, reason: &str) -> bool {
        let Some(live) = self.live.as_mut() else {
            return false;
        };
        if live.torn_down {
            return false;
        }
        live.torn_down = true;
        log(&format!("Tearing down session for room {} ({reason})", live.room));

        live.local.stop_all();
        if let Some(screen) = live.screen.take() {
            screen.stop();
        }
        for call in [live.outbound.take(), live.inbound.take()].into_iter().flatten() {
            call.call.close();
        }
        if let Some((_, endpoint)) = live.endpoint.take() {
            endpoint.destroy();
        }
        live.phase = RolePhase::Idle;
        true
    }

    fn end_session(&mut self, reason: &str, navigate: bool) {
        let released = self.teardown(reason);
        // повторный hang-up ничего не делает
        if !released && (self.snap.room.is_none() || self.snap.status == CallStatus::Ended) {
            return;
        }
        self.clear_remote();
        self.set_status(CallStatus::Ended);
        if navigate {
            self.emit(SessionEvent::Navigate(Route::Landing));
        }
    }

    // ========== STATUS / OUTPUT ==========

    pub(super) fn set_status(&mut self, next: CallStatus) -> bool {
        let current = self.snap.status;
        if current == next {
            return false;
        }
        if !current.can_transition(next) {
            log(&format!("Ignoring status change {current:?} -> {next:?}"));
            return false;
        }
        self.snap.status = next;
        self.publish();
        self.emit(SessionEvent::Status(next));
        true
    }

    /// Fatal errors leave a persistent fault and ERROR status,
    /// toggle-scoped ones are only reported.
    pub(super) fn raise(&mut self, err: CallError) {
        log_error(&err.to_string());
        if err.is_fatal() {
            self.snap.fault = Some(err.clone());
            self.publish();
            self.emit(SessionEvent::Fault(err));
            self.set_status(CallStatus::Error);
        } else {
            self.emit(SessionEvent::Fault(err));
        }
    }

    pub(super) fn publish(&self) {
        self.state.send_replace(self.snap.clone());
    }

    pub(super) fn emit(&self, event: SessionEvent) {
        emit_event(self.snap.room.as_deref(), &event);
        let _ = self.events.send(event);
    }

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}
