use crate::config::CallConfig;
use crate::error::CallError;
use crate::events::SessionEvent;
use crate::logger::{scoped, LogScope};
use crate::peer::coordinator::{Command, Coordinator, Input};
use crate::peer::{CallStatus, Collaborators, SessionSnapshot};
use crate::ui::route::invite_link;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Отправляет Shutdown, когда пропадает последний клон handle
struct ShutdownGuard {
    tx: mpsc::UnboundedSender<Input>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(Input::Shutdown);
    }
}

/// Handle of one call session, owned by the presentation layer.
///
/// All operations are queued to the session's coordinator task. Dropping
/// the last clone tears the session down (stops devices, closes calls,
/// releases the signaling identity).
#[derive(Clone)]
pub struct CallSession {
    tx: mpsc::UnboundedSender<Input>,
    state: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    invite_base: String,
    _guard: Arc<ShutdownGuard>,
}

impl CallSession {
    /// Запускает координатор. Нужен работающий рантайм tokio.
    pub fn spawn(deps: Collaborators, config: CallConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(64);
        let invite_base = config.invite_base_url.clone();
        let scope = LogScope {
            enabled: config.logging,
            prefix: config.log_prefix.clone(),
        };

        let coordinator = Coordinator::new(deps, config, tx.clone(), state_tx, events.clone());
        tokio::spawn(scoped(scope, coordinator.run(rx)));

        Self {
            tx: tx.clone(),
            state: state_rx,
            events,
            invite_base,
            _guard: Arc::new(ShutdownGuard { tx }),
        }
    }

    pub async fn join(&self, room: &str) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Join {
            room: room.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| CallError::SessionClosed)?
    }

    /// New audio enabled flag, `None` without a local audio track.
    pub async fn toggle_audio(&self) -> Result<Option<bool>, CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ToggleAudio { reply })?;
        rx.await.map_err(|_| CallError::SessionClosed)
    }

    /// New video enabled flag, `None` without a local video track.
    pub async fn toggle_video(&self) -> Result<Option<bool>, CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ToggleVideo { reply })?;
        rx.await.map_err(|_| CallError::SessionClosed)
    }

    /// Resolves once the swap settled. `Ok(true)` while sharing.
    pub async fn toggle_screen_share(&self) -> Result<bool, CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ToggleScreenShare { reply })?;
        rx.await.map_err(|_| CallError::SessionClosed)?
    }

    /// Можно вызывать сколько угодно раз, в том числе после завершения
    pub async fn hang_up(&self) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::HangUp { reply }).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> CallStatus {
        self.state.borrow().status
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Ссылка-приглашение для текущей комнаты
    pub fn invite_link(&self) -> Option<String> {
        let room = self.state.borrow().room.clone()?;
        Some(invite_link(&self.invite_base, &room))
    }

    /// Waits until the status equals `status`.
    pub async fn wait_for_status(&self, status: CallStatus) -> Result<SessionSnapshot, CallError> {
        let mut rx = self.state.clone();
        let snap = rx
            .wait_for(|s| s.status == status)
            .await
            .map(|s| (*s).clone())
            .map_err(|_| CallError::SessionClosed);
        snap
    }

    fn send(&self, cmd: Command) -> Result<(), CallError> {
        self.tx
            .send(Input::Command(cmd))
            .map_err(|_| CallError::SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::recorded;
    use crate::media::SyntheticMedia;
    use crate::signaling::LoopbackSignaling;

    fn spawn_with(signaling: &LoopbackSignaling, logging: bool, prefix: &str) -> CallSession {
        let config = CallConfig {
            logging,
            log_prefix: prefix.into(),
            ..CallConfig::default()
        };
        CallSession::spawn(
            Collaborators {
                signaling: Arc::new(signaling.clone()),
                media: Arc::new(SyntheticMedia::new(prefix)),
            },
            config,
        )
    }

    #[tokio::test]
    async fn logging_flag_is_per_session() {
        let signaling = LoopbackSignaling::new();
        let quiet = spawn_with(&signaling, false, "session-quiet");
        let loud = spawn_with(&signaling, true, "session-loud");

        quiet.join("quiet-room").await.unwrap();
        loud.join("loud-room").await.unwrap();
        quiet.wait_for_status(CallStatus::Waiting).await.unwrap();
        loud.wait_for_status(CallStatus::Waiting).await.unwrap();
        quiet.hang_up().await.unwrap();
        loud.hang_up().await.unwrap();

        assert!(recorded::with_prefix("session-quiet").is_empty());
        let lines = recorded::with_prefix("session-loud");
        assert!(lines.iter().any(|l| l.ends_with("Call session coordinator started")));
        assert!(lines.iter().any(|l| l.contains("Registering identity loud-room")));
    }
}
