//! Фаза определения роли: сначала пробуем занять id комнаты (хост),
//! при коллизии переходим в гостя со случайным id.

use crate::error::SignalingError;
use crate::peer::state::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePhase {
    Idle,
    /// registration as this role is in flight
    Resolving(Role),
    Resolved(Role),
}

/// Исход регистрации идентичности
#[derive(Debug, Clone, Copy)]
pub enum Registration<'a> {
    Opened,
    Failed(&'a SignalingError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleDecision {
    BecomeHost,
    /// guest identity is open, dial the host
    BecomeGuest,
    /// room id taken, re-register with a fresh identity
    FallBackToGuest,
    Fail(SignalingError),
    Ignore,
}

pub fn resolve(phase: RolePhase, outcome: Registration<'_>) -> RoleDecision {
    match (phase, outcome) {
        (RolePhase::Resolving(Role::Host), Registration::Opened) => RoleDecision::BecomeHost,
        (RolePhase::Resolving(Role::Host), Registration::Failed(err)) if err.is_id_taken() => {
            RoleDecision::FallBackToGuest
        }
        (RolePhase::Resolving(Role::Guest), Registration::Opened) => RoleDecision::BecomeGuest,
        (RolePhase::Resolving(_), Registration::Failed(err)) => RoleDecision::Fail(err.clone()),
        (RolePhase::Resolved(_), Registration::Failed(err)) => RoleDecision::Fail(err.clone()),
        (RolePhase::Resolved(_), Registration::Opened) | (RolePhase::Idle, _) => {
            RoleDecision::Ignore
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignalingErrorKind;

    fn err(kind: SignalingErrorKind) -> SignalingError {
        SignalingError::new(kind, "test")
    }

    #[test]
    fn first_registration_wins_the_host_role() {
        assert_eq!(
            resolve(RolePhase::Resolving(Role::Host), Registration::Opened),
            RoleDecision::BecomeHost
        );
    }

    #[test]
    fn collision_falls_back_to_guest() {
        let taken = err(SignalingErrorKind::UnavailableId);
        assert_eq!(
            resolve(
                RolePhase::Resolving(Role::Host),
                Registration::Failed(&taken)
            ),
            RoleDecision::FallBackToGuest
        );
    }

    #[test]
    fn other_host_failures_are_fatal() {
        let net = err(SignalingErrorKind::Network);
        assert_eq!(
            resolve(RolePhase::Resolving(Role::Host), Registration::Failed(&net)),
            RoleDecision::Fail(net.clone())
        );
    }

    #[test]
    fn guest_collision_does_not_loop() {
        let taken = err(SignalingErrorKind::UnavailableId);
        assert_eq!(
            resolve(
                RolePhase::Resolving(Role::Guest),
                Registration::Failed(&taken)
            ),
            RoleDecision::Fail(taken.clone())
        );
        assert_eq!(
            resolve(RolePhase::Resolving(Role::Guest), Registration::Opened),
            RoleDecision::BecomeGuest
        );
    }

    #[test]
    fn late_open_is_ignored() {
        assert_eq!(
            resolve(RolePhase::Resolved(Role::Host), Registration::Opened),
            RoleDecision::Ignore
        );
        assert_eq!(
            resolve(RolePhase::Idle, Registration::Opened),
            RoleDecision::Ignore
        );
    }
}
