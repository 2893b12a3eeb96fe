//! Per-session finite state machine for one participant's match lifecycle.
//!
//! Every client session owns exactly one machine; there is no central
//! orchestrator process. Timers and subscriptions hang off the session and are
//! torn down with it, so the machine is single-owner and transitions apply
//! directly.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Which side of the match a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Opened the match and draws the shape.
    Creator,
    /// Claimed the match and guesses while drawing.
    Guesser,
}

impl Role {
    /// The opposite side.
    pub fn peer(self) -> Role {
        match self {
            Role::Creator => Role::Guesser,
            Role::Guesser => Role::Creator,
        }
    }
}

/// Readiness flags tracked during the pre-match handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandshakeFlags {
    /// This session's participant confirmed they are ready.
    pub local_ready: bool,
    /// A role-tagged `ready` event from the other side was observed.
    pub peer_ready: bool,
}

impl HandshakeFlags {
    fn synchronized(self) -> bool {
        self.local_ready && self.peer_ready
    }
}

/// Why a session ended without reaching the live phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The guesser's search window lapsed with nothing claimable.
    SearchTimedOut,
    /// The creator's waiting room expired with no join.
    WaitingRoomTimedOut,
    /// The handshake window lapsed before both peers were ready.
    HandshakeTimedOut,
    /// The session was torn down (navigation, unmount) before going live.
    Abandoned,
}

/// Phases a session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Guesser: polling the waiting queue.
    Searching,
    /// Creator: match created, waiting for a guesser to claim it.
    WaitingRoom,
    /// Both: claimed/joined, exchanging `ready` events.
    Handshake(HandshakeFlags),
    /// Both peers synchronized; the draw relay is running.
    Live,
    /// Match play concluded.
    Finished,
    /// Session ended before the match became live.
    Failed(FailureReason),
}

/// Events that can be applied to the session machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Guesser won the claim.
    MatchClaimed,
    /// Creator learned a guesser joined (bus hint or store re-read).
    GuesserArrived,
    /// The local participant pressed start.
    LocalReady,
    /// A `ready` event tagged with the peer's role was observed.
    PeerReady,
    /// Match play concluded.
    MatchConcluded,
    /// The phase-appropriate timer fired.
    TimedOut,
    /// The session is being torn down.
    Abandon,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// State machine implementing one session's side of the match lifecycle.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    role: Role,
    phase: SessionPhase,
}

impl SessionMachine {
    /// Machine for a guesser session, starting in the search loop.
    pub fn searching() -> Self {
        Self {
            role: Role::Guesser,
            phase: SessionPhase::Searching,
        }
    }

    /// Machine for a creator session, starting in the waiting room.
    pub fn waiting_room() -> Self {
        Self {
            role: Role::Creator,
            phase: SessionPhase::WaitingRoom,
        }
    }

    /// Machine for a session that has already paired and enters the handshake
    /// directly (the claim or join happened outside this machine's lifetime).
    pub fn handshake(role: Role) -> Self {
        Self {
            role,
            phase: SessionPhase::Handshake(HandshakeFlags::default()),
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// This session's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether both handshake flags are set and the session is live.
    pub fn is_live(&self) -> bool {
        self.phase == SessionPhase::Live
    }

    /// Apply an event, moving to the next phase.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    ///
    /// The handshake transitions are level-triggered: `LocalReady` and
    /// `PeerReady` are idempotent, and `Live` is reached whenever the
    /// conjunction of both flags holds, regardless of which event set the
    /// second flag.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        use SessionEvent::*;
        use SessionPhase::*;

        let next = match (self.phase, event) {
            (Searching, MatchClaimed) => Handshake(HandshakeFlags::default()),
            (WaitingRoom, GuesserArrived) => Handshake(HandshakeFlags::default()),

            (Handshake(mut flags), LocalReady) => {
                flags.local_ready = true;
                if flags.synchronized() { Live } else { Handshake(flags) }
            }
            (Handshake(mut flags), PeerReady) => {
                flags.peer_ready = true;
                if flags.synchronized() { Live } else { Handshake(flags) }
            }

            (Live, MatchConcluded) => Finished,

            (Searching, TimedOut) => Failed(FailureReason::SearchTimedOut),
            (WaitingRoom, TimedOut) => Failed(FailureReason::WaitingRoomTimedOut),
            (Handshake(_), TimedOut) => Failed(FailureReason::HandshakeTimedOut),

            (Searching | WaitingRoom | Handshake(_), Abandon) => {
                Failed(FailureReason::Abandoned)
            }

            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(machine: &mut SessionMachine, event: SessionEvent) -> SessionPhase {
        machine.apply(event).unwrap()
    }

    #[test]
    fn guesser_happy_path() {
        let mut machine = SessionMachine::searching();
        assert_eq!(machine.phase(), SessionPhase::Searching);

        apply(&mut machine, SessionEvent::MatchClaimed);
        apply(&mut machine, SessionEvent::LocalReady);
        assert_eq!(
            machine.phase(),
            SessionPhase::Handshake(HandshakeFlags {
                local_ready: true,
                peer_ready: false,
            })
        );

        assert_eq!(apply(&mut machine, SessionEvent::PeerReady), SessionPhase::Live);
        assert_eq!(
            apply(&mut machine, SessionEvent::MatchConcluded),
            SessionPhase::Finished
        );
    }

    #[test]
    fn handshake_converges_in_either_order() {
        // Peer's ready observed first, then local confirmation.
        let mut machine = SessionMachine::waiting_room();
        apply(&mut machine, SessionEvent::GuesserArrived);
        apply(&mut machine, SessionEvent::PeerReady);
        assert_eq!(apply(&mut machine, SessionEvent::LocalReady), SessionPhase::Live);

        // Local confirmation first, then the peer's ready.
        let mut machine = SessionMachine::waiting_room();
        apply(&mut machine, SessionEvent::GuesserArrived);
        apply(&mut machine, SessionEvent::LocalReady);
        assert_eq!(apply(&mut machine, SessionEvent::PeerReady), SessionPhase::Live);
    }

    #[test]
    fn redundant_ready_events_are_absorbed() {
        let mut machine = SessionMachine::searching();
        apply(&mut machine, SessionEvent::MatchClaimed);
        apply(&mut machine, SessionEvent::PeerReady);
        // The peer re-publishes; the flag stays set and nothing breaks.
        apply(&mut machine, SessionEvent::PeerReady);
        assert_eq!(apply(&mut machine, SessionEvent::LocalReady), SessionPhase::Live);
    }

    #[test]
    fn timers_map_to_phase_specific_failures() {
        let mut machine = SessionMachine::searching();
        apply(&mut machine, SessionEvent::TimedOut);
        assert_eq!(
            machine.phase(),
            SessionPhase::Failed(FailureReason::SearchTimedOut)
        );

        let mut machine = SessionMachine::waiting_room();
        apply(&mut machine, SessionEvent::TimedOut);
        assert_eq!(
            machine.phase(),
            SessionPhase::Failed(FailureReason::WaitingRoomTimedOut)
        );
    }

    #[test]
    fn live_sessions_ignore_stale_timers() {
        let mut machine = SessionMachine::waiting_room();
        apply(&mut machine, SessionEvent::GuesserArrived);
        apply(&mut machine, SessionEvent::LocalReady);
        apply(&mut machine, SessionEvent::PeerReady);
        assert!(machine.is_live());

        // A timer that was not cancelled in time must not fail a live match.
        let err = machine.apply(SessionEvent::TimedOut).unwrap_err();
        assert_eq!(err.from, SessionPhase::Live);
        assert_eq!(err.event, SessionEvent::TimedOut);
        assert!(machine.is_live());
    }

    #[test]
    fn abandon_is_only_valid_before_live() {
        let mut machine = SessionMachine::searching();
        apply(&mut machine, SessionEvent::Abandon);
        assert_eq!(
            machine.phase(),
            SessionPhase::Failed(FailureReason::Abandoned)
        );

        let mut machine = SessionMachine::searching();
        apply(&mut machine, SessionEvent::MatchClaimed);
        apply(&mut machine, SessionEvent::LocalReady);
        apply(&mut machine, SessionEvent::PeerReady);
        assert!(machine.apply(SessionEvent::Abandon).is_err());
    }

    #[test]
    fn roles_are_complementary() {
        assert_eq!(Role::Creator.peer(), Role::Guesser);
        assert_eq!(Role::Guesser.peer(), Role::Creator);
    }
}
