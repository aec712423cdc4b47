//! Strategy contract between the node shell and the three algorithms.

use std::time::Duration;

use rand::Rng;

use crate::NodeId;
use crate::messages::Message;

/// Self-timer identifiers, carried through the host's scheduler and back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerTag {
    /// Jittered start of the algorithm.
    Start,
    /// Fast-MIS phase boundary.
    PhaseStart,
    /// Fast-MIS priority draw and broadcast.
    SendRandomValue,
    /// Desire-Level round boundary.
    RoundStart,
    /// Desire-Level announcement broadcast.
    SendDesireLevel,
    /// Desire-Level marking draw and broadcast.
    CheckMarking,
    /// End of the Slow-MIS discovery window.
    DiscoveryDeadline,
    /// Slow-MIS periodic re-evaluation while undecided.
    DecisionCheck,
}

/// A side effect requested from the host.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Deliver a copy of the message to every connected neighbor.
    Broadcast(Message),
    /// Fire the tagged timer after the given delay.
    Schedule(Duration, TimerTag),
    /// Drop every pending timer. Idempotent.
    CancelTimers,
}

/// Terminal transition requested by a strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Enter the MIS.
    Join,
    /// Leave the algorithm without joining.
    Retire,
}

/// Outcome of one event handled by a strategy.
///
/// The node shell sends `emit` to the host and, when `transition` is set,
/// appends the termination cascade (notices plus timer cancellation).
#[derive(Debug, Default, PartialEq)]
pub struct Step {
    pub emit: Vec<Action>,
    pub transition: Option<Transition>,
}

impl Step {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn emit(actions: Vec<Action>) -> Self {
        Self {
            emit: actions,
            transition: None,
        }
    }

    #[must_use]
    pub fn join() -> Self {
        Self {
            emit: Vec::new(),
            transition: Some(Transition::Join),
        }
    }

    #[must_use]
    pub fn retire() -> Self {
        Self {
            emit: Vec::new(),
            transition: Some(Transition::Retire),
        }
    }
}

/// A distributed MIS algorithm driven by the node shell.
///
/// Implementations are push-based state machines: the shell feeds timer
/// expirations and neighbor messages in and applies the returned [`Step`].
/// No I/O and no clock access happen inside a handler; randomness is
/// injected by the caller.
pub trait Strategy {
    /// Upper bound for the uniform jitter on the first timer.
    fn startup_jitter(&self) -> Duration;

    /// The jittered start timer fired.
    fn on_start(&mut self, rng: &mut impl Rng) -> Step;

    /// A self-timer fired.
    fn on_timer(&mut self, tag: TimerTag, rng: &mut impl Rng) -> Step;

    /// A neighbor message arrived.
    fn on_message(&mut self, sender: NodeId, message: &Message) -> Step;

    /// Rounds or phases consumed so far. Zero for strategies without a
    /// round clock.
    fn progress(&self) -> u64;

    /// Final residual parameter: the last drawn priority or the current
    /// desire level, if the strategy has one.
    fn residual(&self) -> Option<f64>;
}
