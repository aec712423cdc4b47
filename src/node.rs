//! Node shell: lifecycle, termination cascade, terminal outcome.

use rand::Rng;
use tracing::{debug, trace};

use crate::NodeId;
use crate::messages::{Envelope, Message};
use crate::traits::{Action, Step, Strategy, TimerTag, Transition};

/// Lifecycle of a node. Transitions are monotone and the terminal states
/// absorb: a terminal node handles no further events and emits nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Still participating in the algorithm.
    Active,
    /// Joined the independent set.
    InMis,
    /// Left the algorithm without joining.
    Dormant,
}

impl NodeState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Statistics exposed to the host once a node reaches a terminal state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outcome {
    pub in_mis: bool,
    /// Rounds or phases consumed; zero for strategies without a clock.
    pub rounds: u64,
    /// Final residual parameter of the randomized strategies.
    pub residual: Option<f64>,
}

/// Transition hook, e.g. for a host's visualization collaborator.
pub type Observer = Box<dyn FnMut(NodeId, NodeState) + Send>;

/// One graph vertex: a single-threaded state machine over timer events and
/// neighbor messages, parameterized by an algorithm strategy.
pub struct Node<S> {
    id: NodeId,
    state: NodeState,
    strategy: S,
    observer: Option<Observer>,
}

impl<S: Strategy> Node<S> {
    #[must_use]
    pub fn new(id: NodeId, strategy: S) -> Self {
        Self {
            id,
            state: NodeState::Active,
            strategy,
            observer: None,
        }
    }

    /// Install a hook invoked on every lifecycle transition.
    #[must_use]
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// `Some` once the node is terminal.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            NodeState::Active => None,
            state => Some(Outcome {
                in_mis: state == NodeState::InMis,
                rounds: self.strategy.progress(),
                residual: self.strategy.residual(),
            }),
        }
    }

    /// Schedule the jittered start timer. Call once after construction.
    pub fn start(&mut self, rng: &mut impl Rng) -> Vec<Action> {
        let jitter = self
            .strategy
            .startup_jitter()
            .mul_f64(rng.random_range(0.0..1.0));
        trace!(node = self.id, ?jitter, "scheduling start");
        vec![Action::Schedule(jitter, TimerTag::Start)]
    }

    /// A self-timer fired.
    pub fn handle_timer(&mut self, tag: TimerTag, rng: &mut impl Rng) -> Vec<Action> {
        if self.state.is_terminal() {
            trace!(node = self.id, ?tag, "timer after terminal transition");
            return Vec::new();
        }
        let step = match tag {
            TimerTag::Start => self.strategy.on_start(rng),
            tag => self.strategy.on_timer(tag, rng),
        };
        self.apply(step)
    }

    /// A neighbor message arrived.
    pub fn handle_message(&mut self, envelope: &Envelope) -> Vec<Action> {
        if self.state.is_terminal() {
            trace!(
                node = self.id,
                sender = envelope.sender,
                "message after terminal transition"
            );
            return Vec::new();
        }
        let step = self.strategy.on_message(envelope.sender, &envelope.message);
        self.apply(step)
    }

    fn apply(&mut self, step: Step) -> Vec<Action> {
        let Step { mut emit, transition } = step;
        if let Some(transition) = transition {
            let phase = self.strategy.progress();
            match transition {
                Transition::Join => {
                    self.state = NodeState::InMis;
                    debug!(node = self.id, phase, "joined the MIS");
                    emit.push(Action::Broadcast(Message::JoinNotice { phase }));
                }
                Transition::Retire => {
                    self.state = NodeState::Dormant;
                    debug!(node = self.id, phase, "terminated without joining");
                }
            }
            emit.push(Action::Broadcast(Message::TerminateNotice { phase }));
            emit.push(Action::CancelTimers);
            if let Some(observer) = &mut self.observer {
                observer(self.id, self.state);
            }
        }
        emit
    }
}
