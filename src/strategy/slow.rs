//! ID-ordered deterministic MIS strategy.
//!
//! A node may join once every higher-ID neighbor has declined, and must
//! retire as soon as a higher-ID neighbor joins. The strictly-highest ID in
//! any neighborhood can decide immediately, and each decision unblocks the
//! IDs below it, so the cascade reaches every node without a round clock.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, trace, warn};

use crate::NodeId;
use crate::config::SlowMisConfig;
use crate::messages::Message;
use crate::neighbors::NeighborTable;
use crate::traits::{Action, Step, Strategy, TimerTag};

/// What a neighbor is known to have decided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PeerDecision {
    #[default]
    Unknown,
    Joined,
    NotJoining,
}

/// Outcome of evaluating the higher-ID neighborhood.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Join,
    Retire,
    Pending,
}

/// Pure decision predicate over the higher-ID neighborhood.
///
/// Undecided higher neighbors block any decision; a joined higher neighbor
/// forces retirement; once every higher neighbor has declined, the node
/// joins.
#[must_use]
pub fn decide(id: NodeId, neighbors: impl IntoIterator<Item = (NodeId, PeerDecision)>) -> Decision {
    let mut any_unknown = false;
    let mut any_joined = false;
    for (_, decision) in neighbors.into_iter().filter(|(peer, _)| *peer > id) {
        match decision {
            PeerDecision::Unknown => any_unknown = true,
            PeerDecision::Joined => any_joined = true,
            PeerDecision::NotJoining => {}
        }
    }
    if any_unknown {
        Decision::Pending
    } else if any_joined {
        Decision::Retire
    } else {
        Decision::Join
    }
}

/// Deterministic, ID-ordered strategy state.
#[derive(Debug)]
pub struct SlowMis {
    id: NodeId,
    config: SlowMisConfig,
    neighbors: NeighborTable<PeerDecision>,
    discovering: bool,
}

impl SlowMis {
    /// Create a node over a statically known adjacency. When
    /// `config.discovery` is set, pass an empty neighbor list and let the
    /// announcement exchange populate the table instead.
    #[must_use]
    pub fn new(
        id: NodeId,
        config: SlowMisConfig,
        neighbors: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self {
            id,
            config,
            neighbors: NeighborTable::new(neighbors),
            discovering: false,
        }
    }

    fn evaluate(&mut self) -> Step {
        if !self.neighbors.has_active() {
            debug!(node = self.id, "no active neighbors left, joining");
            return Step::join();
        }
        match decide(self.id, self.neighbors.all().map(|(peer, d)| (peer, *d))) {
            Decision::Join => Step::join(),
            Decision::Retire => Step::retire(),
            Decision::Pending => {
                trace!(node = self.id, "higher-ID neighbors still undecided");
                Step::none()
            }
        }
    }
}

impl Strategy for SlowMis {
    fn startup_jitter(&self) -> Duration {
        self.config.initial_start_delay
    }

    fn on_start(&mut self, _rng: &mut impl Rng) -> Step {
        if let Some(discovery) = self.config.discovery {
            self.discovering = true;
            debug!(node = self.id, "announcing to neighbors");
            return Step::emit(vec![
                Action::Broadcast(Message::NeighborAnnounce),
                Action::Schedule(discovery.timeout, TimerTag::DiscoveryDeadline),
            ]);
        }
        self.evaluate()
    }

    fn on_timer(&mut self, tag: TimerTag, _rng: &mut impl Rng) -> Step {
        let check_interval = match tag {
            TimerTag::DiscoveryDeadline => {
                self.discovering = false;
                debug!(
                    node = self.id,
                    neighbors = self.neighbors.active_count(),
                    "discovery window closed"
                );
                self.config.discovery.map(|d| d.check_interval)
            }
            TimerTag::DecisionCheck => self.config.discovery.map(|d| d.check_interval),
            tag => {
                warn!(node = self.id, ?tag, "unexpected timer");
                return Step::none();
            }
        };

        let mut step = self.evaluate();
        if step.transition.is_none()
            && let Some(interval) = check_interval
        {
            step.emit
                .push(Action::Schedule(interval, TimerTag::DecisionCheck));
        }
        step
    }

    fn on_message(&mut self, sender: NodeId, message: &Message) -> Step {
        match *message {
            Message::NeighborAnnounce => {
                // Accepted whenever the discovery variant is enabled: a fast
                // starter's announcement may arrive before our own start
                // timer fires.
                if self.config.discovery.is_some() {
                    if self.neighbors.discover(sender) {
                        trace!(node = self.id, neighbor = sender, "discovered neighbor");
                    }
                } else {
                    warn!(node = self.id, neighbor = sender, "unexpected announcement");
                }
                Step::none()
            }
            Message::JoinNotice { .. } => {
                if let Some(decision) = self.neighbors.deactivate(sender) {
                    *decision = PeerDecision::Joined;
                    debug!(node = self.id, neighbor = sender, "higher neighbor joined");
                    Step::retire()
                } else {
                    trace!(node = self.id, neighbor = sender, "join notice ignored");
                    Step::none()
                }
            }
            Message::TerminateNotice { .. } => {
                if let Some(decision) = self.neighbors.deactivate(sender) {
                    *decision = PeerDecision::NotJoining;
                    debug!(node = self.id, neighbor = sender, "neighbor declined");
                    if self.discovering {
                        // Decisions wait for the discovery deadline so an
                        // in-flight announcement cannot be missed.
                        Step::none()
                    } else {
                        self.evaluate()
                    }
                } else {
                    trace!(node = self.id, neighbor = sender, "duplicate terminate");
                    Step::none()
                }
            }
            ref message => {
                warn!(node = self.id, ?message, "message variant not handled");
                Step::none()
            }
        }
    }

    fn progress(&self) -> u64 {
        0
    }

    fn residual(&self) -> Option<f64> {
        None
    }
}
