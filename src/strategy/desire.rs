//! Adaptive marking-probability strategy.
//!
//! Each node keeps a desire level in `(0, 0.5]` that it halves while its
//! neighborhood is crowded (effective degree at least 2) and doubles, capped
//! at 0.5, while it is not. Per round every node marks itself with its
//! desire level as probability; a marked node whose active neighbors have
//! all reported themselves unmarked joins. The feedback keeps the expected
//! number of marks in any closed neighborhood bounded, so collisions stay
//! rare and some node makes progress.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, trace, warn};

use crate::NodeId;
use crate::config::DesireLevelConfig;
use crate::messages::Message;
use crate::neighbors::NeighborTable;
use crate::traits::{Action, Step, Strategy, TimerTag};

/// Effective-degree feedback rule, applied at each round boundary with the
/// previous round's effective degree.
#[must_use]
pub fn next_desire_level(current: f64, effective_degree: f64) -> f64 {
    if effective_degree >= 2.0 {
        current / 2.0
    } else {
        (current * 2.0).min(0.5)
    }
}

/// Strict marking predicate: the local mark must be set and every active
/// neighbor must have reported an unmarked state this round. Waiting for
/// every report keeps two adjacent marked nodes from both joining when
/// their announcements reorder.
#[must_use]
pub fn should_join(marked: bool, reported: impl IntoIterator<Item = Option<bool>>) -> bool {
    marked && reported.into_iter().all(|mark| mark == Some(false))
}

/// Per-neighbor latched state. The desire level carries across rounds; the
/// mark report is scoped to the current round.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct PeerState {
    desire: Option<f64>,
    mark: Option<bool>,
}

/// Adaptive marking strategy state.
#[derive(Debug)]
pub struct DesireLevel {
    id: NodeId,
    config: DesireLevelConfig,
    round: u64,
    desire: f64,
    marked: bool,
    mark_sent: bool,
    neighbors: NeighborTable<PeerState>,
}

impl DesireLevel {
    #[must_use]
    pub fn new(
        id: NodeId,
        config: DesireLevelConfig,
        neighbors: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self {
            id,
            config,
            round: 0,
            desire: 0.5,
            marked: false,
            mark_sent: false,
            neighbors: NeighborTable::new(neighbors),
        }
    }

    fn effective_degree(&self) -> f64 {
        self.neighbors
            .active()
            .filter_map(|(_, peer)| peer.desire)
            .sum()
    }

    fn begin_round(&mut self) -> Step {
        self.round += 1;
        self.marked = false;
        self.mark_sent = false;
        for (_, peer) in self.neighbors.active_mut() {
            peer.mark = None;
        }

        if !self.neighbors.has_active() {
            debug!(node = self.id, round = self.round, "no active neighbors, joining");
            return Step::join();
        }

        let effective_degree = self.effective_degree();
        let previous = self.desire;
        self.desire = next_desire_level(self.desire, effective_degree);
        debug!(
            node = self.id,
            round = self.round,
            effective_degree,
            previous,
            desire = self.desire,
            "starting round"
        );

        Step::emit(vec![
            Action::Schedule(
                self.config.desire_level_send_delay,
                TimerTag::SendDesireLevel,
            ),
            Action::Schedule(self.config.round_interval, TimerTag::RoundStart),
        ])
    }

    fn evaluate(&self) -> bool {
        if !self.neighbors.has_active() {
            return true;
        }
        self.mark_sent
            && should_join(
                self.marked,
                self.neighbors.active().map(|(_, peer)| peer.mark),
            )
    }

    fn try_join(&self) -> Step {
        if self.evaluate() {
            debug!(
                node = self.id,
                round = self.round,
                desire = self.desire,
                "marked with no marked neighbor, joining"
            );
            Step::join()
        } else {
            Step::none()
        }
    }

    #[cfg(test)]
    pub(crate) fn force_mark(&mut self, marked: bool) {
        self.marked = marked;
        self.mark_sent = true;
    }
}

impl Strategy for DesireLevel {
    fn startup_jitter(&self) -> Duration {
        self.config.initial_start_delay
    }

    fn on_start(&mut self, _rng: &mut impl Rng) -> Step {
        self.begin_round()
    }

    fn on_timer(&mut self, tag: TimerTag, rng: &mut impl Rng) -> Step {
        match tag {
            TimerTag::RoundStart => self.begin_round(),
            TimerTag::SendDesireLevel => {
                trace!(node = self.id, round = self.round, p = self.desire, "announcing desire level");
                Step::emit(vec![
                    Action::Broadcast(Message::DesireLevel {
                        round: self.round,
                        p: self.desire,
                    }),
                    Action::Schedule(self.config.desire_level_send_delay, TimerTag::CheckMarking),
                ])
            }
            TimerTag::CheckMarking => {
                self.marked = rng.random_range(0.0..1.0) < self.desire;
                self.mark_sent = true;
                debug!(
                    node = self.id,
                    round = self.round,
                    marked = self.marked,
                    p = self.desire,
                    "marking"
                );

                let mut step = self.try_join();
                step.emit.insert(
                    0,
                    Action::Broadcast(Message::Mark {
                        round: self.round,
                        marked: self.marked,
                    }),
                );
                step
            }
            tag => {
                warn!(node = self.id, ?tag, "unexpected timer");
                Step::none()
            }
        }
    }

    fn on_message(&mut self, sender: NodeId, message: &Message) -> Step {
        match *message {
            Message::DesireLevel { round, p } => {
                if round != self.round {
                    warn!(
                        node = self.id,
                        neighbor = sender,
                        current = self.round,
                        round,
                        "desire level from another round, discarding"
                    );
                    return Step::none();
                }
                if let Some(peer) = self.neighbors.data_mut(sender) {
                    peer.desire = Some(p);
                    trace!(node = self.id, neighbor = sender, p, "latched desire level");
                }
                Step::none()
            }
            Message::Mark { round, marked } => {
                if round != self.round {
                    warn!(
                        node = self.id,
                        neighbor = sender,
                        current = self.round,
                        round,
                        "mark from another round, discarding"
                    );
                    return Step::none();
                }
                if let Some(peer) = self.neighbors.data_mut(sender) {
                    peer.mark = Some(marked);
                    if marked {
                        trace!(node = self.id, neighbor = sender, "neighbor is marked");
                    }
                    self.try_join()
                } else {
                    trace!(node = self.id, neighbor = sender, "mark from inactive neighbor");
                    Step::none()
                }
            }
            Message::JoinNotice { .. } => {
                if self.neighbors.deactivate(sender).is_some() {
                    debug!(node = self.id, neighbor = sender, "neighbor joined the MIS");
                    Step::retire()
                } else {
                    trace!(node = self.id, neighbor = sender, "join notice ignored");
                    Step::none()
                }
            }
            Message::TerminateNotice { .. } => {
                if self.neighbors.deactivate(sender).is_some() {
                    trace!(
                        node = self.id,
                        neighbor = sender,
                        active = self.neighbors.active_count(),
                        "neighbor terminated"
                    );
                    // The shrunken active set may satisfy the predicate now.
                    self.try_join()
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
        self.round
    }

    fn residual(&self) -> Option<f64> {
        Some(self.desire)
    }
}
