//! Randomized per-phase priority strategy.
//!
//! Every phase each active node draws a uniform priority and broadcasts it.
//! The node with the strictly smallest draw in its active neighborhood
//! joins; everyone else redraws next phase. Expected phases to global
//! completion is logarithmic in the graph size.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, trace, warn};

use crate::NodeId;
use crate::config::FastMisConfig;
use crate::messages::Message;
use crate::neighbors::NeighborTable;
use crate::traits::{Action, Step, Strategy, TimerTag};

/// Pure join predicate for one phase.
///
/// The local draw must exist, every active neighbor must have reported,
/// and the local draw must be strictly smaller than every report. A tie
/// blocks the join; both parties redraw next phase.
#[must_use]
pub fn should_join<'a, V, I>(mine: Option<&V>, reported: I) -> bool
where
    V: PartialOrd + 'a,
    I: IntoIterator<Item = Option<&'a V>>,
{
    let Some(mine) = mine else {
        return false;
    };
    reported
        .into_iter()
        .all(|value| value.is_some_and(|value| mine < value))
}

/// Randomized per-phase priority strategy state.
#[derive(Debug)]
pub struct FastMis {
    id: NodeId,
    config: FastMisConfig,
    phase: u64,
    my_value: Option<f64>,
    neighbors: NeighborTable<Option<f64>>,
}

impl FastMis {
    #[must_use]
    pub fn new(
        id: NodeId,
        config: FastMisConfig,
        neighbors: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self {
            id,
            config,
            phase: 0,
            my_value: None,
            neighbors: NeighborTable::new(neighbors),
        }
    }

    fn begin_phase(&mut self) -> Step {
        if self.phase > 0 {
            let mut values: Vec<(f64, NodeId)> = self
                .neighbors
                .active()
                .filter_map(|(peer, value)| value.map(|v| (v, peer)))
                .collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            debug!(
                node = self.id,
                phase = self.phase,
                my_value = ?self.my_value,
                ?values,
                "phase ended without a decision"
            );
        }

        self.phase += 1;
        self.my_value = None;
        for (_, value) in self.neighbors.active_mut() {
            *value = None;
        }
        debug!(node = self.id, phase = self.phase, "starting phase");

        if !self.neighbors.has_active() {
            debug!(node = self.id, "no active neighbors, joining");
            return Step::join();
        }
        Step::emit(vec![
            Action::Schedule(self.config.random_value_send_delay, TimerTag::SendRandomValue),
            Action::Schedule(self.config.phase_interval, TimerTag::PhaseStart),
        ])
    }

    fn evaluate(&self) -> bool {
        if !self.neighbors.has_active() {
            return true;
        }
        should_join(
            self.my_value.as_ref(),
            self.neighbors.active().map(|(_, value)| value.as_ref()),
        )
    }

    fn try_join(&self) -> Step {
        if self.evaluate() {
            debug!(
                node = self.id,
                phase = self.phase,
                value = ?self.my_value,
                "smallest priority in the neighborhood"
            );
            Step::join()
        } else {
            Step::none()
        }
    }
}

impl Strategy for FastMis {
    fn startup_jitter(&self) -> Duration {
        self.config.initial_start_delay
    }

    fn on_start(&mut self, _rng: &mut impl Rng) -> Step {
        self.begin_phase()
    }

    fn on_timer(&mut self, tag: TimerTag, rng: &mut impl Rng) -> Step {
        match tag {
            TimerTag::PhaseStart => self.begin_phase(),
            TimerTag::SendRandomValue => {
                let value = rng.random_range(0.0..1.0);
                self.my_value = Some(value);
                trace!(node = self.id, phase = self.phase, value, "drew priority");

                let mut step = self.try_join();
                step.emit.insert(
                    0,
                    Action::Broadcast(Message::RandomValue {
                        round: self.phase,
                        value,
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
            Message::RandomValue { round, value } => {
                if round != self.phase {
                    warn!(
                        node = self.id,
                        neighbor = sender,
                        phase = self.phase,
                        round,
                        "priority from another phase, discarding"
                    );
                    return Step::none();
                }
                if let Some(slot) = self.neighbors.data_mut(sender) {
                    *slot = Some(value);
                    trace!(node = self.id, neighbor = sender, value, "latched priority");
                    self.try_join()
                } else {
                    trace!(node = self.id, neighbor = sender, "priority from inactive neighbor");
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
        self.phase
    }

    fn residual(&self) -> Option<f64> {
        self.my_value
    }
}
