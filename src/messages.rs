//! MIS protocol messages

use core::fmt;

use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::NodeId;

/// A message together with the identity of the node that sent it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: NodeId,
    pub message: Message,
}

/// Messages exchanged between adjacent nodes.
///
/// `RandomValue`, `DesireLevel` and `Mark` are scoped to the sender's
/// current round and are discarded by any recipient whose round differs.
/// `JoinNotice` and `TerminateNotice` are accepted regardless of round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Fast-MIS per-phase priority announcement.
    RandomValue {
        round: u64,
        /// Uniform draw in `[0, 1)`; smallest in the neighborhood wins.
        value: f64,
    },
    /// Desire-Level round-open announcement.
    DesireLevel {
        round: u64,
        /// Current marking probability, in `(0, 0.5]`.
        p: f64,
    },
    /// Desire-Level marking announcement.
    Mark { round: u64, marked: bool },
    /// Slow-MIS neighbor discovery.
    NeighborAnnounce,
    /// Sender has joined the MIS; active recipients must go dormant.
    JoinNotice { phase: u64 },
    /// Sender has terminated; recipients drop it from their active set.
    TerminateNotice { phase: u64 },
}

/// A message field was outside its documented range.
#[derive(Debug)]
pub struct MessageError;

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("message field out of range")
    }
}

impl core::error::Error for MessageError {}

impl Message {
    /// Validate field ranges at the host boundary.
    ///
    /// # Errors
    ///
    /// Returns a [`MessageError`] report when a priority lies outside
    /// `[0, 1)` or a desire level lies outside `(0, 0.5]`.
    pub fn validate(&self) -> Result<(), Report<MessageError>> {
        match *self {
            Self::RandomValue { value, .. } if !(0.0..1.0).contains(&value) => {
                Err(Report::new(MessageError)
                    .attach_printable(format!("priority {value} outside [0, 1)")))
            }
            Self::DesireLevel { p, .. } if !(p > 0.0 && p <= 0.5) => Err(Report::new(MessageError)
                .attach_printable(format!("desire level {p} outside (0, 0.5]"))),
            _ => Ok(()),
        }
    }
}
