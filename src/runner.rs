//! Async host adapter for a single node.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::pin::pin;

use futures::{Sink, SinkExt, Stream, StreamExt};
use rand::Rng;
use tokio::select;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, instrument, trace, warn};

use crate::messages::{Envelope, Message};
use crate::node::{Node, Outcome};
use crate::traits::{Action, Strategy, TimerTag};

/// Drive a node over a host connection until it reaches a terminal state.
///
/// `conn` yields envelopes merged from all neighbors (any merge order; the
/// per-edge FIFO guarantee is the host's responsibility) and accepts
/// broadcast payloads that the host fans out to every connected neighbor.
/// Envelopes with out-of-range fields are logged and dropped.
///
/// Returns `Ok(Some(outcome))` on terminal transition, or `Ok(None)` if the
/// connection closes while the node is still active and no timer can move
/// it forward.
///
/// # Errors
///
/// Returns an error if the connection fails while sending or receiving.
#[instrument(skip_all, name = "node", fields(node_id = node.id()))]
pub async fn run_node<S, C, E, R>(
    mut node: Node<S>,
    conn: C,
    mut rng: R,
) -> Result<Option<Outcome>, E>
where
    S: Strategy,
    R: Rng,
    C: Stream<Item = Result<Envelope, E>> + Sink<Message, Error = E>,
{
    let mut conn = pin!(conn.fuse());
    let mut timers: BinaryHeap<Reverse<(Instant, u64, TimerTag)>> = BinaryHeap::new();
    let mut seq = 0u64;
    let mut inbound_open = true;

    debug!("node started");
    let mut pending = node.start(&mut rng);

    loop {
        for action in pending.drain(..) {
            match action {
                Action::Broadcast(message) => {
                    trace!(?message, "broadcasting");
                    conn.send(message).await?;
                }
                Action::Schedule(delay, tag) => {
                    seq += 1;
                    timers.push(Reverse((Instant::now() + delay, seq, tag)));
                }
                Action::CancelTimers => timers.clear(),
            }
        }

        if let Some(outcome) = node.outcome() {
            debug!(
                in_mis = outcome.in_mis,
                rounds = outcome.rounds,
                "node reached a terminal state"
            );
            conn.flush().await?;
            return Ok(Some(outcome));
        }

        let next_deadline = timers.peek().map(|Reverse((at, _, _))| *at);
        if !inbound_open && next_deadline.is_none() {
            debug!("connection closed before termination");
            return Ok(None);
        }

        select! {
            () = async {
                if let Some(at) = next_deadline {
                    sleep_until(at).await;
                }
            }, if next_deadline.is_some() => {
                if let Some(Reverse((_, _, tag))) = timers.pop() {
                    trace!(?tag, "timer fired");
                    pending = node.handle_timer(tag, &mut rng);
                }
            }
            envelope = conn.next(), if inbound_open => {
                match envelope {
                    Some(Ok(envelope)) => {
                        if let Err(report) = envelope.message.validate() {
                            warn!(
                                sender = envelope.sender,
                                error = ?report,
                                "dropping malformed message"
                            );
                        } else {
                            pending = node.handle_message(&envelope);
                        }
                    }
                    Some(Err(error)) => return Err(error),
                    None => {
                        debug!("inbound stream closed");
                        inbound_open = false;
                    }
                }
            }
        }
    }
}
