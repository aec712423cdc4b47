//! Deterministic discrete-event simulation of whole graphs.
//!
//! A single-threaded event queue plays the host: it delivers self-timers
//! and neighbor messages with a fixed link delay, giving per-edge FIFO and
//! fully reproducible runs from seeded RNGs. The scenario tests pin exact
//! deterministic labelings; the randomized sweeps assert the MIS
//! invariants over many seeded graphs.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::time::Duration;

use basic_mis::{
    Action, DesireLevel, DesireLevelConfig, DiscoveryConfig, Envelope, FastMis, FastMisConfig,
    Node, NodeId, NodeState, Outcome, SlowMis, SlowMisConfig, Strategy, TimerTag,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Initialize tracing for tests. Call at the start of each test.
/// Uses RUST_LOG env var for filtering (defaults to "debug" for this crate).
fn init_tracing() -> impl Sized {
    use tracing::Dispatch;
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("basic_mis=debug")),
        )
        .with_test_writer()
        .finish();

    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_default(&dispatch)
}

const LINK_DELAY: Duration = Duration::from_millis(1);

enum Event {
    Timer(NodeId, TimerTag),
    Deliver(NodeId, Envelope),
}

struct Scheduled {
    at: Duration,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

struct Sim<S> {
    nodes: BTreeMap<NodeId, (Node<S>, StdRng)>,
    adjacency: BTreeMap<NodeId, Vec<NodeId>>,
    queue: BinaryHeap<Reverse<Scheduled>>,
    now: Duration,
    seq: u64,
}

impl<S: Strategy> Sim<S> {
    fn new(
        ids: &[NodeId],
        edges: &[(NodeId, NodeId)],
        seed: u64,
        build: impl Fn(NodeId, &[NodeId]) -> S,
    ) -> Self {
        let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> =
            ids.iter().map(|&id| (id, Vec::new())).collect();
        for &(a, b) in edges {
            adjacency.get_mut(&a).unwrap().push(b);
            adjacency.get_mut(&b).unwrap().push(a);
        }

        let mut sim = Self {
            nodes: BTreeMap::new(),
            adjacency,
            queue: BinaryHeap::new(),
            now: Duration::ZERO,
            seq: 0,
        };
        for &id in ids {
            let neighbors = sim.adjacency[&id].clone();
            let mut rng = StdRng::seed_from_u64(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ id);
            let mut node = Node::new(id, build(id, &neighbors));
            let actions = node.start(&mut rng);
            sim.nodes.insert(id, (node, rng));
            sim.dispatch(id, actions);
        }
        sim
    }

    fn dispatch(&mut self, id: NodeId, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Schedule(delay, tag) => {
                    let at = self.now + delay;
                    self.push(at, Event::Timer(id, tag));
                }
                Action::Broadcast(message) => {
                    for peer in self.adjacency[&id].clone() {
                        self.push(
                            self.now + LINK_DELAY,
                            Event::Deliver(
                                peer,
                                Envelope {
                                    sender: id,
                                    message: message.clone(),
                                },
                            ),
                        );
                    }
                }
                // The node shell already ignores post-terminal timers.
                Action::CancelTimers => {}
            }
        }
    }

    fn push(&mut self, at: Duration, event: Event) {
        self.seq += 1;
        self.queue.push(Reverse(Scheduled {
            at,
            seq: self.seq,
            event,
        }));
    }

    fn run(&mut self, deadline: Duration) {
        while let Some(Reverse(scheduled)) = self.queue.pop() {
            if scheduled.at > deadline {
                break;
            }
            self.now = scheduled.at;
            let (id, actions) = match scheduled.event {
                Event::Timer(id, tag) => {
                    let (node, rng) = self.nodes.get_mut(&id).unwrap();
                    (id, node.handle_timer(tag, rng))
                }
                Event::Deliver(id, envelope) => {
                    let (node, _) = self.nodes.get_mut(&id).unwrap();
                    (id, node.handle_message(&envelope))
                }
            };
            self.dispatch(id, actions);
        }
    }

    fn states(&self) -> BTreeMap<NodeId, NodeState> {
        self.nodes
            .iter()
            .map(|(&id, (node, _))| (id, node.state()))
            .collect()
    }

    fn outcome(&self, id: NodeId) -> Option<Outcome> {
        self.nodes[&id].0.outcome()
    }
}

/// Every node terminated, no two adjacent members, and every dormant node
/// has a member neighbor.
fn assert_valid_mis(states: &BTreeMap<NodeId, NodeState>, edges: &[(NodeId, NodeId)]) {
    for (&id, &state) in states {
        assert!(state.is_terminal(), "node {id} never terminated");
    }
    for &(a, b) in edges {
        assert!(
            !(states[&a] == NodeState::InMis && states[&b] == NodeState::InMis),
            "adjacent nodes {a} and {b} are both in the MIS"
        );
    }
    for (&id, &state) in states {
        if state == NodeState::Dormant {
            let covered = edges.iter().any(|&(a, b)| {
                (a == id && states[&b] == NodeState::InMis)
                    || (b == id && states[&a] == NodeState::InMis)
            });
            assert!(covered, "dormant node {id} has no MIS neighbor");
        }
    }
}

fn members(states: &BTreeMap<NodeId, NodeState>) -> Vec<NodeId> {
    states
        .iter()
        .filter(|&(_, &state)| state == NodeState::InMis)
        .map(|(&id, _)| id)
        .collect()
}

fn random_graph(n: NodeId, p: f64, seed: u64) -> (Vec<NodeId>, Vec<(NodeId, NodeId)>) {
    use rand::Rng;

    let mut rng = StdRng::seed_from_u64(seed);
    let ids: Vec<NodeId> = (0..n).collect();
    let mut edges = Vec::new();
    for a in 0..n {
        for b in (a + 1)..n {
            if rng.random_range(0.0..1.0) < p {
                edges.push((a, b));
            }
        }
    }
    (ids, edges)
}

fn slow_sim(ids: &[NodeId], edges: &[(NodeId, NodeId)], seed: u64) -> Sim<SlowMis> {
    Sim::new(ids, edges, seed, |id, neighbors| {
        SlowMis::new(id, SlowMisConfig::default(), neighbors.iter().copied())
    })
}

fn fast_sim(ids: &[NodeId], edges: &[(NodeId, NodeId)], seed: u64) -> Sim<FastMis> {
    Sim::new(ids, edges, seed, |id, neighbors| {
        FastMis::new(id, FastMisConfig::default(), neighbors.iter().copied())
    })
}

fn desire_sim(ids: &[NodeId], edges: &[(NodeId, NodeId)], seed: u64) -> Sim<DesireLevel> {
    Sim::new(ids, edges, seed, |id, neighbors| {
        DesireLevel::new(id, DesireLevelConfig::default(), neighbors.iter().copied())
    })
}

#[test]
fn slow_path_of_five_settles_on_the_odd_ids() {
    let _guard = init_tracing();
    let ids = [1, 2, 3, 4, 5];
    let edges = [(1, 2), (2, 3), (3, 4), (4, 5)];

    let mut sim = slow_sim(&ids, &edges, 11);
    sim.run(Duration::from_secs(30));

    let states = sim.states();
    assert_valid_mis(&states, &edges);
    assert_eq!(members(&states), vec![1, 3, 5]);
}

#[test]
fn slow_single_edge_highest_id_joins() {
    let _guard = init_tracing();
    let ids = [1, 2];
    let edges = [(1, 2)];

    let mut sim = slow_sim(&ids, &edges, 3);
    sim.run(Duration::from_secs(30));

    let states = sim.states();
    assert_eq!(states[&2], NodeState::InMis);
    assert_eq!(states[&1], NodeState::Dormant);
}

#[test]
fn slow_triangle_highest_id_wins() {
    let _guard = init_tracing();
    let ids = [1, 2, 3];
    let edges = [(1, 2), (2, 3), (1, 3)];

    let mut sim = slow_sim(&ids, &edges, 5);
    sim.run(Duration::from_secs(30));

    let states = sim.states();
    assert_valid_mis(&states, &edges);
    assert_eq!(members(&states), vec![3]);
}

#[test]
fn slow_discovery_variant_matches_the_static_result() {
    let _guard = init_tracing();
    let ids = [1, 2, 3];
    let edges = [(1, 2), (2, 3)];
    let config = SlowMisConfig {
        discovery: Some(DiscoveryConfig::default()),
        ..SlowMisConfig::default()
    };

    // Discovery nodes start with an empty table and learn the adjacency
    // from the announcement exchange.
    let mut sim = Sim::new(&ids, &edges, 17, |id, _| SlowMis::new(id, config, []));
    sim.run(Duration::from_secs(30));

    let states = sim.states();
    assert_valid_mis(&states, &edges);
    assert_eq!(members(&states), vec![1, 3]);
}

#[test]
fn slow_random_graphs_satisfy_the_invariants() {
    let _guard = init_tracing();
    for seed in 0..5 {
        let (ids, edges) = random_graph(12, 0.3, seed);
        let mut sim = slow_sim(&ids, &edges, seed);
        sim.run(Duration::from_secs(60));
        assert_valid_mis(&sim.states(), &edges);
    }
}

#[test]
fn fast_single_edge_elects_exactly_one() {
    let _guard = init_tracing();
    let ids = [1, 2];
    let edges = [(1, 2)];

    let mut sim = fast_sim(&ids, &edges, 23);
    sim.run(Duration::from_secs(60));

    let states = sim.states();
    assert_valid_mis(&states, &edges);
    assert_eq!(members(&states).len(), 1);
}

#[test]
fn fast_star_is_won_by_the_center_or_by_every_leaf() {
    let _guard = init_tracing();
    let ids = [0, 1, 2, 3, 4];
    let edges = [(0, 1), (0, 2), (0, 3), (0, 4)];

    for seed in 0..8 {
        let mut sim = fast_sim(&ids, &edges, seed);
        sim.run(Duration::from_secs(120));

        let states = sim.states();
        assert_valid_mis(&states, &edges);
        let members = members(&states);
        assert!(
            members == vec![0] || members == vec![1, 2, 3, 4],
            "unexpected star outcome {members:?}"
        );
    }
}

#[test]
fn fast_complete_graph_elects_exactly_one() {
    let _guard = init_tracing();
    let ids = [1, 2, 3, 4, 5];
    let edges = [
        (1, 2),
        (1, 3),
        (1, 4),
        (1, 5),
        (2, 3),
        (2, 4),
        (2, 5),
        (3, 4),
        (3, 5),
        (4, 5),
    ];

    let mut sim = fast_sim(&ids, &edges, 31);
    sim.run(Duration::from_secs(120));

    let states = sim.states();
    assert_valid_mis(&states, &edges);
    assert_eq!(members(&states).len(), 1);
}

#[test]
fn empty_graph_every_node_joins_in_phase_one() {
    let _guard = init_tracing();
    let ids = [1, 2, 3, 4];

    let mut sim = fast_sim(&ids, &[], 37);
    sim.run(Duration::from_secs(10));

    for &id in &ids {
        let outcome = sim.outcome(id).expect("isolated node must terminate");
        assert!(outcome.in_mis);
        assert_eq!(outcome.rounds, 1);
    }
}

#[test]
fn fast_random_graphs_satisfy_the_invariants() {
    let _guard = init_tracing();
    for seed in 0..5 {
        let (ids, edges) = random_graph(12, 0.3, seed);
        let mut sim = fast_sim(&ids, &edges, seed);
        sim.run(Duration::from_secs(300));
        assert_valid_mis(&sim.states(), &edges);
    }
}

#[test]
fn desire_isolated_node_joins_in_round_one() {
    let _guard = init_tracing();
    let mut sim = desire_sim(&[7], &[], 41);
    sim.run(Duration::from_secs(10));

    let outcome = sim.outcome(7).expect("isolated node must terminate");
    assert!(outcome.in_mis);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.residual, Some(0.5));
}

#[test]
fn desire_path_of_three_settles_on_a_valid_set() {
    let _guard = init_tracing();
    let ids = [1, 2, 3];
    let edges = [(1, 2), (2, 3)];

    for seed in 0..4 {
        let mut sim = desire_sim(&ids, &edges, seed);
        sim.run(Duration::from_secs(300));

        let states = sim.states();
        assert_valid_mis(&states, &edges);
        let members = members(&states);
        assert!(
            members == vec![2] || members == vec![1, 3],
            "unexpected path outcome {members:?}"
        );
    }
}

#[test]
fn desire_random_graphs_satisfy_the_invariants() {
    let _guard = init_tracing();
    for seed in 0..3 {
        let (ids, edges) = random_graph(8, 0.35, seed);
        let mut sim = desire_sim(&ids, &edges, seed);
        sim.run(Duration::from_secs(600));
        assert_valid_mis(&sim.states(), &edges);
    }
}

#[test]
fn duplicate_notices_do_not_resurrect_a_node() {
    let _guard = init_tracing();
    let ids = [1, 2];
    let edges = [(1, 2)];

    let mut sim = slow_sim(&ids, &edges, 43);
    sim.run(Duration::from_secs(30));
    assert_eq!(sim.states()[&1], NodeState::Dormant);

    // Replay node 2's notices straight at the dormant node.
    let (node, _) = sim.nodes.get_mut(&1).unwrap();
    let replayed = node.handle_message(&Envelope {
        sender: 2,
        message: basic_mis::Message::JoinNotice { phase: 0 },
    });
    assert!(replayed.is_empty());
    assert_eq!(node.state(), NodeState::Dormant);
}
