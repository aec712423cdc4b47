//! Per-node mirror of neighbor state.
//!
//! Each node keeps a record for every neighbor it has ever known, carrying
//! an `active` flag and strategy-specific latched data. The records are
//! local mirrors of peer state carried in messages — hints, never shared
//! memory. The active subset only ever shrinks.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::NodeId;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct NeighborRecord<D> {
    active: bool,
    data: D,
}

/// All known neighbors of one node, with per-neighbor latched data `D`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NeighborTable<D> {
    records: BTreeMap<NodeId, NeighborRecord<D>>,
}

impl<D: Default> NeighborTable<D> {
    #[must_use]
    pub fn new(neighbors: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            records: neighbors
                .into_iter()
                .map(|id| {
                    (
                        id,
                        NeighborRecord {
                            active: true,
                            data: D::default(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Register a neighbor discovered after construction.
    ///
    /// Returns `false` if the neighbor was already known.
    pub fn discover(&mut self, id: NodeId) -> bool {
        match self.records.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(NeighborRecord {
                    active: true,
                    data: D::default(),
                });
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Mark a neighbor terminated. Idempotent.
    ///
    /// On the first deactivation the latched data is reset and a mutable
    /// reference to it is returned, so the caller can record a durable fact
    /// about the departed neighbor (e.g. its final decision). Subsequent
    /// calls return `None`.
    pub fn deactivate(&mut self, id: NodeId) -> Option<&mut D> {
        let record = self.records.get_mut(&id)?;
        if !record.active {
            return None;
        }
        record.active = false;
        record.data = D::default();
        Some(&mut record.data)
    }
}

impl<D> NeighborTable<D> {
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.records.contains_key(&id)
    }

    #[must_use]
    pub fn is_active(&self, id: NodeId) -> bool {
        self.records.get(&id).is_some_and(|record| record.active)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.records.values().filter(|record| record.active).count()
    }

    #[must_use]
    pub fn has_active(&self) -> bool {
        self.records.values().any(|record| record.active)
    }

    /// Latched data of an active neighbor.
    pub fn data_mut(&mut self, id: NodeId) -> Option<&mut D> {
        self.records
            .get_mut(&id)
            .filter(|record| record.active)
            .map(|record| &mut record.data)
    }

    /// Active neighbors in ascending ID order.
    pub fn active(&self) -> impl Iterator<Item = (NodeId, &D)> {
        self.records
            .iter()
            .filter(|(_, record)| record.active)
            .map(|(id, record)| (*id, &record.data))
    }

    /// Mutable view of the active neighbors' latched data.
    pub fn active_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut D)> {
        self.records
            .iter_mut()
            .filter(|(_, record)| record.active)
            .map(|(id, record)| (*id, &mut record.data))
    }

    /// Every known neighbor, active or not.
    pub fn all(&self) -> impl Iterator<Item = (NodeId, &D)> {
        self.records
            .iter()
            .map(|(id, record)| (*id, &record.data))
    }
}
