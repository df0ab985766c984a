//! Run-scoped registry of structural innovations.
//!
//! Every distinct `(source, target)` edge created anywhere in a run receives one
//! innovation id, reused for every later occurrence so that genes of genomes
//! with different shapes can be aligned. The registry also hands out node ids
//! for hidden nodes. All access goes through one mutex.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::gene::{InnovationId, NodeId};
use super::genome::Genome;

#[derive(Debug, Default)]
struct RegistryState {
    edges: HashMap<(NodeId, NodeId), InnovationId>,
    next_innovation: InnovationId,
    next_node: NodeId,
}

/// Innovation and node id allocator shared by all operators of a run.
#[derive(Debug, Default)]
pub struct InnovationRegistry {
    state: Mutex<RegistryState>,
}

impl InnovationRegistry {
    /// Create a registry whose hidden node ids start after the fixed
    /// input and output ids (`0..first_hidden_id`).
    pub fn new(first_hidden_id: NodeId) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                next_node: first_hidden_id,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // The state is a pair of counters and a map; it stays consistent even if
        // a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Innovation id of the edge `source -> target`, allocating one on first use.
    pub fn get_or_create(&self, source: NodeId, target: NodeId) -> InnovationId {
        let mut state = self.lock();
        if let Some(&id) = state.edges.get(&(source, target)) {
            return id;
        }
        let id = state.next_innovation;
        state.next_innovation += 1;
        state.edges.insert((source, target), id);
        id
    }

    /// Allocate a fresh hidden node id.
    pub fn new_node_id(&self) -> NodeId {
        let mut state = self.lock();
        let id = state.next_node;
        state.next_node += 1;
        id
    }

    /// Record the edges and ids of a genome created outside this registry
    /// (e.g. loaded from disk) so later allocations never collide with it.
    pub fn observe(&self, genome: &Genome) {
        let mut state = self.lock();
        for conn in genome.connections() {
            state.edges.entry(conn.edge()).or_insert(conn.innovation);
            state.next_innovation = state.next_innovation.max(conn.innovation + 1);
        }
        if let Some(max_node) = genome.nodes().map(|n| n.id).max() {
            state.next_node = state.next_node.max(max_node + 1);
        }
    }

    /// Number of distinct edges registered so far.
    pub fn innovation_count(&self) -> usize {
        self.lock().edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_same_edge_same_id() {
        let registry = InnovationRegistry::new(10);
        let a = registry.get_or_create(0, 5);
        let b = registry.get_or_create(1, 5);
        let c = registry.get_or_create(0, 5);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(b, a + 1);
        assert_eq!(registry.innovation_count(), 2);
    }

    #[test]
    fn test_direction_matters() {
        let registry = InnovationRegistry::new(10);
        assert_ne!(registry.get_or_create(3, 4), registry.get_or_create(4, 3));
        assert_eq!(registry.get_or_create(4, 3), 1);
        assert_eq!(registry.innovation_count(), 2);
    }

    #[test]
    fn test_node_ids_start_after_fixed_nodes() {
        let registry = InnovationRegistry::new(7);
        assert_eq!(registry.new_node_id(), 7);
        assert_eq!(registry.new_node_id(), 8);
    }

    #[test]
    fn test_concurrent_edges_collapse() {
        let registry = Arc::new(InnovationRegistry::new(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..50)
                        .map(|i| registry.get_or_create(i % 10, 50 + i % 5))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<InnovationId>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Every thread sees the same id for the same edge.
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(registry.innovation_count(), 10);
    }
}
