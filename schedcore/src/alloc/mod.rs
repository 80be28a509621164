pub mod freelist;
pub mod nearest;
pub mod random;

pub use freelist::{FreeListAllocator, SortedFreeListAllocator};
pub use nearest::NearestAllocator;
pub use random::RandomAllocator;

use crate::helpe::*;

/// The outcome of placing a job: which nodes it got, in placement order,
/// plus locality figures derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocInfo {
    pub job_id:                 JobId,
    pub nodes:                  Vec<NodeId>,
    pub max_pairwise_distance:  u64,
    pub avg_pairwise_distance:  f64,
}

impl AllocInfo {
    pub fn new(job_id: JobId, nodes: Vec<NodeId>, machine: &Machine) -> Self {
        let (mut max, mut sum, mut pairs) = (0, 0, 0u64);
        for (a, b) in nodes.iter().tuple_combinations() {
            let d = machine.distance(*a, *b);
            max = max.max(d);
            sum += d;
            pairs += 1;
        }

        Self {
            job_id,
            nodes,
            max_pairwise_distance:  max,
            avg_pairwise_distance:  if pairs == 0 { 0.0 } else { sum as f64 / pairs as f64 },
        }
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }
}

/// A node-selection strategy.
///
/// Implementors only have to say which nodes they would pick; the
/// provided [Allocator::allocate] checks the pick and reserves it on the
/// machine atomically. A strategy never sees a half-reserved machine and
/// never leaves one behind.
pub trait Allocator: Send {
    /// One-line description for reports.
    fn setup_info(&self) -> String;

    /// Chooses `job.requested_nodes` free nodes, or nothing. Must not
    /// mutate anything.
    fn pick(&self, machine: &Machine, job: &Job) -> Option<Vec<NodeId>>;

    /// Places `job` on `machine`. On `None` the machine is untouched.
    fn allocate(&self, machine: &mut Machine, job: &Job) -> Option<AllocInfo> {
        let wanted = job.requested_nodes;
        if wanted > machine.node_count() || wanted > machine.num_free() {
            return None;
        }
        let nodes = self.pick(machine, job)?;
        if nodes.len() != wanted {
            warn!(job = job.id, picked = nodes.len(), wanted, "allocator returned a wrong-sized pick");
            return None;
        }
        if !machine.reserve(&nodes) {
            warn!(job = job.id, ?nodes, "allocator picked busy or repeated nodes");
            return None;
        }

        Some(AllocInfo::new(job.id, nodes, machine))
    }

    /// What `job` would get on an otherwise empty machine, for statistics.
    /// `None` means the machine model has no notion of an ideal placement.
    fn baseline_allocation(&self, machine: &Machine, job: &Job) -> Option<AllocInfo> {
        machine.baseline_nodes(job.requested_nodes)
            .map(|nodes| AllocInfo::new(job.id, nodes, machine))
    }
}
