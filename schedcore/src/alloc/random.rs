use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::helpe::*;

/// Uniform pick among the free nodes.
///
/// The generator is re-seeded from `(seed, job id)` on every call, so the
/// same job on the same machine state always lands on the same nodes,
/// whether or not the run was restored from a snapshot.
pub struct RandomAllocator {
    seed: u64,
}

impl RandomAllocator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Allocator for RandomAllocator {
    fn setup_info(&self) -> String {
        format!("Random Allocator (seed {})", self.seed)
    }

    fn pick(&self, machine: &Machine, job: &Job) -> Option<Vec<NodeId>> {
        let free = machine.free_nodes();
        if free.len() < job.requested_nodes { return None; }
        let mut rng = StdRng::seed_from_u64(self.seed ^ job.id.wrapping_mul(0x9E37_79B9_7F4A_7C15));

        Some(free.choose_multiple(&mut rng, job.requested_nodes).copied().collect())
    }
}
