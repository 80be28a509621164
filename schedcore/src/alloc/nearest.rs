use crate::helpe::*;

/// Locality-aware placement.
///
/// Every free node is tried as a center: rings of free nodes at growing
/// distance are added around it until the request is covered. The center
/// whose set lies closest to it in total wins, the lowest index breaking
/// ties.
#[derive(Default)]
pub struct NearestAllocator;

impl NearestAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Nodes gathered around `center`, ring by ring, with their total
    /// distance from it.
    fn grow(machine: &Machine, center: NodeId, wanted: usize) -> Option<(u64, Vec<NodeId>)> {
        let mut nodes = Vec::with_capacity(wanted);
        let mut total = 0;
        for d in 0..=machine.diameter() {
            for n in machine.free_at_distance(center, d) {
                if nodes.len() == wanted { break; }
                nodes.push(n);
                total += d;
            }
            if nodes.len() == wanted {
                return Some((total, nodes));
            }
        }

        None
    }
}

impl Allocator for NearestAllocator {
    fn setup_info(&self) -> String {
        String::from("Nearest Allocator")
    }

    fn pick(&self, machine: &Machine, job: &Job) -> Option<Vec<NodeId>> {
        let wanted = job.requested_nodes;
        let mut best: Option<(u64, Vec<NodeId>)> = None;
        for center in machine.free_nodes() {
            if let Some((total, nodes)) = Self::grow(machine, center, wanted) {
                match &best {
                    Some((b, _)) if *b <= total => {},
                    _                           => best = Some((total, nodes)),
                }
                // Nothing beats a perfectly packed center.
                if best.as_ref().is_some_and(|(b, _)| *b == 0) { break; }
            }
        }

        best.map(|(_, nodes)| nodes)
    }
}
