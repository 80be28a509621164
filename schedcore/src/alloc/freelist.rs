use crate::helpe::*;

/// First fit over a fixed priority order of nodes.
pub struct FreeListAllocator {
    order: Option<Vec<NodeId>>,
}

impl FreeListAllocator {
    /// Scans nodes in ascending index order.
    pub fn new() -> Self {
        Self { order: None }
    }

    /// Scans nodes in the given order. Nodes absent from it are never
    /// picked.
    pub fn with_order(order: Vec<NodeId>) -> Self {
        Self { order: Some(order) }
    }
}

impl Default for FreeListAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(always)]
fn first_fit<I>(machine: &Machine, order: I, wanted: usize) -> Option<Vec<NodeId>>
where I: Iterator<Item = NodeId> {
    let res: Vec<NodeId> = order.filter(|n| machine.is_free(*n)).take(wanted).collect();
    if res.len() == wanted { Some(res) } else { None }
}

impl Allocator for FreeListAllocator {
    fn setup_info(&self) -> String {
        String::from("Simple Allocator")
    }

    fn pick(&self, machine: &Machine, job: &Job) -> Option<Vec<NodeId>> {
        match &self.order {
            None        => first_fit(machine, 0..machine.node_count(), job.requested_nodes),
            Some(order) => first_fit(machine, order.iter().copied(), job.requested_nodes),
        }
    }
}

/// First fit whose scan order comes from a cost curve.
///
/// The curve file lists `node rank` pairs, lower ranks being preferred.
/// A `size <k>` line opens a section that applies to requests of at most
/// `k` nodes; the smallest applicable section wins and pairs before any
/// such line form the default section. Nodes a section does not mention
/// follow its ranked ones in ascending index order.
pub struct SortedFreeListAllocator {
    default:    Vec<NodeId>,
    sections:   BTreeMap<usize, Vec<NodeId>>,
}

impl SortedFreeListAllocator {
    pub fn from_curve_file(path: &Path, node_count: usize) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_curve_str(&text, &path.display().to_string(), node_count)
    }

    pub fn from_curve_str(text: &str, origin: &str, node_count: usize) -> Result<Self, ConfigError> {
        let bad = |lineno: usize, message: String| ConfigError::Curve {
            path:       origin.to_string(),
            message:    format!("line {}: {message}", lineno + 1),
        };
        // Section size (None for default) -> (node, rank) pairs
        let mut raw: Vec<(Option<usize>, Vec<(NodeId, i64)>)> = vec![(None, vec![])];
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue; }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(bad(lineno, format!("expected 2 fields, found {}", fields.len())));
            }
            if fields[0] == "size" {
                let k = fields[1].parse::<usize>()
                    .map_err(|_| bad(lineno, format!("`{}` is not a section size", fields[1])))?;
                if raw.iter().any(|(s, _)| *s == Some(k)) {
                    return Err(bad(lineno, format!("section size {k} appears twice")));
                }
                raw.push((Some(k), vec![]));
                continue;
            }
            let node = fields[0].parse::<NodeId>()
                .map_err(|_| bad(lineno, format!("`{}` is not a node", fields[0])))?;
            let rank = fields[1].parse::<i64>()
                .map_err(|_| bad(lineno, format!("`{}` is not a rank", fields[1])))?;
            if node >= node_count {
                return Err(bad(lineno, format!("node {node} is out of range (machine has {node_count})")));
            }
            let current = raw.len() - 1;
            let pairs = &mut raw[current].1;
            if pairs.iter().any(|(n, r)| *n == node || *r == rank) {
                return Err(bad(lineno, format!("node {node} or rank {rank} listed twice")));
            }
            pairs.push((node, rank));
        }

        let mut default = vec![];
        let mut sections = BTreeMap::new();
        for (size, pairs) in raw {
            let order = Self::complete_order(pairs, node_count);
            match size {
                None    => default = order,
                Some(k) => { sections.insert(k, order); },
            }
        }

        Ok(Self { default, sections })
    }

    fn complete_order(mut pairs: Vec<(NodeId, i64)>, node_count: usize) -> Vec<NodeId> {
        pairs.sort_unstable_by_key(|(_, r)| *r);
        let ranked: BTreeSet<NodeId> = pairs.iter().map(|(n, _)| *n).collect();
        pairs.into_iter()
            .map(|(n, _)| n)
            .chain((0..node_count).filter(|n| !ranked.contains(n)))
            .collect()
    }

    /// Scan order used for a request of `wanted` nodes.
    pub fn order_for(&self, wanted: usize) -> &[NodeId] {
        self.sections.range(wanted..)
            .next()
            .map(|(_, o)| o.as_slice())
            .unwrap_or(&self.default)
    }
}

impl Allocator for SortedFreeListAllocator {
    fn setup_info(&self) -> String {
        format!("Sorted Free List Allocator ({} size section(s))", self.sections.len())
    }

    fn pick(&self, machine: &Machine, job: &Job) -> Option<Vec<NodeId>> {
        first_fit(machine, self.order_for(job.requested_nodes).iter().copied(), job.requested_nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(nodes: u32) -> Job {
        Job::new(&JobSpec { id: 1, arrival: 0, procs: nodes, estimated_duration: 1, actual_duration: 1 }, 1)
    }

    #[test]
    fn first_fit_skips_busy_nodes() {
        let mut m = Machine::new(Topology::Flat { nodes: 6 }, 1).unwrap();
        assert!(m.reserve(&[1, 2]));
        let a = FreeListAllocator::new();
        assert_eq!(a.pick(&m, &job(3)), Some(vec![0, 3, 4]));
        assert_eq!(a.pick(&m, &job(5)), None);

        let b = FreeListAllocator::with_order(vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(b.pick(&m, &job(2)), Some(vec![5, 4]));
    }

    #[test]
    fn curve_sections() {
        let curve = "# default\n3 0\n0 1\nsize 2\n5 10\n4 20\nsize 4\n1 0\n";
        let a = SortedFreeListAllocator::from_curve_str(curve, "curve", 6).unwrap();
        assert_eq!(a.order_for(1), &[5, 4, 0, 1, 2, 3]);
        assert_eq!(a.order_for(2), &[5, 4, 0, 1, 2, 3]);
        assert_eq!(a.order_for(3), &[1, 0, 2, 3, 4, 5]);
        assert_eq!(a.order_for(5), &[3, 0, 1, 2, 4, 5]);

        let m = Machine::new(Topology::Flat { nodes: 6 }, 1).unwrap();
        assert_eq!(a.pick(&m, &job(2)), Some(vec![5, 4]));
    }

    #[test]
    fn curve_errors() {
        assert!(SortedFreeListAllocator::from_curve_str("0 1\n0 2\n", "c", 4).is_err());
        assert!(SortedFreeListAllocator::from_curve_str("0 1\n1 1\n", "c", 4).is_err());
        assert!(SortedFreeListAllocator::from_curve_str("7 1\n", "c", 4).is_err());
        assert!(SortedFreeListAllocator::from_curve_str("size x\n", "c", 4).is_err());
        assert!(SortedFreeListAllocator::from_curve_str("1 2 3\n", "c", 4).is_err());
        // Same node in two sections is fine.
        assert!(SortedFreeListAllocator::from_curve_str("0 1\nsize 2\n0 1\n", "c", 4).is_ok());
    }
}
