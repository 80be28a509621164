use crate::helpe::*;

/// Shape of the interconnect between nodes.
///
/// Coordinate topologies number their nodes x-major: node `n` sits at
/// `(n % X, (n / X) % Y, n / (X * Y))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Bag of processors: every distinct pair is one hop apart.
    Flat {
        nodes: usize,
    },
    Mesh {
        dims: [usize; 3],
    },
    /// A mesh whose every dimension wraps around.
    Torus {
        dims: [usize; 3],
    },
}

impl Topology {
    /// Saturates at `usize::MAX`; [Machine::new] refuses such topologies.
    pub fn node_count(&self) -> usize {
        self.checked_node_count().unwrap_or(usize::MAX)
    }

    /// `None` when the extents multiply past `usize::MAX`.
    pub fn checked_node_count(&self) -> Option<usize> {
        match self {
            Topology::Flat { nodes }    => Some(*nodes),
            Topology::Mesh { dims }     |
            Topology::Torus { dims }    => dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d)),
        }
    }

    fn dims(&self) -> Option<&[usize; 3]> {
        match self {
            Topology::Flat { .. }       => None,
            Topology::Mesh { dims }     |
            Topology::Torus { dims }    => Some(dims),
        }
    }
}

/// The path a message takes between two nodes, as seen by a cost model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub nodes:  Vec<NodeId>,
    pub weight: u64,
}

impl Route {
    /// Number of links traversed.
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Weight carried over every traversed link.
    pub fn cost(&self) -> u64 {
        self.hops() as u64 * self.weight
    }
}

/// Simulated compute resources.
///
/// Topology queries never mutate anything. Node availability only changes
/// through [Machine::reserve] and [Machine::release].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    topology:       Topology,
    cores_per_node: u32,
    free:           Vec<bool>,
    num_free:       usize,
}

impl Machine {
    pub fn new(topology: Topology, cores_per_node: u32) -> Result<Self, ConfigError> {
        if cores_per_node == 0 {
            return Err(ConfigError::Machine(String::from("cores per node must be positive")));
        }
        if let Some(dims) = topology.dims() {
            if dims.iter().any(|d| *d == 0) {
                return Err(ConfigError::Machine(format!("zero-sized dimension in {dims:?}")));
            }
        }
        let node_count = topology.checked_node_count()
            .ok_or_else(|| ConfigError::Machine(format!("{topology:?} has more nodes than can be addressed")))?;
        if node_count == 0 {
            return Err(ConfigError::Machine(String::from("machine without nodes")));
        }

        Ok(Self {
            topology,
            cores_per_node,
            free:       vec![true; node_count],
            num_free:   node_count,
        })
    }

    #[inline(always)]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[inline(always)]
    pub fn node_count(&self) -> usize {
        self.free.len()
    }

    #[inline(always)]
    pub fn cores_per_node(&self) -> u32 {
        self.cores_per_node
    }

    #[inline(always)]
    pub fn total_procs(&self) -> u64 {
        self.node_count() as u64 * self.cores_per_node as u64
    }

    #[inline(always)]
    pub fn num_free(&self) -> usize {
        self.num_free
    }

    #[inline(always)]
    pub fn is_free(&self, node: NodeId) -> bool {
        self.free.get(node).copied().unwrap_or(false)
    }

    /// Free nodes in ascending index order.
    pub fn free_nodes(&self) -> Vec<NodeId> {
        self.free.iter()
            .enumerate()
            .filter_map(|(n, f)| if *f { Some(n) } else { None })
            .collect()
    }

    pub fn free_bitmap(&self) -> &[bool] {
        &self.free
    }

    /// Coordinates of a node. Flat machines place everything on the x axis.
    pub fn coords(&self, node: NodeId) -> [usize; 3] {
        match self.topology.dims() {
            None        => [node, 0, 0],
            Some(dims)  => [node % dims[0], (node / dims[0]) % dims[1], node / (dims[0] * dims[1])],
        }
    }

    pub fn node_at(&self, c: [usize; 3]) -> Option<NodeId> {
        match self.topology.dims() {
            None        => if c[1] == 0 && c[2] == 0 && c[0] < self.node_count() { Some(c[0]) } else { None },
            Some(dims)  => {
                if c.iter().zip(dims.iter()).any(|(x, d)| x >= d) {
                    None
                } else {
                    Some(c[0] + dims[0] * (c[1] + dims[1] * c[2]))
                }
            }
        }
    }

    /// Symmetric, zero iff `a == b`. Manhattan distance on a mesh, the
    /// same with wrap-around on a torus.
    pub fn distance(&self, a: NodeId, b: NodeId) -> u64 {
        if a == b { return 0; }
        match self.topology {
            Topology::Flat { .. }       => 1,
            Topology::Mesh { .. }       => {
                let (ca, cb) = (self.coords(a), self.coords(b));
                (0..3).map(|i| ca[i].abs_diff(cb[i]) as u64).sum()
            },
            Topology::Torus { dims }    => {
                let (ca, cb) = (self.coords(a), self.coords(b));
                (0..3).map(|i| {
                    let d = ca[i].abs_diff(cb[i]);
                    d.min(dims[i] - d) as u64
                }).sum()
            },
        }
    }

    /// Largest distance between any two nodes.
    pub fn diameter(&self) -> u64 {
        match self.topology {
            Topology::Flat { nodes }    => if nodes > 1 { 1 } else { 0 },
            Topology::Mesh { dims }     => dims.iter().map(|d| (d - 1) as u64).sum(),
            Topology::Torus { dims }    => dims.iter().map(|d| (d / 2) as u64).sum(),
        }
    }

    /// Currently free nodes exactly `distance` away from `center`, in
    /// ascending index order.
    pub fn free_at_distance(&self, center: NodeId, distance: u64) -> Vec<NodeId> {
        self.free.iter()
            .enumerate()
            .filter(|(n, f)| **f && self.distance(center, *n) == distance)
            .map(|(n, _)| n)
            .collect()
    }

    /// Dimension-ordered route from `a` to `b` (x first, then y, then z),
    /// taking the short way around on a torus. Flat machines route over a
    /// single shared link.
    pub fn route(&self, a: NodeId, b: NodeId, weight: u64) -> Route {
        let dims = match self.topology {
            Topology::Flat { .. }   => return Route { nodes: if a == b { vec![a] } else { vec![a, b] }, weight },
            Topology::Mesh { dims } |
            Topology::Torus { dims } => dims,
        };
        let wraps = matches!(self.topology, Topology::Torus { .. });
        let mut cur = self.coords(a);
        let target = self.coords(b);
        let mut nodes = vec![a];
        for i in 0..3 {
            while cur[i] != target[i] {
                let fwd = (target[i] + dims[i] - cur[i]) % dims[i];
                let step_up = if wraps { fwd <= dims[i] - fwd } else { target[i] > cur[i] };
                cur[i] = if step_up { (cur[i] + 1) % dims[i] } else { (cur[i] + dims[i] - 1) % dims[i] };
                // Coordinates stay in range by construction.
                if let Some(n) = self.node_at(cur) { nodes.push(n); }
            }
        }

        Route { nodes, weight }
    }

    /// Marks `nodes` busy, all or nothing. Fails without touching the bitmap
    /// if any node is busy, out of range, or listed twice.
    pub fn reserve(&mut self, nodes: &[NodeId]) -> bool {
        let mut seen = BTreeSet::new();
        let ok = nodes.iter().all(|n| self.is_free(*n) && seen.insert(*n));
        if !ok { return false; }
        for n in nodes {
            self.free[*n] = false;
        }
        self.num_free -= nodes.len();

        true
    }

    /// Returns `nodes` to the free pool. Releasing a node that is already
    /// free is a broken invariant; the bitmap is left untouched then.
    pub fn release(&mut self, nodes: &[NodeId]) -> Result<(), SimError> {
        let mut seen = BTreeSet::new();
        if let Some(n) = nodes.iter().find(|n| self.is_free(**n) || **n >= self.node_count() || !seen.insert(**n)) {
            return Err(SimError::NodeAlreadyFree { node: *n });
        }
        for n in nodes {
            self.free[*n] = true;
        }
        self.num_free += nodes.len();
        debug_assert!(self.num_free <= self.node_count());

        Ok(())
    }

    /// The placement a job of `n` nodes would get on an empty machine:
    /// the `n` nodes closest to node 0, ties broken by index. Flat
    /// machines have no notion of a better placement and return `None`.
    pub fn baseline_nodes(&self, n: usize) -> Option<Vec<NodeId>> {
        if n > self.node_count() { return None; }
        match self.topology {
            Topology::Flat { .. } => None,
            _ => Some(
                (0..self.node_count())
                    .sorted_by_key(|node| (self.distance(0, *node), *node))
                    .take(n)
                    .collect()
            ),
        }
    }

    /// One-line description for reports.
    pub fn setup_info(&self) -> String {
        match self.topology {
            Topology::Flat { nodes }    => format!("{nodes} flat nodes, {} cores per node", self.cores_per_node),
            Topology::Mesh { dims }     => format!("{}x{}x{} Mesh, {} cores per node", dims[0], dims[1], dims[2], self.cores_per_node),
            Topology::Torus { dims }    => format!("{}x{}x{} Torus, {} cores per node", dims[0], dims[1], dims[2], self.cores_per_node),
        }
    }

    /// Overwrites availability with a bitmap taken from a snapshot.
    pub(crate) fn restore_bitmap(&mut self, free: &[bool]) -> Result<(), ConfigError> {
        if free.len() != self.node_count() {
            return Err(ConfigError::Snapshot(format!(
                "bitmap has {} entries, machine has {} nodes", free.len(), self.node_count()
            )));
        }
        self.free = free.to_vec();
        self.num_free = free.iter().filter(|f| **f).count();

        Ok(())
    }
}
