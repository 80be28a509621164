use crate::{
    helpe::*,
    alloc::{FreeListAllocator, NearestAllocator, RandomAllocator, SortedFreeListAllocator},
    policy::{EasyPolicy, PriorityQueuePolicy},
    stats::LogKind,
};

/// Everything needed to set up one simulation replica.
///
/// Components are named with `name[arg,arg]` strings:
/// - machine: `simple` | `flat`, `mesh[x,y(,z)]`, `torus[x,y(,z)]`
/// - allocator: `simple` | `freelist`, `sortedfreelist[curve file]`,
///   `nearest`, `random[seed]`
/// - scheduler: `fcfs`, `pqueue[comparator]`, `easy[comparator]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub nodes:          usize,
    pub cores_per_node: u32,
    pub machine:        String,
    pub allocator:      String,
    pub scheduler:      String,
    pub trace:          Option<PathBuf>,
    pub trace_format:   TraceFormat,
    pub retry_interval: Option<SimTime>,
    pub snapshot_at:    Vec<SimTime>,
    pub output_dir:     Option<PathBuf>,
    pub logs:           Vec<LogKind>,
    /// Track fair start times, strict or relaxed.
    pub fst:            Option<FstMode>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes:          4,
            cores_per_node: 1,
            machine:        String::from("simple"),
            allocator:      String::from("simple"),
            scheduler:      String::from("fcfs"),
            trace:          None,
            trace_format:   TraceFormat::default(),
            retry_interval: None,
            snapshot_at:    vec![],
            output_dir:     None,
            logs:           vec![],
            fst:            None,
        }
    }
}

/// Splits `name[a,b]` into `("name", ["a", "b"])`. A bare name has no
/// arguments.
pub fn parse_params(s: &str) -> Result<(String, Vec<String>), ConfigError> {
    let s = s.trim();
    let bad = |message: &str| ConfigError::Params { component: s.to_string(), message: message.to_string() };
    match s.find('[') {
        None        => {
            if s.contains(']') { return Err(bad("unbalanced brackets")); }
            Ok((s.to_lowercase(), vec![]))
        },
        Some(open)  => {
            if !s.ends_with(']') || s[open + 1..s.len() - 1].contains(['[', ']']) {
                return Err(bad("unbalanced brackets"));
            }
            let name = s[..open].trim().to_lowercase();
            let inner = s[open + 1..s.len() - 1].trim();
            let args = if inner.is_empty() {
                vec![]
            } else {
                inner.split(',').map(|a| a.trim().to_string()).collect()
            };
            if name.is_empty() { return Err(bad("missing name")); }

            Ok((name, args))
        },
    }
}

fn arity(component: &str, args: &[String], allowed: &[usize]) -> Result<(), ConfigError> {
    if allowed.contains(&args.len()) {
        Ok(())
    } else {
        Err(ConfigError::Params {
            component:  component.to_string(),
            message:    format!("expected {} argument(s), got {}", allowed.iter().join(" or "), args.len()),
        })
    }
}

fn number<T: std::str::FromStr>(component: &str, arg: &str) -> Result<T, ConfigError> {
    arg.parse::<T>().map_err(|_| ConfigError::Params {
        component:  component.to_string(),
        message:    format!("`{arg}` is not a valid number"),
    })
}

impl SimConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn build_machine(&self) -> Result<Machine, ConfigError> {
        let (name, args) = parse_params(&self.machine)?;
        let topology = match name.as_str() {
            "simple" | "flat"   => {
                arity(&self.machine, &args, &[0])?;
                Topology::Flat { nodes: self.nodes }
            },
            "mesh" | "torus"    => {
                arity(&self.machine, &args, &[2, 3])?;
                let mut dims = [1; 3];
                for (d, a) in dims.iter_mut().zip(args.iter()) {
                    *d = number(&self.machine, a)?;
                }
                let product = dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d))
                    .ok_or_else(|| ConfigError::Machine(format!("{} has more nodes than can be addressed", self.machine)))?;
                if product != self.nodes {
                    return Err(ConfigError::Machine(format!(
                        "{} has {product} nodes but {} were requested", self.machine, self.nodes
                    )));
                }
                if name == "mesh" { Topology::Mesh { dims } } else { Topology::Torus { dims } }
            },
            _                   => return Err(ConfigError::UnknownComponent { kind: "machine", name }),
        };

        Machine::new(topology, self.cores_per_node)
    }

    pub fn build_allocator(&self, machine: &Machine) -> Result<Box<dyn Allocator>, ConfigError> {
        let (name, args) = parse_params(&self.allocator)?;
        let res: Box<dyn Allocator> = match name.as_str() {
            "simple" | "freelist"   => {
                arity(&self.allocator, &args, &[0])?;
                Box::new(FreeListAllocator::new())
            },
            "sortedfreelist"        => {
                arity(&self.allocator, &args, &[1])?;
                Box::new(SortedFreeListAllocator::from_curve_file(Path::new(&args[0]), machine.node_count())?)
            },
            "nearest"               => {
                arity(&self.allocator, &args, &[0])?;
                Box::new(NearestAllocator::new())
            },
            "random"                => {
                arity(&self.allocator, &args, &[0, 1])?;
                let seed = match args.first() {
                    Some(a) => number(&self.allocator, a)?,
                    None    => 0,
                };
                Box::new(RandomAllocator::new(seed))
            },
            _                       => return Err(ConfigError::UnknownComponent { kind: "allocator", name }),
        };

        Ok(res)
    }

    pub fn build_policy(&self) -> Result<Box<dyn SchedulerPolicy>, ConfigError> {
        let (name, args) = parse_params(&self.scheduler)?;
        let cmp = match args.first() {
            Some(a) => JobComparator::from_name(a)?,
            None    => JobComparator::Fifo,
        };
        let res: Box<dyn SchedulerPolicy> = match name.as_str() {
            "fcfs"      => {
                arity(&self.scheduler, &args, &[0])?;
                Box::new(PriorityQueuePolicy::fcfs())
            },
            "pqueue"    => {
                arity(&self.scheduler, &args, &[0, 1])?;
                Box::new(PriorityQueuePolicy::new(cmp))
            },
            "easy"      => {
                arity(&self.scheduler, &args, &[0, 1])?;
                Box::new(EasyPolicy::new(cmp))
            },
            _           => return Err(ConfigError::UnknownComponent { kind: "scheduler", name }),
        };

        Ok(res)
    }

    /// File name stem used for logs.
    pub fn trace_base(&self) -> String {
        self.trace.as_ref()
            .and_then(|p| p.file_name())
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("sim"))
    }
}
