use crate::helpe::*;

/// Orders waiting jobs. `Less` means "run first".
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobComparator {
    /// Arrival order
    #[default]
    Fifo,
    /// Most processors first
    #[value(name = "largefirst")]
    LargeFirst,
    /// Fewest processors first
    #[value(name = "smallfirst")]
    SmallFirst,
    /// Longest estimate first
    #[value(name = "longfirst")]
    LongFirst,
    /// Shortest estimate first
    #[value(name = "shortfirst")]
    ShortFirst,
    /// Most processors, then longest estimate
    #[value(name = "betterfit")]
    BetterFit,
}

impl JobComparator {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        <Self as ValueEnum>::from_str(name.trim(), true).map_err(|_| ConfigError::UnknownComponent {
            kind: "comparator",
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobComparator::Fifo         => "fifo",
            JobComparator::LargeFirst   => "largefirst",
            JobComparator::SmallFirst   => "smallfirst",
            JobComparator::LongFirst    => "longfirst",
            JobComparator::ShortFirst   => "shortfirst",
            JobComparator::BetterFit    => "betterfit",
        }
    }

    pub fn compare(&self, a: &Job, b: &Job) -> Ordering {
        let fifo = (a.arrival_time, a.id).cmp(&(b.arrival_time, b.id));
        match self {
            JobComparator::Fifo         => fifo,
            JobComparator::LargeFirst   => b.procs.cmp(&a.procs).then(fifo),
            JobComparator::SmallFirst   => a.procs.cmp(&b.procs).then(fifo),
            JobComparator::LongFirst    => b.estimated_duration.cmp(&a.estimated_duration).then(fifo),
            JobComparator::ShortFirst   => a.estimated_duration.cmp(&b.estimated_duration).then(fifo),
            JobComparator::BetterFit    => b.procs.cmp(&a.procs)
                                            .then(b.estimated_duration.cmp(&a.estimated_duration))
                                            .then(fifo),
        }
    }
}

/// A running job as the policy sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningView {
    pub job:            JobId,
    pub nodes:          usize,
    /// Start plus user estimate, the only completion time a real
    /// scheduler would know about.
    pub est_completion: SimTime,
}

/// Everything a policy may look at when picking the next job.
pub struct Decision<'a> {
    pub now:            SimTime,
    /// Waiting jobs in arrival order.
    pub queue:          Vec<&'a Job>,
    pub running:        Vec<RunningView>,
    pub free_nodes:     usize,
    pub total_nodes:    usize,
    /// Jobs the allocator turned down since the machine last changed.
    /// They must not be offered again before then.
    pub backed_off:     &'a BTreeSet<JobId>,
}

/// Picks which waiting job the allocator should try next.
///
/// Policies hold no state between calls; the same [Decision] always
/// yields the same answer. A policy never touches the machine.
pub trait SchedulerPolicy: Send {
    fn setup_info(&self) -> String;

    fn select_next(&self, d: &Decision) -> Option<JobId>;
}

fn ordered<'a>(d: &Decision<'a>, cmp: JobComparator) -> Vec<&'a Job> {
    d.queue.iter()
        .copied()
        .sorted_by(|a, b| cmp.compare(a, b))
        .collect()
}

/// Strict priority queue: only the best job by `cmp` is ever offered.
/// With [JobComparator::Fifo] this is plain first-come first-served.
pub struct PriorityQueuePolicy {
    cmp: JobComparator,
}

impl PriorityQueuePolicy {
    pub fn new(cmp: JobComparator) -> Self {
        Self { cmp }
    }

    pub fn fcfs() -> Self {
        Self::new(JobComparator::Fifo)
    }
}

impl SchedulerPolicy for PriorityQueuePolicy {
    fn setup_info(&self) -> String {
        format!("Priority Queue Scheduler (comparator: {})", self.cmp.name())
    }

    fn select_next(&self, d: &Decision) -> Option<JobId> {
        // Whether the head fits is the allocator's call.
        let head = d.queue.iter().copied().min_by(|a, b| self.cmp.compare(a, b))?;
        if d.backed_off.contains(&head.id) { None } else { Some(head.id) }
    }
}

/// EASY backfilling.
///
/// The best waiting job gets a reservation at the shadow time, the
/// earliest estimated completion after which enough nodes are free for
/// it. A later job that fits now may jump ahead if, by its estimate, it
/// is done before the shadow time or leaves the reserved nodes alone.
pub struct EasyPolicy {
    cmp: JobComparator,
}

impl EasyPolicy {
    pub fn new(cmp: JobComparator) -> Self {
        Self { cmp }
    }

    /// Shadow time for `head` and the nodes that will be spare then.
    fn shadow(d: &Decision, head: &Job) -> Option<(SimTime, usize)> {
        // Fits already, it is only held back.
        if d.free_nodes >= head.requested_nodes {
            return Some((d.now, d.free_nodes - head.requested_nodes));
        }
        let mut avail = d.free_nodes;
        for r in d.running.iter().sorted_by_key(|r| (r.est_completion, r.job)) {
            avail += r.nodes;
            if avail >= head.requested_nodes {
                return Some((r.est_completion.max(d.now), avail - head.requested_nodes));
            }
        }

        None
    }
}

impl SchedulerPolicy for EasyPolicy {
    fn setup_info(&self) -> String {
        format!("EASY Scheduler (comparator: {})", self.cmp.name())
    }

    fn select_next(&self, d: &Decision) -> Option<JobId> {
        let waiting = ordered(d, self.cmp);
        let head = waiting.first()?;
        let fits = |j: &Job| !d.backed_off.contains(&j.id) && j.requested_nodes <= d.free_nodes;
        if fits(head) {
            return Some(head.id);
        }

        let shadow = Self::shadow(d, head);
        waiting[1..].iter()
            .find(|j| fits(**j) && match shadow {
                None                    => true,
                Some((at, extra))       => d.now.saturating_add(j.estimated_duration) <= at || j.requested_nodes <= extra,
            })
            .map(|j| j.id)
    }
}
