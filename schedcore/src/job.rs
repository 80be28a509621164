use crate::helpe::*;

impl JobSpec {
    /// Number of whole nodes needed to host `procs` processors.
    #[inline(always)]
    pub fn nodes_needed(&self, cores_per_node: u32) -> usize {
        nodes_for(self.procs, cores_per_node)
    }
}

#[inline(always)]
pub(crate) fn nodes_for(procs: u32, cores_per_node: u32) -> usize {
    debug_assert!(cores_per_node > 0, "Machine without cores");
    procs.div_ceil(cores_per_node) as usize
}

impl Job {
    /// Creates a freshly arrived [Job] out of its trace record.
    pub fn new(spec: &JobSpec, cores_per_node: u32) -> Self {
        Self {
            id:                 spec.id,
            arrival_time:       spec.arrival,
            procs:              spec.procs,
            requested_nodes:    spec.nodes_needed(cores_per_node),
            estimated_duration: spec.estimated_duration,
            actual_duration:    spec.actual_duration,
            state:              JobState::Arrived,
            start_time:         None,
            end_time:           None,
            alloc:              None,
        }
    }

    /// Recovers the trace record this job came from.
    pub fn spec(&self) -> JobSpec {
        JobSpec {
            id:                 self.id,
            arrival:            self.arrival_time,
            procs:              self.procs,
            estimated_duration: self.estimated_duration,
            actual_duration:    self.actual_duration,
        }
    }

    /// Moves the job along its lifecycle, refusing anything that is not
    /// a step forward.
    pub fn transition(&mut self, to: JobState) -> Result<(), SimError> {
        use JobState::*;
        let legal = matches!(
            (self.state, to),
            (Arrived, Queued) | (Queued, Running) | (Running, Completed) | (Queued, Killed) | (Running, Killed)
        );
        if !legal {
            return Err(SimError::IllegalTransition {
                job:  self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;

        Ok(())
    }

    #[inline(always)]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, JobState::Completed | JobState::Killed)
    }

    /// The moment the policy expects the job to be done, if it runs.
    #[inline(always)]
    pub fn estimated_completion(&self) -> Option<SimTime> {
        self.start_time.map(|s| s.saturating_add(self.estimated_duration))
    }

    /// Time spent in the queue, once the job has started.
    #[inline(always)]
    pub fn wait_time(&self) -> Option<SimTime> {
        self.start_time.map(|s| s - self.arrival_time)
    }

    /// Arrival to departure, once the job has left the system.
    #[inline(always)]
    pub fn turnaround(&self) -> Option<SimTime> {
        self.end_time.map(|e| e - self.arrival_time)
    }

    pub fn alloc_handle(&self) -> Option<AllocHandle> {
        self.alloc
    }
}

/// Validates a list of trace records against the machine that is going
/// to run them. A successfully returned list is guaranteed to be
/// compliant with the simulator's assumptions:
/// - no job requests zero processors (such jobs are dropped with a warning)
/// - no job requests more processors than the machine has
/// - no two jobs share an id
///
/// This function is the gatekeeper to the rest of the library.
pub fn init(in_elts: Vec<JobSpec>, machine: &Machine) -> Result<Vec<JobSpec>, ConfigError> {
    let available = machine.total_procs();
    let mut seen = BTreeSet::new();
    let mut res = Vec::with_capacity(in_elts.len());
    for j in in_elts {
        if j.procs == 0 {
            warn!(job = j.id, "job requests 0 processors; ignoring it");
            continue;
        }
        if j.procs as u64 > available {
            return Err(ConfigError::JobTooLarge {
                job:    j.id,
                procs:  j.procs,
                available,
            });
        }
        if !seen.insert(j.id) {
            return Err(ConfigError::DuplicateJob(j.id));
        }
        res.push(j);
    }

    Ok(res)
}
