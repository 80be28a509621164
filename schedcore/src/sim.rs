use crate::{
    helpe::*,
    config::SimConfig,
    fst::{fair_start_time, Occupant},
    policy::{Decision, RunningView},
    snapshot::EventRecord,
    stats::LogKind,
};

impl Simulation {
    pub fn new(machine: Machine, allocator: Box<dyn Allocator>, policy: Box<dyn SchedulerPolicy>) -> Self {
        let node_count = machine.node_count();
        Self {
            machine,
            allocator,
            policy,
            queue:              EventQueue::new(),
            registry:           JobRegistry::new(),
            stats:              Statistics::new(node_count),
            backed_off:         BTreeSet::new(),
            decision_pending:   false,
            retry_interval:     None,
            pending_retry:      None,
            timeouts:           BTreeMap::new(),
            fst:                None,
            fair_starts:        BTreeMap::new(),
            known_ids:          BTreeSet::new(),
            snapshots:          vec![],
            dispatched:         0,
        }
    }

    /// Reopen a decision point `interval` after every refused allocation.
    pub fn with_retry_interval(mut self, interval: Option<SimTime>) -> Self {
        self.retry_interval = interval.filter(|i| *i > 0);
        self
    }

    /// Record a fair start time for every arriving job.
    pub fn with_fair_start(mut self, mode: Option<FstMode>) -> Self {
        self.fst = mode;
        if mode.is_some() {
            self.stats.track_fair_starts();
        }
        self
    }

    /// Builds a replica from its configuration and feeds it the configured
    /// trace, if any.
    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        let machine = config.build_machine()?;
        let allocator = config.build_allocator(&machine)?;
        let policy = config.build_policy()?;
        let mut res = Self::new(machine, allocator, policy)
            .with_retry_interval(config.retry_interval)
            .with_fair_start(config.fst);
        if let Some(path) = &config.trace {
            let raw = read_trace(path.clone(), config.trace_format)?;
            let read = raw.len();
            let specs = crate::init(raw, &res.machine)?;
            for _ in specs.len()..read {
                res.stats.job_dropped();
            }
            info!(trace = %path.display(), jobs = specs.len(), "trace loaded");
            for s in specs {
                res.submit(s)?;
            }
        }
        for t in &config.snapshot_at {
            res.snapshot_at(*t)?;
        }

        Ok(res)
    }

    /// Resumes a captured run with strategies built from `config`.
    pub fn from_snapshot(config: &SimConfig, snapshot: SimSnapshot) -> Result<Self, SimError> {
        let machine = config.build_machine()?;
        let allocator = config.build_allocator(&machine)?;
        let policy = config.build_policy()?;

        Ok(Self::restore(machine, allocator, policy, snapshot)?)
    }

    //---START EXTERNAL INTERFACES

    /// Injects a job arrival at `spec.arrival`.
    pub fn submit(&mut self, spec: JobSpec) -> Result<EventId, SimError> {
        if spec.procs == 0 {
            return Err(ConfigError::EmptyJob(spec.id).into());
        }
        if spec.procs as u64 > self.machine.total_procs() {
            return Err(ConfigError::JobTooLarge {
                job:        spec.id,
                procs:      spec.procs,
                available:  self.machine.total_procs(),
            }.into());
        }
        if self.known_ids.contains(&spec.id) {
            return Err(ConfigError::DuplicateJob(spec.id).into());
        }
        let id = self.queue.schedule(spec.arrival, EventKind::Arrival(spec.clone()))?;
        self.known_ids.insert(spec.id);

        Ok(id)
    }

    /// Kills `job` at `time`, whether it is waiting or running by then.
    pub fn kill_at(&mut self, job: JobId, time: SimTime) -> Result<EventId, SimError> {
        if !self.known_ids.contains(&job) {
            return Err(SimError::UnknownJob(job));
        }
        self.queue.schedule(time, EventKind::Kill(job))
    }

    /// Captures the whole state at `time`. Results show up in
    /// [Simulation::snapshots].
    pub fn snapshot_at(&mut self, time: SimTime) -> Result<EventId, SimError> {
        self.queue.schedule(time, EventKind::Snapshot)
    }

    /// Runs until nothing is left to do.
    ///
    /// Draining the event queue while jobs still wait is a deadlock: no
    /// future event could ever free nodes for them.
    pub fn run(&mut self) -> Result<Summary, SimError> {
        while self.advance()? {}
        if self.registry.queue_len() > 0 {
            let waiting = self.registry.queued_ids();
            error!(time = self.now(), ?waiting, "event queue drained with jobs still waiting");
            return Err(SimError::Deadlock { time: self.now(), waiting });
        }
        info!(time = self.now(), events = self.dispatched, "simulation finished");

        Ok(self.stats.summary())
    }

    /// Dispatches every event up to and including `until`.
    pub fn run_until(&mut self, until: SimTime) -> Result<(), SimError> {
        loop {
            if self.decision_due() {
                self.decide()?;
                continue;
            }
            match self.queue.peek_time() {
                Some(t) if t <= until   => { self.advance()?; },
                _                       => break,
            }
        }

        Ok(())
    }

    /// Executes one step: the pending scheduling pass if the current
    /// instant is over, then the next event. Returns `false` once there is
    /// nothing left.
    pub fn advance(&mut self) -> Result<bool, SimError> {
        if self.decision_due() {
            self.decide()?;
        }
        match self.queue.pop() {
            Some(e) => {
                self.dispatch(e)?;
                Ok(true)
            },
            None    => Ok(false),
        }
    }

    //---END EXTERNAL INTERFACES

    //---START VIEWS

    #[inline(always)]
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.registry.job(id)
    }

    /// The nodes a job holds, or held last.
    pub fn allocation(&self, id: JobId) -> Option<&AllocInfo> {
        self.registry.allocation(id)
    }

    pub fn queued_jobs(&self) -> Vec<&Job> {
        self.registry.queued()
    }

    pub fn running_jobs(&self) -> Vec<&Job> {
        self.registry.running()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.registry.jobs()
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn snapshots(&self) -> &[SimSnapshot] {
        &self.snapshots
    }

    pub fn pending_events(&self) -> Vec<&Event> {
        self.queue.pending()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn setup_info(&self) -> String {
        format!(
            "# [Machine] \n# {}\n# [Scheduler] \n# {}\n# [Allocator] \n# {}",
            self.machine.setup_info(),
            self.policy.setup_info(),
            self.allocator.setup_info(),
        )
    }

    /// Busy nodes plus free nodes add up to the machine, and no node is
    /// held by two running jobs.
    pub fn conservation_holds(&self) -> bool {
        let mut held = BTreeSet::new();
        for j in self.registry.running() {
            let Some(info) = self.registry.live_allocation(j.id) else { return false; };
            for n in &info.nodes {
                if !held.insert(*n) || self.machine.is_free(*n) { return false; }
            }
        }

        held.len() + self.machine.num_free() == self.machine.node_count()
    }

    /// Immutable copy of everything needed to resume from here.
    pub fn take_snapshot(&self) -> SimSnapshot {
        let running = self.registry.running().iter()
            .filter_map(|j| self.registry.live_allocation(j.id).map(|a| (j.id, a.clone())))
            .collect();

        SimSnapshot {
            time:               self.now(),
            next_seq:           self.queue.next_seq(),
            free:               self.machine.free_bitmap().to_vec(),
            queued:             self.registry.queued_ids(),
            running,
            finished:           self.registry.finished_allocations(),
            jobs:               self.registry.jobs().cloned().collect(),
            backed_off:         self.backed_off.clone(),
            decision_pending:   self.decision_pending,
            retry_interval:     self.retry_interval,
            pending_retry:      self.pending_retry.map(|e| e.0),
            timeouts:           self.timeouts.iter().map(|(j, e)| (*j, e.0)).collect(),
            fst:                self.fst,
            fair_starts:        self.fair_starts.clone(),
            pending:            self.queue.pending().into_iter().map(EventRecord::encode).collect(),
            cancelable:         self.queue.cancelable().clone(),
            stats:              self.stats.clone(),
        }
    }

    /// Writes the requested logs for this run.
    pub fn write_logs(&self, dir: &Path, base: &str, logs: &[LogKind]) -> Result<Vec<PathBuf>, SimError> {
        let header = format!("# Simulation for trace {base}\n{}", self.setup_info());
        self.stats.write_logs(dir, base, logs, &header)
    }

    //---END VIEWS

    /// Rebuilds a simulation from a snapshot. The machine and strategies
    /// must be the ones the snapshot was taken with.
    pub fn restore(
        mut machine:    Machine,
        allocator:      Box<dyn Allocator>,
        policy:         Box<dyn SchedulerPolicy>,
        snapshot:       SimSnapshot,
    ) -> Result<Self, ConfigError> {
        machine.restore_bitmap(&snapshot.free)?;
        let mut held = BTreeSet::new();
        for info in snapshot.running.values() {
            for n in &info.nodes {
                if machine.is_free(*n) || !held.insert(*n) {
                    return Err(ConfigError::Snapshot(format!(
                        "node {n} of job {} disagrees with the free bitmap", info.job_id
                    )));
                }
            }
        }
        if held.len() + machine.num_free() != machine.node_count() {
            return Err(ConfigError::Snapshot(String::from("busy nodes held by no running job")));
        }

        let events = snapshot.events();
        let mut known_ids: BTreeSet<JobId> = snapshot.jobs.iter().map(|j| j.id).collect();
        known_ids.extend(events.iter().filter_map(|e| match &e.kind {
            EventKind::Arrival(spec)    => Some(spec.id),
            _                           => None,
        }));
        let registry = JobRegistry::restore(snapshot.jobs, snapshot.queued, &snapshot.running, &snapshot.finished)?;
        let queue = EventQueue::restore(snapshot.time, snapshot.next_seq, events, snapshot.cancelable)?;
        info!(time = snapshot.time, pending = queue.len(), "simulation restored");

        Ok(Self {
            machine,
            allocator,
            policy,
            queue,
            registry,
            stats:              snapshot.stats,
            backed_off:         snapshot.backed_off,
            decision_pending:   snapshot.decision_pending,
            retry_interval:     snapshot.retry_interval,
            pending_retry:      snapshot.pending_retry.map(EventId),
            timeouts:           snapshot.timeouts.into_iter().map(|(j, e)| (j, EventId(e))).collect(),
            fst:                snapshot.fst,
            fair_starts:        snapshot.fair_starts,
            known_ids,
            snapshots:          vec![],
            dispatched:         0,
        })
    }

    /// A scheduling pass is due once every event of the current instant
    /// has been dispatched.
    fn decision_due(&mut self) -> bool {
        self.decision_pending && self.queue.peek_time() != Some(self.queue.now())
    }

    /// Offers jobs to the allocator until the policy has nothing more to
    /// suggest.
    fn decide(&mut self) -> Result<(), SimError> {
        self.decision_pending = false;
        let now = self.now();
        loop {
            let next = {
                let running = self.registry.running().into_iter()
                    .map(|j| RunningView {
                        job:            j.id,
                        nodes:          self.registry.live_allocation(j.id).map_or(0, AllocInfo::size),
                        est_completion: j.estimated_completion().unwrap_or(now),
                    })
                    .collect();
                let d = Decision {
                    now,
                    queue:          self.registry.queued(),
                    running,
                    free_nodes:     self.machine.num_free(),
                    total_nodes:    self.machine.node_count(),
                    backed_off:     &self.backed_off,
                };
                self.policy.select_next(&d)
            };
            let Some(id) = next else { break; };
            if self.backed_off.contains(&id) {
                warn!(job = id, "policy offered a backed-off job; ending pass");
                break;
            }

            let job = self.registry.job(id).ok_or(SimError::UnknownJob(id))?;
            if job.state != JobState::Queued {
                return Err(SimError::IllegalTransition { job: id, from: job.state, to: JobState::Running });
            }
            match self.allocator.allocate(&mut self.machine, job) {
                Some(info) => {
                    debug!(time = now, job = id, nodes = ?info.nodes, "allocated");
                    self.registry.start(id, info, now)?;
                    self.queue.schedule(now, EventKind::Start(id))?;
                },
                None        => {
                    debug!(time = now, job = id, wanted = job.requested_nodes, free = self.machine.num_free(), "allocation refused, backing off");
                    self.backed_off.insert(id);
                    self.arm_retry()?;
                },
            }
        }

        Ok(())
    }

    fn arm_retry(&mut self) -> Result<(), SimError> {
        if let (Some(interval), None) = (self.retry_interval, self.pending_retry) {
            let at = self.after(interval)?;
            self.pending_retry = Some(self.queue.schedule(at, EventKind::Retry)?);
        }

        Ok(())
    }

    fn after(&self, delay: SimTime) -> Result<SimTime, SimError> {
        let now = self.now();
        now.checked_add(delay).ok_or(SimError::TimeOverflow { now, delay })
    }

    fn dispatch(&mut self, e: Event) -> Result<(), SimError> {
        let now = e.time;
        self.dispatched += 1;
        match e.kind {
            EventKind::Arrival(spec)    => {
                let job = self.registry.arrive(&spec, self.machine.cores_per_node())?;
                info!(time = now, job = job.id, procs = job.procs, nodes = job.requested_nodes, "job arrives");
                let id = job.id;
                if let Some(mode) = self.fst {
                    match self.fair_start(id, mode) {
                        Some(t) => { self.fair_starts.insert(id, t); },
                        None    => warn!(time = now, job = id, "no fair start time found"),
                    }
                }
                self.stats.job_arrives(now);
                self.decision_pending = true;
            },
            EventKind::Start(id)        => {
                let job = self.registry.job(id).ok_or(SimError::UnknownJob(id))?;
                if job.state != JobState::Running {
                    debug!(time = now, job = id, "stale start");
                    return Ok(());
                }
                let (actual, estimate) = (job.actual_duration, job.estimated_duration);
                let nodes = self.registry.live_allocation(id).map_or(0, AllocInfo::size);
                info!(time = now, job = id, nodes = ?self.registry.live_allocation(id).map(|a| &a.nodes), "job starts");
                let (done_at, timeout_at) = (self.after(actual)?, self.after(estimate)?);
                self.queue.schedule(done_at, EventKind::Completion(id))?;
                let timeout = self.queue.schedule(timeout_at, EventKind::Timeout(id))?;
                self.timeouts.insert(id, timeout);
                self.stats.job_starts(now, nodes);
            },
            EventKind::Completion(id)   => {
                match self.registry.job(id).map(|j| j.state) {
                    Some(JobState::Running) => {
                        info!(time = now, job = id, "job completes");
                        self.finish(id, Outcome::Completed)?;
                    },
                    Some(_)                 => debug!(time = now, job = id, "stale completion"),
                    None                    => return Err(SimError::UnknownJob(id)),
                }
            },
            EventKind::Kill(id)         => {
                match self.registry.job(id).map(|j| j.state) {
                    Some(JobState::Running) => {
                        info!(time = now, job = id, "running job killed");
                        self.finish(id, Outcome::Killed)?;
                    },
                    Some(JobState::Queued)  => {
                        info!(time = now, job = id, "waiting job killed");
                        self.registry.kill_queued(id, now)?;
                        self.backed_off.remove(&id);
                        // Whoever queued behind it may fit now.
                        self.decision_pending = true;
                        let record = self.record(id, None)?;
                        self.stats.job_finishes(record);
                        self.fair_starts.remove(&id);
                    },
                    // Not arrived yet, or already gone.
                    _                       => debug!(time = now, job = id, "kill has no effect"),
                }
            },
            EventKind::Timeout(id)      => {
                self.timeouts.remove(&id);
                if self.registry.job(id).is_some_and(|j| j.state == JobState::Running) {
                    warn!(time = now, job = id, "walltime exceeded, killing job");
                    self.finish(id, Outcome::Killed)?;
                }
            },
            EventKind::Retry            => {
                debug!(time = now, backed_off = self.backed_off.len(), "retry timer fired");
                self.pending_retry = None;
                self.backed_off.clear();
                self.decision_pending = true;
            },
            EventKind::Snapshot         => {
                let snap = self.take_snapshot();
                info!(time = now, queued = snap.queued.len(), running = snap.running.len(), "snapshot taken");
                self.snapshots.push(snap);
            },
        }
        debug_assert!(self.conservation_holds(), "Node conservation broken at {now}!");

        Ok(())
    }

    /// Takes a running job off the machine.
    fn finish(&mut self, id: JobId, outcome: Outcome) -> Result<(), SimError> {
        let now = self.now();
        if let Some(t) = self.timeouts.remove(&id) {
            self.queue.cancel(t)?;
        }
        let info = self.registry.finish(id, now, outcome)?;
        self.machine.release(&info.nodes)?;
        let record = self.record(id, Some(info))?;
        self.stats.job_finishes(record);
        self.fair_starts.remove(&id);

        // The machine changed: everyone may try again.
        self.backed_off.clear();
        if let Some(r) = self.pending_retry.take() {
            self.queue.cancel(r)?;
        }
        self.decision_pending = true;

        Ok(())
    }

    fn record(&self, id: JobId, info: Option<AllocInfo>) -> Result<JobRecord, SimError> {
        let job = self.registry.job(id).ok_or(SimError::UnknownJob(id))?;
        let baseline = info.as_ref()
            .and_then(|_| self.allocator.baseline_allocation(&self.machine, job))
            .map(|b| b.avg_pairwise_distance);
        let outcome = if job.state == JobState::Completed { Outcome::Completed } else { Outcome::Killed };
        let (nodes, avg_distance, max_distance) = match info {
            Some(i) => (i.nodes, i.avg_pairwise_distance, i.max_pairwise_distance),
            None    => (vec![], 0.0, 0),
        };

        Ok(JobRecord {
            job_id:             id,
            arrival:            job.arrival_time,
            start:              job.start_time,
            end:                job.end_time.unwrap_or(self.now()),
            procs:              job.procs,
            nodes,
            actual_duration:    job.actual_duration,
            outcome,
            avg_distance,
            max_distance,
            baseline_avg_distance: baseline,
            fair_start:         self.fair_starts.get(&id).copied(),
        })
    }

    /// Replays the current state to find when `id` would start if nobody
    /// arrived after it.
    fn fair_start(&self, id: JobId, mode: FstMode) -> Option<SimTime> {
        let newcomer = self.registry.job(id)?;
        let waiting = self.registry.queued().into_iter().filter(|j| j.id != id).collect_vec();
        let occupants = self.registry.running().into_iter()
            .filter_map(|j| Some(Occupant {
                job:            j.id,
                nodes:          self.registry.live_allocation(j.id)?.size(),
                est_completion: j.estimated_completion()?,
                end:            j.start_time?.saturating_add(j.actual_duration.min(j.estimated_duration)),
            }))
            .collect_vec();

        fair_start_time(self.now(), newcomer, &waiting, &occupants, self.machine.node_count(), self.policy.as_ref(), mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::FreeListAllocator;
    use crate::policy::PriorityQueuePolicy;

    fn flat(nodes: usize) -> Simulation {
        Simulation::new(
            Machine::new(Topology::Flat { nodes }, 1).unwrap(),
            Box::new(FreeListAllocator::new()),
            Box::new(PriorityQueuePolicy::fcfs()),
        )
    }

    fn spec(id: JobId, arrival: SimTime, procs: u32, est: SimTime, actual: SimTime) -> JobSpec {
        JobSpec { id, arrival, procs, estimated_duration: est, actual_duration: actual }
    }

    #[test]
    fn submit_rejects_bad_jobs() {
        let mut sim = flat(4);
        assert!(matches!(sim.submit(spec(1, 0, 0, 1, 1)), Err(SimError::Config(ConfigError::EmptyJob(1)))));
        assert!(matches!(sim.submit(spec(1, 0, 5, 1, 1)), Err(SimError::Config(ConfigError::JobTooLarge { .. }))));
        sim.submit(spec(1, 0, 4, 1, 1)).unwrap();
        assert!(matches!(sim.submit(spec(1, 3, 1, 1, 1)), Err(SimError::Config(ConfigError::DuplicateJob(1)))));
        assert!(matches!(sim.kill_at(9, 3), Err(SimError::UnknownJob(9))));
    }

    #[test]
    fn walltime_kills_overrunning_jobs() {
        let mut sim = flat(2);
        sim.submit(spec(1, 0, 2, 5, 50)).unwrap();
        sim.submit(spec(2, 1, 2, 10, 10)).unwrap();
        let sum = sim.run().unwrap();
        assert_eq!(sim.job(1).unwrap().state, JobState::Killed);
        assert_eq!(sim.job(1).unwrap().end_time, Some(5));
        assert_eq!(sim.job(2).unwrap().start_time, Some(5));
        assert_eq!(sum.jobs_killed, 1);
        assert_eq!(sum.jobs_completed, 1);
        assert_eq!(sim.machine().num_free(), 2);
    }

    #[test]
    fn explicit_kills() {
        let mut sim = flat(2);
        sim.submit(spec(1, 0, 2, 100, 100)).unwrap();
        sim.submit(spec(2, 0, 1, 10, 10)).unwrap();
        sim.kill_at(2, 4).unwrap();
        sim.kill_at(1, 20).unwrap();
        sim.run().unwrap();
        let j2 = sim.job(2).unwrap();
        assert_eq!((j2.state, j2.start_time, j2.end_time), (JobState::Killed, None, Some(4)));
        assert_eq!(sim.job(1).unwrap().end_time, Some(20));
        assert!(sim.allocation(2).is_none());
        assert_eq!(sim.stats().records().len(), 2);
    }

    #[test]
    fn killing_the_blocked_head_lets_the_next_job_run() {
        let mut sim = flat(4);
        sim.submit(spec(1, 0, 3, 100, 100)).unwrap();
        sim.submit(spec(2, 0, 2, 10, 10)).unwrap();
        sim.submit(spec(3, 0, 1, 10, 10)).unwrap();
        sim.kill_at(2, 5).unwrap();
        sim.run().unwrap();
        assert_eq!(sim.job(2).unwrap().state, JobState::Killed);
        assert_eq!(sim.job(3).unwrap().start_time, Some(5));
    }

    #[test]
    fn walltime_past_the_end_of_time_is_an_error() {
        let mut sim = flat(2);
        sim.submit(spec(1, 1, 1, SimTime::MAX, 5)).unwrap();
        assert!(matches!(sim.run(), Err(SimError::TimeOverflow { now: 1, delay: SimTime::MAX })));
    }

    #[test]
    fn fair_start_times_are_recorded() {
        let mut sim = flat(4).with_fair_start(Some(FstMode::Strict));
        sim.submit(spec(1, 0, 3, 10, 10)).unwrap();
        sim.submit(spec(2, 0, 2, 5, 5)).unwrap();
        sim.submit(spec(3, 1, 1, 2, 2)).unwrap();
        let sum = sim.run().unwrap();
        let fair = sim.stats().records().iter()
            .map(|r| (r.job_id, r.fair_start))
            .sorted()
            .collect_vec();
        // Job 2 arrives while job 1 still waits, so it counts job 1 in.
        assert_eq!(fair, vec![(1, Some(0)), (2, Some(10)), (3, Some(10))]);
        assert_eq!(sum.mean_unfairness, Some(0.0));
    }

    #[test]
    fn retry_timer_reopens_decisions() {
        // The allocator only knows node 0, so a second job never fits
        // while the first runs, and the retry timer keeps polling.
        let mut sim = Simulation::new(
            Machine::new(Topology::Flat { nodes: 2 }, 1).unwrap(),
            Box::new(FreeListAllocator::with_order(vec![0])),
            Box::new(PriorityQueuePolicy::fcfs()),
        ).with_retry_interval(Some(3));
        sim.submit(spec(1, 0, 1, 10, 10)).unwrap();
        sim.submit(spec(2, 0, 1, 10, 10)).unwrap();
        sim.run().unwrap();
        assert_eq!(sim.job(2).unwrap().start_time, Some(10));
        // The completion at 10 cancels the pending retry.
        assert!(sim.pending_events().is_empty());
    }

    #[test]
    fn deadlock_is_reported() {
        let mut sim = Simulation::new(
            Machine::new(Topology::Flat { nodes: 2 }, 1).unwrap(),
            Box::new(FreeListAllocator::with_order(vec![])),
            Box::new(PriorityQueuePolicy::fcfs()),
        );
        sim.submit(spec(1, 2, 1, 10, 10)).unwrap();
        match sim.run() {
            Err(SimError::Deadlock { time, waiting }) => {
                assert_eq!(time, 2);
                assert_eq!(waiting, vec![1]);
            },
            other => panic!("unexpected {other:?}"),
        }
    }
}
