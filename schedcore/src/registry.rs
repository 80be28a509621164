use crate::helpe::*;

/// Index into the allocation arena of a [JobRegistry].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllocHandle(usize);

#[derive(Debug, Clone)]
struct AllocSlot {
    info:   AllocInfo,
    live:   bool,
}

/// The authoritative `job id -> Job` map and the arrival-ordered wait
/// queue.
///
/// Allocations live in an arena owned here. A job only holds an
/// [AllocHandle]; the slot outlives the job's run so that the placement
/// remains inspectable, and a `live` flag guards against releasing it
/// twice.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs:       IndexMap<JobId, Job>,
    wait_queue: VecDeque<JobId>,
    arena:      Vec<AllocSlot>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut(&mut self, id: JobId) -> Result<&mut Job, SimError> {
        self.jobs.get_mut(&id).ok_or(SimError::UnknownJob(id))
    }

    /// A job enters the system and goes straight to the back of the queue.
    pub fn arrive(&mut self, spec: &JobSpec, cores_per_node: u32) -> Result<&Job, SimError> {
        if self.jobs.contains_key(&spec.id) {
            return Err(ConfigError::DuplicateJob(spec.id).into());
        }
        let mut job = Job::new(spec, cores_per_node);
        job.transition(JobState::Queued)?;
        self.wait_queue.push_back(job.id);
        let (idx, _) = self.jobs.insert_full(job.id, job);

        Ok(&self.jobs[idx])
    }

    /// Hands `alloc` to a queued job. Its queue slot is given up.
    pub fn start(&mut self, id: JobId, alloc: AllocInfo, now: SimTime) -> Result<(), SimError> {
        debug_assert_eq!(alloc.job_id, id);
        let handle = AllocHandle(self.arena.len());
        let job = self.get_mut(id)?;
        job.transition(JobState::Running)?;
        job.start_time = Some(now);
        job.alloc = Some(handle);
        self.arena.push(AllocSlot { info: alloc, live: true });
        self.wait_queue.retain(|j| *j != id);

        Ok(())
    }

    /// Ends a running job and gives back its allocation, which the caller
    /// must return to the machine. Fails if there is no live allocation.
    pub fn finish(&mut self, id: JobId, now: SimTime, outcome: Outcome) -> Result<AllocInfo, SimError> {
        let job = self.jobs.get(&id).ok_or(SimError::UnknownJob(id))?;
        let slot = match job.alloc {
            Some(AllocHandle(h)) if self.arena[h].live  => h,
            _                                           => return Err(SimError::DoubleRelease { job: id }),
        };
        let to = match outcome {
            Outcome::Completed  => JobState::Completed,
            Outcome::Killed     => JobState::Killed,
        };
        let job = self.get_mut(id)?;
        job.transition(to)?;
        job.end_time = Some(now);
        self.arena[slot].live = false;

        Ok(self.arena[slot].info.clone())
    }

    /// Removes a job that never ran.
    pub fn kill_queued(&mut self, id: JobId, now: SimTime) -> Result<(), SimError> {
        let job = self.get_mut(id)?;
        job.transition(JobState::Killed)?;
        job.end_time = Some(now);
        self.wait_queue.retain(|j| *j != id);

        Ok(())
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Every job seen so far, in arrival order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// The allocation a job holds or held last.
    pub fn allocation(&self, id: JobId) -> Option<&AllocInfo> {
        let AllocHandle(h) = self.jobs.get(&id)?.alloc?;
        self.arena.get(h).map(|s| &s.info)
    }

    /// The allocation a job holds right now.
    pub fn live_allocation(&self, id: JobId) -> Option<&AllocInfo> {
        let AllocHandle(h) = self.jobs.get(&id)?.alloc?;
        self.arena.get(h).filter(|s| s.live).map(|s| &s.info)
    }

    /// Waiting jobs, oldest first.
    pub fn queued(&self) -> Vec<&Job> {
        self.wait_queue.iter().filter_map(|id| self.jobs.get(id)).collect()
    }

    pub fn queued_ids(&self) -> Vec<JobId> {
        self.wait_queue.iter().copied().collect()
    }

    pub fn queue_len(&self) -> usize {
        self.wait_queue.len()
    }

    /// Running jobs, in arrival order.
    pub fn running(&self) -> Vec<&Job> {
        self.jobs.values().filter(|j| j.state == JobState::Running).collect()
    }

    /// Nodes held by all running jobs together.
    pub fn busy_nodes(&self) -> usize {
        self.running().iter()
            .filter_map(|j| self.live_allocation(j.id))
            .map(AllocInfo::size)
            .sum()
    }

    /// Allocations held by jobs that have since completed or been killed.
    pub fn finished_allocations(&self) -> BTreeMap<JobId, AllocInfo> {
        self.jobs.values()
            .filter(|j| j.is_finished())
            .filter_map(|j| self.allocation(j.id).map(|a| (j.id, a.clone())))
            .collect()
    }

    /// Rebuilds a registry from captured jobs, wait queue, live
    /// allocations and the allocations of departed jobs.
    pub(crate) fn restore(
        jobs:       Vec<Job>,
        queue:      Vec<JobId>,
        running:    &BTreeMap<JobId, AllocInfo>,
        finished:   &BTreeMap<JobId, AllocInfo>,
    ) -> Result<Self, ConfigError> {
        if finished.keys().any(|id| running.contains_key(id)) {
            return Err(ConfigError::Snapshot(String::from("a job is both running and departed")));
        }
        let mut res = Self::default();
        for mut job in jobs {
            job.alloc = None;
            if let Some(info) = running.get(&job.id) {
                if job.state != JobState::Running || info.job_id != job.id {
                    return Err(ConfigError::Snapshot(format!("allocation recorded for job {} which is not running", job.id)));
                }
                job.alloc = Some(AllocHandle(res.arena.len()));
                res.arena.push(AllocSlot { info: info.clone(), live: true });
            } else if job.state == JobState::Running {
                return Err(ConfigError::Snapshot(format!("running job {} has no allocation", job.id)));
            } else if let Some(info) = finished.get(&job.id) {
                if !job.is_finished() || job.start_time.is_none() || info.job_id != job.id {
                    return Err(ConfigError::Snapshot(format!("job {} never left the machine", job.id)));
                }
                job.alloc = Some(AllocHandle(res.arena.len()));
                res.arena.push(AllocSlot { info: info.clone(), live: false });
            }
            if res.jobs.insert(job.id, job).is_some() {
                return Err(ConfigError::Snapshot(String::from("a job appears twice")));
            }
        }
        if running.keys().chain(finished.keys()).any(|id| !res.jobs.contains_key(id)) {
            return Err(ConfigError::Snapshot(String::from("allocation for an unknown job")));
        }
        for id in queue {
            match res.jobs.get(&id) {
                Some(j) if j.state == JobState::Queued  => res.wait_queue.push_back(id),
                _                                       => return Err(ConfigError::Snapshot(format!("job {id} is queued but not waiting"))),
            }
        }
        if res.jobs.values().filter(|j| j.state == JobState::Queued).count() != res.wait_queue.len() {
            return Err(ConfigError::Snapshot(String::from("wait queue does not match queued jobs")));
        }

        Ok(res)
    }
}
