use crate::helpe::*;

/// On-disk form of a pending event. Each kind has its own record so the
/// checkpoint format does not move with [EventKind].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventRecord {
    Arrival {
        time:     SimTime,
        seq:      u64,
        id:       JobId,
        procs:    u32,
        estimate: SimTime,
        actual:   SimTime,
    },
    Start {
        time:   SimTime,
        seq:    u64,
        job:    JobId,
    },
    Completion {
        time:   SimTime,
        seq:    u64,
        job:    JobId,
    },
    Kill {
        time:   SimTime,
        seq:    u64,
        job:    JobId,
    },
    Timeout {
        time:   SimTime,
        seq:    u64,
        job:    JobId,
    },
    Retry {
        time:   SimTime,
        seq:    u64,
    },
    Snapshot {
        time:   SimTime,
        seq:    u64,
    },
}

fn encode_arrival(time: SimTime, seq: u64, spec: &JobSpec) -> EventRecord {
    debug_assert_eq!(time, spec.arrival);
    EventRecord::Arrival {
        time,
        seq,
        id:         spec.id,
        procs:      spec.procs,
        estimate:   spec.estimated_duration,
        actual:     spec.actual_duration,
    }
}

fn decode_arrival(time: SimTime, id: JobId, procs: u32, estimate: SimTime, actual: SimTime) -> EventKind {
    EventKind::Arrival(JobSpec {
        id,
        arrival:            time,
        procs,
        estimated_duration: estimate,
        actual_duration:    actual,
    })
}

impl EventRecord {
    pub fn encode(e: &Event) -> Self {
        let (time, seq) = (e.time, e.seq);
        match &e.kind {
            EventKind::Arrival(spec)    => encode_arrival(time, seq, spec),
            EventKind::Start(job)       => EventRecord::Start { time, seq, job: *job },
            EventKind::Completion(job)  => EventRecord::Completion { time, seq, job: *job },
            EventKind::Kill(job)        => EventRecord::Kill { time, seq, job: *job },
            EventKind::Timeout(job)     => EventRecord::Timeout { time, seq, job: *job },
            EventKind::Retry            => EventRecord::Retry { time, seq },
            EventKind::Snapshot         => EventRecord::Snapshot { time, seq },
        }
    }

    pub fn decode(&self) -> Event {
        let (time, seq, kind) = match *self {
            EventRecord::Arrival { time, seq, id, procs, estimate, actual }
                                                    => (time, seq, decode_arrival(time, id, procs, estimate, actual)),
            EventRecord::Start { time, seq, job }       => (time, seq, EventKind::Start(job)),
            EventRecord::Completion { time, seq, job }  => (time, seq, EventKind::Completion(job)),
            EventRecord::Kill { time, seq, job }        => (time, seq, EventKind::Kill(job)),
            EventRecord::Timeout { time, seq, job }     => (time, seq, EventKind::Timeout(job)),
            EventRecord::Retry { time, seq }            => (time, seq, EventKind::Retry),
            EventRecord::Snapshot { time, seq }         => (time, seq, EventKind::Snapshot),
        };

        Event { time, seq, kind, canceled: false }
    }

    pub fn seq(&self) -> u64 {
        match self {
            EventRecord::Arrival { seq, .. }    |
            EventRecord::Start { seq, .. }      |
            EventRecord::Completion { seq, .. } |
            EventRecord::Kill { seq, .. }       |
            EventRecord::Timeout { seq, .. }    |
            EventRecord::Retry { seq, .. }      |
            EventRecord::Snapshot { seq, .. }   => *seq,
        }
    }
}

/// Immutable capture of a whole simulation at one instant.
///
/// Holds enough to resume: restoring it into a fresh [Simulation] built
/// with the same machine and strategies yields the very same schedule as
/// never having stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub time:               SimTime,
    pub next_seq:           u64,
    pub free:               Vec<bool>,
    /// Wait queue, oldest first.
    pub queued:             Vec<JobId>,
    pub running:            BTreeMap<JobId, AllocInfo>,
    /// Allocations of jobs that already left the machine.
    pub finished:           BTreeMap<JobId, AllocInfo>,
    pub jobs:               Vec<Job>,
    pub backed_off:         BTreeSet<JobId>,
    pub decision_pending:   bool,
    pub retry_interval:     Option<SimTime>,
    pub pending_retry:      Option<u64>,
    pub timeouts:           BTreeMap<JobId, u64>,
    pub fst:                Option<FstMode>,
    /// Fair start times of jobs that have not left yet.
    pub fair_starts:        BTreeMap<JobId, SimTime>,
    pub pending:            Vec<EventRecord>,
    /// Sequence numbers of every cancelable event issued so far.
    pub cancelable:         BTreeSet<u64>,
    pub stats:              Statistics,
}

impl SimSnapshot {
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), SimError> {
        std::fs::write(path, self.to_json()?).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn read_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Pending events back in their in-memory form.
    pub fn events(&self) -> Vec<Event> {
        self.pending.iter().map(EventRecord::decode).collect()
    }
}
