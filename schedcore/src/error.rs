use crate::helpe::*;

/// Problems detected before the simulation is allowed to start:
/// malformed machine descriptions, unknown component names, broken
/// traces and inconsistent snapshots. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("bad machine description: {0}")]
    Machine(String),
    #[error("unknown {kind} `{name}`")]
    UnknownComponent {
        kind: &'static str,
        name: String,
    },
    #[error("bad parameters for {component}: {message}")]
    Params {
        component: String,
        message: String,
    },
    #[error("{path}:{line}: {message}")]
    Trace {
        path: String,
        line: usize,
        message: String,
    },
    #[error("job {job} requests {procs} processors but the machine has {available}")]
    JobTooLarge {
        job: JobId,
        procs: u32,
        available: u64,
    },
    #[error("job {0} requests no processors")]
    EmptyJob(JobId),
    #[error("job id {0} appears more than once")]
    DuplicateJob(JobId),
    #[error("bad curve file {path}: {message}")]
    Curve {
        path: String,
        message: String,
    },
    #[error("inconsistent snapshot: {0}")]
    Snapshot(String),
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Everything that can stop a running simulation.
///
/// Allocation failures are deliberately absent: a job that does not fit
/// simply stays queued. The variants past [`SimError::Config`] are broken
/// invariants and leave the simulation in an unusable state.
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("event {event:?} is not cancelable")]
    IllegalCancel {
        event: EventId,
    },
    #[error("cannot schedule an event at {at}, clock is already at {now}")]
    ScheduleInPast {
        at:  SimTime,
        now: SimTime,
    },
    #[error("time {now} plus {delay} does not fit the clock")]
    TimeOverflow {
        now:   SimTime,
        delay: SimTime,
    },
    #[error("job {job} has no live allocation to release")]
    DoubleRelease {
        job: JobId,
    },
    #[error("node {node} released while already free")]
    NodeAlreadyFree {
        node: NodeId,
    },
    #[error("job {job} cannot move from {from:?} to {to:?}")]
    IllegalTransition {
        job:  JobId,
        from: JobState,
        to:   JobState,
    },
    #[error("unknown job {0}")]
    UnknownJob(JobId),
    #[error("deadlock at time {time}: event queue drained with {} job(s) still waiting ({waiting:?})", waiting.len())]
    Deadlock {
        time:    SimTime,
        waiting: Vec<JobId>,
    },
    #[error("i/o failure on {path}: {source}")]
    Io {
        path:   String,
        source: std::io::Error,
    },
    #[error("snapshot encoding failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SimError {
    /// Returns `true` for contract violations, i.e., errors that mean the
    /// core itself (or a plug-in policy) broke an invariant.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SimError::IllegalCancel { .. }
                | SimError::DoubleRelease { .. }
                | SimError::NodeAlreadyFree { .. }
                | SimError::IllegalTransition { .. }
                | SimError::ScheduleInPast { .. }
        )
    }
}
