//! Welcome to `schedcore`!
//!
//! A discrete-event simulator for batch job scheduling on HPC machines.
//! Jobs arrive from a trace, wait in a queue, get placed on machine nodes
//! by an [`Allocator`] when a [`SchedulerPolicy`] picks them, run, and
//! leave. Everything happens inside one [`Simulation`], driven by its
//! [`EventQueue`].

mod job;
mod sim;

pub mod alloc;
pub mod config;
pub mod error;
pub mod event;
pub mod fst;
pub mod helpe;
pub mod machine;
pub mod policy;
pub mod registry;
pub mod snapshot;
pub mod stats;

pub use crate::helpe::*;
pub use crate::job::init;

/// What a trace says about a job, before it enters the simulation.
///
/// `estimated_duration` is the user's walltime request: policies plan
/// with it and the job is killed if it runs longer. `actual_duration` is
/// how long the job really runs once started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id:                 JobId,
    pub arrival:            SimTime,
    pub procs:              u32,
    pub estimated_duration: SimTime,
    pub actual_duration:    SimTime,
}

/// Lifecycle of a [Job]. Transitions only move forward:
///
/// `Arrived -> Queued -> Running -> Completed`
///
/// with `Killed` reachable from `Queued` and `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Arrived,
    Queued,
    Running,
    Completed,
    Killed,
}

/// Our fundamental unit of interest: a request for `requested_nodes`
/// machine nodes during `estimated_duration` time units.
///
/// A job owns at most one live allocation at a time. It does not hold the
/// [`AllocInfo`] itself but an [`AllocHandle`] into the arena of the
/// [`JobRegistry`], which stays valid no matter how the job ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id:                 JobId,
    pub arrival_time:       SimTime,
    pub procs:              u32,
    pub requested_nodes:    usize,
    pub estimated_duration: SimTime,
    pub actual_duration:    SimTime,
    pub state:              JobState,
    pub start_time:         Option<SimTime>,
    pub end_time:           Option<SimTime>,
    // Arena handles are not stable across restarts; the snapshot carries
    // the allocation itself instead.
    #[serde(skip)]
    pub(crate) alloc:       Option<AllocHandle>,
}

/// One self-contained simulation replica: a machine, the plug-in
/// strategies acting on it, the job registry and the event queue that
/// drives them all.
///
/// External code can only look at the state or inject new events; every
/// mutation happens inside event dispatch.
pub struct Simulation {
    machine:            Machine,
    allocator:          Box<dyn Allocator>,
    policy:             Box<dyn SchedulerPolicy>,
    queue:              EventQueue,
    registry:           JobRegistry,
    stats:              Statistics,
    // Jobs whose allocation was refused since the last machine change.
    backed_off:         BTreeSet<JobId>,
    decision_pending:   bool,
    retry_interval:     Option<SimTime>,
    pending_retry:      Option<EventId>,
    timeouts:           BTreeMap<JobId, EventId>,
    fst:                Option<FstMode>,
    // Fair start times of jobs still in the system.
    fair_starts:        BTreeMap<JobId, SimTime>,
    // Every id ever submitted, to reject duplicates up front.
    known_ids:          BTreeSet<JobId>,
    snapshots:          Vec<SimSnapshot>,
    dispatched:         u64,
}
