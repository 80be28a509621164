#![allow(dead_code)]

use schedcore::{
    alloc::{FreeListAllocator, NearestAllocator, RandomAllocator},
    policy::{EasyPolicy, PriorityQueuePolicy},
    *,
};

pub fn spec(id: JobId, arrival: SimTime, procs: u32, duration: SimTime) -> JobSpec {
    JobSpec { id, arrival, procs, estimated_duration: duration, actual_duration: duration }
}

pub fn flat_fcfs(nodes: usize) -> Simulation {
    Simulation::new(
        Machine::new(Topology::Flat { nodes }, 1).unwrap(),
        Box::new(FreeListAllocator::new()),
        Box::new(PriorityQueuePolicy::fcfs()),
    )
}

#[derive(Debug, Clone, Copy)]
pub enum Placement {
    FreeList,
    Nearest,
    Random(u64),
}

pub fn allocator(s: Placement) -> Box<dyn Allocator> {
    match s {
        Placement::FreeList  => Box::new(FreeListAllocator::new()),
        Placement::Nearest   => Box::new(NearestAllocator::new()),
        Placement::Random(x) => Box::new(RandomAllocator::new(x)),
    }
}

pub fn policy(easy: bool) -> Box<dyn SchedulerPolicy> {
    if easy {
        Box::new(EasyPolicy::new(JobComparator::Fifo))
    } else {
        Box::new(PriorityQueuePolicy::fcfs())
    }
}

pub fn mesh(x: usize, y: usize) -> Machine {
    Machine::new(Topology::Mesh { dims: [x, y, 1] }, 1).unwrap()
}

/// Start time and nodes of every job, by id.
pub fn schedule_of(sim: &Simulation) -> Vec<(JobId, Option<SimTime>, Option<Vec<NodeId>>)> {
    sim.jobs()
        .map(|j| (j.id, j.start_time, sim.allocation(j.id).map(|a| a.nodes.clone())))
        .sorted_by_key(|(id, _, _)| *id)
        .collect()
}
