//! Fair start times.
//!
//! The fair start time (FST) of a job is when it would have started had
//! no job arrived after it. It is found by replaying, on a flat copy of
//! the machine and with the same policy, everything already in the system
//! at arrival time, using actual durations.

use crate::{
    helpe::*,
    policy::{Decision, RunningView},
};

/// How a newcomer competes with the jobs already waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FstMode {
    /// Enters the replayed queue right away, next to everyone waiting.
    #[default]
    Strict,
    /// Enters only once every earlier waiting job has started.
    Relaxed,
}

/// A job holding nodes when the replay begins. `end` is when it really
/// leaves: its actual completion, or its walltime kill if earlier.
#[derive(Debug, Clone, Copy)]
pub struct Occupant {
    pub job:            JobId,
    pub nodes:          usize,
    pub est_completion: SimTime,
    pub end:            SimTime,
}

/// Replays the system from `now` until `newcomer` starts. `waiting` must
/// not contain `newcomer`. Returns `None` if it never would.
pub fn fair_start_time(
    now:        SimTime,
    newcomer:   &Job,
    waiting:    &[&Job],
    occupants:  &[Occupant],
    node_count: usize,
    policy:     &dyn SchedulerPolicy,
    mode:       FstMode,
) -> Option<SimTime> {
    let no_backoff = BTreeSet::new();
    let mut queue: Vec<Job> = waiting.iter().map(|j| (*j).clone()).collect();
    let mut admitted = mode == FstMode::Strict;
    if admitted {
        queue.push(newcomer.clone());
    }
    let mut running = occupants.to_vec();
    let mut free = node_count.checked_sub(running.iter().map(|o| o.nodes).sum())?;
    let mut time = now;

    loop {
        //---START SCHEDULING PASS---
        loop {
            if !admitted && queue.is_empty() {
                queue.push(newcomer.clone());
                admitted = true;
            }
            let next = {
                let d = Decision {
                    now:            time,
                    queue:          queue.iter().collect(),
                    running:        running.iter()
                        .map(|o| RunningView { job: o.job, nodes: o.nodes, est_completion: o.est_completion })
                        .collect(),
                    free_nodes:     free,
                    total_nodes:    node_count,
                    backed_off:     &no_backoff,
                };
                policy.select_next(&d)
            };
            let Some(id) = next else { break; };
            let Some(pos) = queue.iter().position(|j| j.id == id) else { break; };
            if queue[pos].requested_nodes > free { break; }
            if id == newcomer.id {
                return Some(time);
            }

            let job = queue.remove(pos);
            free -= job.requested_nodes;
            running.push(Occupant {
                job:            job.id,
                nodes:          job.requested_nodes,
                est_completion: time.saturating_add(job.estimated_duration),
                end:            time.saturating_add(job.actual_duration.min(job.estimated_duration)),
            });
        }
        //---END SCHEDULING PASS---

        // Everything ending at the same instant leaves before the next pass.
        let next_end = running.iter().map(|o| o.end).min()?;
        time = next_end.max(time);
        running.retain(|o| {
            if o.end == next_end { free += o.nodes; }
            o.end != next_end
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{EasyPolicy, PriorityQueuePolicy};

    fn job(id: JobId, arrival: SimTime, nodes: u32, duration: SimTime) -> Job {
        Job::new(&JobSpec { id, arrival, procs: nodes, estimated_duration: duration, actual_duration: duration }, 1)
    }

    fn occupant(job: JobId, nodes: usize, end: SimTime) -> Occupant {
        Occupant { job, nodes, est_completion: end, end }
    }

    #[test]
    fn idle_machine_starts_at_arrival() {
        let j = job(1, 3, 2, 10);
        let fcfs = PriorityQueuePolicy::fcfs();
        assert_eq!(fair_start_time(3, &j, &[], &[], 4, &fcfs, FstMode::Strict), Some(3));
    }

    #[test]
    fn waits_behind_earlier_jobs() {
        // 4 nodes: job 1 holds 3 until 10, job 2 (2 nodes) waits and runs
        // 10..15, so job 3 (4 nodes) cannot start before 15.
        let fcfs = PriorityQueuePolicy::fcfs();
        let waiting = job(2, 0, 2, 5);
        let newcomer = job(3, 1, 4, 5);
        let occ = [occupant(1, 3, 10)];
        assert_eq!(fair_start_time(1, &newcomer, &[&waiting], &occ, 4, &fcfs, FstMode::Strict), Some(15));
    }

    #[test]
    fn relaxed_lets_everyone_waiting_go_first() {
        // With EASY, a 1-node newcomer backfills at once in strict mode, but
        // in relaxed mode it only joins after the 4-node job started at 10.
        let easy = EasyPolicy::new(JobComparator::Fifo);
        let waiting = job(2, 0, 4, 5);
        let newcomer = job(3, 1, 1, 2);
        let occ = [occupant(1, 3, 10)];
        assert_eq!(fair_start_time(1, &newcomer, &[&waiting], &occ, 4, &easy, FstMode::Strict), Some(1));
        assert_eq!(fair_start_time(1, &newcomer, &[&waiting], &occ, 4, &easy, FstMode::Relaxed), Some(15));
    }
}
