mod common;

use common::*;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use schedcore::*;

fn workload(seed: u64, n: u64, max_procs: u32) -> Vec<JobSpec> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut arrival = 0;
    (1..=n)
        .map(|id| {
            // Bursts of simultaneous arrivals exercise the tie-breaks.
            if rng.gen_bool(0.4) { arrival += rng.gen_range(1..15); }
            let actual = rng.gen_range(1..40);
            JobSpec {
                id,
                arrival,
                procs:              rng.gen_range(1..=max_procs),
                estimated_duration: actual + rng.gen_range(0..20),
                actual_duration:    actual,
            }
        })
        .collect()
}

fn replay(specs: &[JobSpec], placement: Placement, easy: bool) -> (Vec<(JobId, Option<SimTime>, Option<Vec<NodeId>>)>, Statistics) {
    let mut sim = Simulation::new(mesh(6, 6), allocator(placement), policy(easy));
    for s in specs {
        sim.submit(s.clone()).unwrap();
    }
    sim.run().unwrap();

    (schedule_of(&sim), sim.stats().clone())
}

#[test]
fn identical_runs_agree() {
    let specs = workload(3, 60, 20);
    for placement in [Placement::FreeList, Placement::Nearest, Placement::Random(17)] {
        for easy in [false, true] {
            let a = replay(&specs, placement, easy);
            let b = replay(&specs, placement, easy);
            assert_eq!(a, b, "{placement:?} easy={easy}");
        }
    }
}

#[test]
fn submission_order_does_not_matter() {
    let specs = workload(11, 50, 12);
    let mut shuffled = specs.clone();
    shuffled.shuffle(&mut StdRng::seed_from_u64(5));
    for easy in [false, true] {
        let a = replay(&specs, Placement::Random(2), easy);
        let b = replay(&shuffled, Placement::Random(2), easy);
        assert_eq!(a.0, b.0, "easy={easy}");
    }
}

#[test]
fn replicas_run_in_parallel() {
    use rayon::prelude::*;

    let specs = workload(8, 40, 16);
    let sequential: Vec<_> = [false, true].iter().map(|e| replay(&specs, Placement::Nearest, *e)).collect();
    let parallel: Vec<_> = vec![false, true].par_iter().map(|e| replay(&specs, Placement::Nearest, *e)).collect();
    assert_eq!(sequential, parallel);
}
