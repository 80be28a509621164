mod common;

use common::*;
use schedcore::{config::SimConfig, snapshot::SimSnapshot, *};

fn loaded(placement: Placement, easy: bool) -> Simulation {
    let mut sim = Simulation::new(mesh(4, 4), allocator(placement), policy(easy))
        .with_retry_interval(Some(7));
    let jobs = [
        (1, 0, 6, 30), (2, 0, 8, 12), (3, 2, 4, 40), (4, 5, 16, 10),
        (5, 5, 2, 3), (6, 9, 3, 25), (7, 20, 9, 8), (8, 21, 1, 50),
    ];
    for (id, arrival, procs, duration) in jobs {
        sim.submit(spec(id, arrival, procs, duration)).unwrap();
    }
    sim.kill_at(8, 60).unwrap();
    sim
}

#[test]
fn resumed_run_matches_uninterrupted_one() {
    for (placement, easy) in [(Placement::FreeList, false), (Placement::Nearest, true), (Placement::Random(4), true)] {
        let mut plain = loaded(placement, easy);
        plain.run().unwrap();

        let mut observed = loaded(placement, easy);
        observed.snapshot_at(5).unwrap();
        observed.snapshot_at(21).unwrap();
        observed.run().unwrap();
        // Watching must not change anything.
        assert_eq!(schedule_of(&plain), schedule_of(&observed));
        assert_eq!(plain.stats(), observed.stats());
        assert_eq!(observed.snapshots().len(), 2);

        for snap in observed.snapshots() {
            let json = snap.to_json().unwrap();
            let back = SimSnapshot::from_json(&json).unwrap();
            let mut resumed = Simulation::restore(mesh(4, 4), allocator(placement), policy(easy), back).unwrap();
            assert_eq!(resumed.now(), snap.time);
            // Job 2 leaves at 12 whatever the placement.
            assert_eq!(snap.finished.contains_key(&2), snap.time >= 12);
            for id in snap.finished.keys() {
                assert_eq!(resumed.allocation(*id), plain.allocation(*id));
            }
            resumed.run().unwrap();
            assert_eq!(schedule_of(&plain), schedule_of(&resumed), "{placement:?} from t={}", snap.time);
            assert_eq!(plain.stats(), resumed.stats());
        }
    }
}

#[test]
fn snapshot_contents() {
    let mut sim = flat_fcfs(4);
    sim.submit(spec(1, 0, 2, 10)).unwrap();
    sim.submit(spec(2, 0, 3, 5)).unwrap();
    sim.submit(spec(3, 10, 2, 5)).unwrap();
    sim.snapshot_at(4).unwrap();
    sim.run().unwrap();

    let snap = &sim.snapshots()[0];
    assert_eq!(snap.time, 4);
    assert_eq!(snap.free, vec![false, false, true, true]);
    assert_eq!(snap.queued, vec![2]);
    assert_eq!(snap.running.keys().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(snap.backed_off.iter().copied().collect::<Vec<_>>(), vec![2]);
    // Arrival of job 3 plus completion and walltime of job 1.
    assert_eq!(snap.pending.len(), 3);
}

#[test]
fn restore_through_config_and_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = SimConfig { nodes: 4, snapshot_at: vec![4], ..Default::default() };
    let mut sim = Simulation::from_config(&cfg).unwrap();
    sim.submit(spec(1, 0, 2, 10)).unwrap();
    sim.submit(spec(2, 0, 3, 5)).unwrap();
    sim.run().unwrap();

    let path = dir.path().join("snap.json");
    sim.snapshots()[0].write_to(&path).unwrap();
    let mut resumed = Simulation::from_snapshot(&cfg, SimSnapshot::read_from(&path).unwrap()).unwrap();
    resumed.run().unwrap();
    assert_eq!(resumed.job(2).unwrap().start_time, Some(10));
    assert_eq!(schedule_of(&sim), schedule_of(&resumed));
}

#[test]
fn inconsistent_snapshots_are_refused() {
    let mut sim = flat_fcfs(4);
    sim.submit(spec(1, 0, 2, 10)).unwrap();
    sim.snapshot_at(1).unwrap();
    sim.run().unwrap();
    let snap = sim.snapshots()[0].clone();

    let mut short = snap.clone();
    short.free.pop();
    let mut lying = snap.clone();
    lying.free = vec![true; 4];
    let mut orphan = snap.clone();
    orphan.running.clear();
    let mut twice = snap.clone();
    twice.finished = twice.running.clone();

    for bad in [short, lying, orphan, twice] {
        let res = Simulation::restore(
            Machine::new(Topology::Flat { nodes: 4 }, 1).unwrap(),
            allocator(Placement::FreeList),
            policy(false),
            bad,
        );
        assert!(matches!(res, Err(ConfigError::Snapshot(_))));
    }
}
