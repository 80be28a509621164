mod common;

use std::io::Write as _;

use common::*;
use schedcore::{config::SimConfig, stats::LogKind, *};

fn trace_file(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

#[test]
fn four_flat_nodes() {
    let mut sim = flat_fcfs(4);
    sim.submit(spec(1, 0, 2, 10)).unwrap();
    sim.submit(spec(2, 0, 3, 5)).unwrap();
    sim.submit(spec(3, 10, 2, 5)).unwrap();

    // Job 2 needs 3 nodes and only 2 are free until job 1 is done.
    sim.run_until(9).unwrap();
    assert_eq!(sim.job(1).unwrap().state, JobState::Running);
    assert_eq!(sim.queued_jobs().iter().map(|j| j.id).collect::<Vec<_>>(), vec![2]);
    assert_eq!(sim.machine().num_free(), 2);

    let summary = sim.run().unwrap();
    let starts: Vec<_> = (1..=3).map(|id| sim.job(id).unwrap().start_time).collect();
    assert_eq!(starts, vec![Some(0), Some(10), Some(15)]);
    assert_eq!(sim.allocation(1).unwrap().nodes, vec![0, 1]);
    assert_eq!(sim.allocation(2).unwrap().nodes, vec![0, 1, 2]);
    assert_eq!(summary.jobs_completed, 3);
    assert_eq!(summary.makespan, 20);
    assert_eq!(summary.max_wait, 10);
    assert_eq!(sim.machine().num_free(), 4);
}

#[test]
fn same_scenario_from_a_standard_trace() {
    let f = trace_file("# arrival procs runtime estimate\n0 2 10 10\n0 3 5 5\n10 2 5 5\n");
    let cfg = SimConfig { nodes: 4, trace: Some(f.path().to_path_buf()), ..Default::default() };
    let mut sim = Simulation::from_config(&cfg).unwrap();
    sim.run().unwrap();
    let starts: Vec<_> = sim.stats().records().iter().map(|r| (r.job_id, r.start)).collect();
    assert_eq!(starts, vec![(1, Some(0)), (2, Some(10)), (3, Some(15))]);
}

#[test]
fn triple_trace_runs_everything_from_zero() {
    let f = trace_file("jobIndex, duration, nodesRequested\n11, 10, 2\n12, 5, 3\n13, 0, 0\n");
    let cfg = SimConfig {
        nodes:          4,
        trace:          Some(f.path().to_path_buf()),
        trace_format:   TraceFormat::Triple,
        ..Default::default()
    };
    let mut sim = Simulation::from_config(&cfg).unwrap();
    let summary = sim.run().unwrap();
    assert_eq!(sim.job(11).unwrap().start_time, Some(0));
    assert_eq!(sim.job(12).unwrap().start_time, Some(10));
    // The zero-processor entry never enters the simulation.
    assert!(sim.job(13).is_none());
    assert_eq!(summary.jobs_dropped, 1);
}

#[test]
fn oversized_trace_is_rejected_up_front() {
    let f = trace_file("0 5 10\n");
    let cfg = SimConfig { nodes: 4, trace: Some(f.path().to_path_buf()), ..Default::default() };
    assert!(matches!(
        Simulation::from_config(&cfg),
        Err(SimError::Config(ConfigError::JobTooLarge { job: 1, procs: 5, available: 4 }))
    ));
}

#[test]
fn easy_backfills_short_jobs() {
    let build = |easy: bool| {
        let mut sim = Simulation::new(
            Machine::new(Topology::Flat { nodes: 4 }, 1).unwrap(),
            allocator(Placement::FreeList),
            policy(easy),
        );
        sim.submit(spec(1, 0, 3, 10)).unwrap();
        sim.submit(spec(2, 0, 4, 5)).unwrap();
        sim.submit(spec(3, 0, 1, 5)).unwrap();
        sim.submit(spec(4, 0, 1, 20)).unwrap();
        sim.run().unwrap();
        (1..=4).map(|id| sim.job(id).unwrap().start_time.unwrap()).collect::<Vec<_>>()
    };

    assert_eq!(build(false), vec![0, 10, 15, 15]);
    // Job 3 slips in before job 2's reservation; job 4 would delay it.
    assert_eq!(build(true), vec![0, 10, 0, 15]);
}

#[test]
fn nearest_packs_on_a_mesh() {
    let mut sim = Simulation::new(mesh(4, 4), allocator(Placement::Nearest), policy(false));
    sim.submit(spec(1, 0, 4, 10)).unwrap();
    sim.run().unwrap();
    let info = sim.allocation(1).unwrap();
    assert_eq!(info.nodes, vec![1, 0, 2, 5]);
    assert_eq!(info.max_pairwise_distance, 2);
    let rec = &sim.stats().records()[0];
    assert!(rec.baseline_avg_distance.is_some());

    let mut flat = flat_fcfs(4);
    flat.submit(spec(1, 0, 2, 1)).unwrap();
    flat.run().unwrap();
    assert_eq!(flat.stats().records()[0].baseline_avg_distance, None);
}

#[test]
fn logs_follow_the_trace_name() {
    let f = trace_file("0 1 4\n2 2 3\n");
    let dir = tempfile::tempdir().unwrap();
    let cfg = SimConfig {
        nodes:      2,
        trace:      Some(f.path().to_path_buf()),
        output_dir: Some(dir.path().to_path_buf()),
        logs:       vec![LogKind::Time, LogKind::Alloc, LogKind::Util, LogKind::Wait],
        ..Default::default()
    };
    let mut sim = Simulation::from_config(&cfg).unwrap();
    sim.run().unwrap();
    let written = sim.write_logs(dir.path(), &cfg.trace_base(), &cfg.logs).unwrap();
    assert_eq!(written.len(), 4);

    let time = std::fs::read_to_string(dir.path().join(format!("{}.time", cfg.trace_base()))).unwrap();
    assert!(time.starts_with("# Simulation for trace"));
    assert!(time.contains("# [Allocator] \n# Simple Allocator"));
    // Job 2 needs both nodes and waits for job 1 to end at 4.
    assert!(time.contains("1\t0\t0\t4\t4\t0\t4\t1\n"));
    assert!(time.contains("2\t2\t4\t7\t3\t2\t5\t2\n"));
}
