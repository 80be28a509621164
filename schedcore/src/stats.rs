use std::fs::File;

use crate::helpe::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Completed,
    Killed,
}

/// Everything worth knowing about one job once it has left the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id:                 JobId,
    pub arrival:                SimTime,
    /// `None` for jobs killed while still waiting.
    pub start:                  Option<SimTime>,
    pub end:                    SimTime,
    pub procs:                  u32,
    pub nodes:                  Vec<NodeId>,
    pub actual_duration:        SimTime,
    pub outcome:                Outcome,
    pub avg_distance:           f64,
    pub max_distance:           u64,
    pub baseline_avg_distance:  Option<f64>,
    /// When the job would have started had nobody arrived after it.
    pub fair_start:             Option<SimTime>,
}

impl JobRecord {
    #[inline(always)]
    pub fn run(&self) -> SimTime {
        self.start.map_or(0, |s| self.end - s)
    }

    #[inline(always)]
    pub fn wait(&self) -> SimTime {
        self.start.unwrap_or(self.end) - self.arrival
    }

    #[inline(always)]
    pub fn response(&self) -> SimTime {
        self.end - self.arrival
    }

    /// How much later than its fair start time the job started.
    pub fn unfairness(&self) -> Option<SimTime> {
        Some(self.start?.saturating_sub(self.fair_start?))
    }
}

/// Which log files to write. Names double as file extensions.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Per-job timing
    Time,
    /// Per-job placement quality
    Alloc,
    /// Busy nodes over time
    Util,
    /// Waiting jobs over time
    Wait,
}

impl LogKind {
    pub fn extension(&self) -> &'static str {
        match self {
            LogKind::Time   => "time",
            LogKind::Alloc  => "alloc",
            LogKind::Util   => "util",
            LogKind::Wait   => "wait",
        }
    }

    fn header(&self) -> &'static str {
        match self {
            LogKind::Time   => "# Job \tArrival\tStart\tEnd\tRun\tWait\tResp.\tProcs\n",
            LogKind::Alloc  => "# Job\tProcs\tActual Time\t Avg Pairwise L1 Distance\tMax Pairwise L1 Distance\n",
            LogKind::Util   => "# Time\tUtilization\n",
            LogKind::Wait   => "# Time\tWaiting Jobs\n",
        }
    }
}

/// Appends `(time, value)` unless nothing changed. Several changes at the
/// same instant collapse into the last one.
fn sample(series: &mut Vec<(SimTime, usize)>, time: SimTime, value: usize) {
    match series.last_mut() {
        Some(last) if last.0 == time    => last.1 = value,
        Some(last) if last.1 == value   => {},
        _                               => series.push((time, value)),
    }
}

/// Running tally of a simulation: one [JobRecord] per departed job plus
/// busy-node and waiting-job time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    records:    Vec<JobRecord>,
    util:       Vec<(SimTime, usize)>,
    waiting:    Vec<(SimTime, usize)>,
    busy_now:   usize,
    wait_now:   usize,
    dropped:    usize,
    node_count: usize,
    #[serde(default)]
    fair_start: bool,
}

/// Aggregates over a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub jobs_completed: usize,
    pub jobs_killed:    usize,
    pub jobs_dropped:   usize,
    pub mean_wait:      f64,
    pub max_wait:       SimTime,
    pub mean_response:  f64,
    pub makespan:       SimTime,
    /// Mean delay past the fair start time, when tracked.
    pub mean_unfairness: Option<f64>,
    /// Time-weighted share of busy nodes over `[0, makespan]`.
    pub utilization:    f64,
}

impl Statistics {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            ..Default::default()
        }
    }

    /// Adds the fair start time column to the time log.
    pub fn track_fair_starts(&mut self) {
        self.fair_start = true;
    }

    pub fn job_arrives(&mut self, time: SimTime) {
        self.wait_now += 1;
        sample(&mut self.waiting, time, self.wait_now);
    }

    pub fn job_starts(&mut self, time: SimTime, nodes: usize) {
        self.busy_now += nodes;
        self.wait_now = self.wait_now.saturating_sub(1);
        debug_assert!(self.busy_now <= self.node_count);
        sample(&mut self.util, time, self.busy_now);
        sample(&mut self.waiting, time, self.wait_now);
    }

    /// A job left the system, from the queue or from the machine.
    pub fn job_finishes(&mut self, record: JobRecord) {
        if record.start.is_some() {
            self.busy_now = self.busy_now.saturating_sub(record.nodes.len());
            sample(&mut self.util, record.end, self.busy_now);
        } else {
            self.wait_now = self.wait_now.saturating_sub(1);
            sample(&mut self.waiting, record.end, self.wait_now);
        }
        self.records.push(record);
    }

    /// A trace entry that never made it into the simulation.
    pub fn job_dropped(&mut self) {
        self.dropped += 1;
    }

    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    pub fn utilization_samples(&self) -> &[(SimTime, usize)] {
        &self.util
    }

    pub fn waiting_samples(&self) -> &[(SimTime, usize)] {
        &self.waiting
    }

    pub fn summary(&self) -> Summary {
        let started = self.records.iter().filter(|r| r.start.is_some()).collect_vec();
        let count = |o: Outcome| self.records.iter().filter(|r| r.outcome == o).count();
        let mean = |xs: &mut dyn Iterator<Item = SimTime>, n: usize| {
            if n == 0 { 0.0 } else { xs.sum::<SimTime>() as f64 / n as f64 }
        };
        let makespan = self.records.iter().map(|r| r.end).max().unwrap_or(0);
        let unfair = started.iter().filter_map(|r| r.unfairness()).collect_vec();

        Summary {
            jobs_completed: count(Outcome::Completed),
            jobs_killed:    count(Outcome::Killed),
            jobs_dropped:   self.dropped,
            mean_wait:      mean(&mut started.iter().map(|r| r.wait()), started.len()),
            max_wait:       started.iter().map(|r| r.wait()).max().unwrap_or(0),
            mean_response:  mean(&mut self.records.iter().map(|r| r.response()), self.records.len()),
            makespan,
            mean_unfairness: (self.fair_start && !unfair.is_empty())
                .then(|| mean(&mut unfair.iter().copied(), unfair.len())),
            utilization:    self.time_weighted_utilization(makespan),
        }
    }

    fn time_weighted_utilization(&self, until: SimTime) -> f64 {
        if until == 0 || self.node_count == 0 { return 0.0; }
        let mut area = 0u128;
        for (i, (t, busy)) in self.util.iter().enumerate() {
            let next = self.util.get(i + 1).map_or(until, |n| n.0).min(until);
            if next > *t {
                area += (next - t) as u128 * *busy as u128;
            }
        }

        area as f64 / (until as u128 * self.node_count as u128) as f64
    }

    /// Writes the chosen logs to `dir` as `<base>.<log>`, each starting with
    /// `header` (comment lines describing the run). Returns the paths
    /// written.
    pub fn write_logs(&self, dir: &Path, base: &str, logs: &[LogKind], header: &str) -> Result<Vec<PathBuf>, SimError> {
        let mut res = vec![];
        for log in logs.iter().unique() {
            let path = dir.join(format!("{base}.{}", log.extension()));
            let io_err = |source| SimError::Io { path: path.display().to_string(), source };
            let mut out = File::create(&path).map_err(io_err)?;
            let mut body = String::from(header);
            body.push('\n');
            if self.fair_start && *log == LogKind::Time {
                body.push_str("# Job \tArrival\tStart\tEnd\tRun\tWait\tResp.\tProcs\tFST\n");
            } else {
                body.push_str(log.header());
            }
            match log {
                LogKind::Time   => for r in &self.records {
                    body.push_str(&format!("{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                        r.job_id, r.arrival, r.start.unwrap_or(r.end), r.end, r.run(), r.wait(), r.response(), r.procs));
                    if self.fair_start {
                        body.push_str(&r.fair_start.map_or(String::from("\t-"), |f| format!("\t{f}")));
                    }
                    body.push('\n');
                },
                LogKind::Alloc  => for r in self.records.iter().filter(|r| r.start.is_some()) {
                    body.push_str(&format!("{}\t{}\t{}\t{:.6}\t{}\n",
                        r.job_id, r.procs, r.actual_duration, r.avg_distance, r.max_distance));
                },
                LogKind::Util   => for (t, v) in &self.util {
                    body.push_str(&format!("{t}\t{v}\n"));
                },
                LogKind::Wait   => for (t, v) in &self.waiting {
                    body.push_str(&format!("{t}\t{v}\n"));
                },
            }
            out.write_all(body.as_bytes()).map_err(io_err)?;
            debug!(path = %path.display(), "log written");
            res.push(path);
        }

        Ok(res)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Jobs completed:\t\t{}", self.jobs_completed)?;
        writeln!(f, "Jobs killed:\t\t{}", self.jobs_killed)?;
        writeln!(f, "Jobs dropped:\t\t{}", self.jobs_dropped)?;
        writeln!(f, "Mean wait:\t\t{:.2}", self.mean_wait)?;
        writeln!(f, "Max wait:\t\t{}", self.max_wait)?;
        writeln!(f, "Mean response:\t\t{:.2}", self.mean_response)?;
        writeln!(f, "Makespan:\t\t{}", self.makespan)?;
        if let Some(u) = self.mean_unfairness {
            writeln!(f, "Mean unfairness:\t{u:.2}")?;
        }
        write!(f, "Utilization:\t\t{:.2}%", self.utilization * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: JobId, arrival: SimTime, start: Option<SimTime>, end: SimTime, nodes: Vec<NodeId>) -> JobRecord {
        JobRecord {
            job_id: id,
            arrival,
            start,
            end,
            procs: nodes.len() as u32,
            actual_duration: end - start.unwrap_or(end),
            outcome: if start.is_some() { Outcome::Completed } else { Outcome::Killed },
            nodes,
            avg_distance: 1.0,
            max_distance: 1,
            baseline_avg_distance: None,
            fair_start: None,
        }
    }

    #[test]
    fn samples_collapse_per_instant() {
        let mut s = Statistics::new(4);
        s.job_arrives(0);
        s.job_arrives(0);
        s.job_starts(0, 2);
        s.job_finishes(record(1, 0, Some(0), 10, vec![0, 1]));
        s.job_starts(10, 3);
        assert_eq!(s.waiting_samples(), &[(0, 1), (10, 0)]);
        assert_eq!(s.utilization_samples(), &[(0, 2), (10, 3)]);
    }

    #[test]
    fn summary_figures() {
        let mut s = Statistics::new(4);
        s.job_arrives(0);
        s.job_arrives(0);
        s.job_starts(0, 2);
        s.job_finishes(record(1, 0, Some(0), 10, vec![0, 1]));
        s.job_starts(10, 4);
        s.job_finishes(record(2, 0, Some(10), 20, vec![0, 1, 2, 3]));
        s.job_dropped();
        let sum = s.summary();
        assert_eq!(sum.jobs_completed, 2);
        assert_eq!(sum.jobs_dropped, 1);
        assert_eq!(sum.max_wait, 10);
        assert_eq!(sum.mean_wait, 5.0);
        assert_eq!(sum.mean_response, 15.0);
        assert_eq!(sum.makespan, 20);
        // (2 * 10 + 4 * 10) / (4 * 20)
        assert!((sum.utilization - 0.75).abs() < 1e-9);
    }

    #[test]
    fn logs_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Statistics::new(2);
        s.job_arrives(1);
        s.job_starts(3, 1);
        s.job_finishes(record(7, 1, Some(3), 8, vec![1]));
        let written = s.write_logs(dir.path(), "trace", &[LogKind::Time, LogKind::Util], "# run").unwrap();
        assert_eq!(written.len(), 2);
        let time = std::fs::read_to_string(dir.path().join("trace.time")).unwrap();
        assert!(time.contains("# Job \tArrival"));
        assert!(time.ends_with("7\t1\t3\t8\t5\t2\t7\t1\n"));
        let util = std::fs::read_to_string(dir.path().join("trace.util")).unwrap();
        assert!(util.ends_with("3\t1\n8\t0\n"));
    }

    #[test]
    fn fair_start_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Statistics::new(2);
        s.track_fair_starts();
        s.job_arrives(1);
        s.job_starts(3, 1);
        s.job_finishes(JobRecord { fair_start: Some(1), ..record(7, 1, Some(3), 8, vec![1]) });
        s.write_logs(dir.path(), "trace", &[LogKind::Time], "# run").unwrap();
        let time = std::fs::read_to_string(dir.path().join("trace.time")).unwrap();
        assert!(time.contains("Procs\tFST\n"));
        assert!(time.ends_with("7\t1\t3\t8\t5\t2\t7\t1\t1\n"));
        assert_eq!(s.summary().mean_unfairness, Some(2.0));
    }
}
