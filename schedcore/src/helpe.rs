pub use std::{
    collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    cmp::Ordering,
    fmt,
};
pub use thiserror::Error;
pub use itertools::Itertools;
pub use indexmap::IndexMap;
pub use clap::{Parser, ValueEnum};
pub use serde::{Deserialize, Serialize};
pub use tracing::{debug, error, info, trace, warn};

pub use crate::{Job, JobSpec, JobState, Simulation,
    alloc::{AllocInfo, Allocator},
    error::{ConfigError, SimError},
    event::{Event, EventId, EventKind, EventQueue},
    fst::FstMode,
    machine::{Machine, Route, Topology},
    policy::{JobComparator, SchedulerPolicy},
    registry::{AllocHandle, JobRegistry},
    stats::{JobRecord, Outcome, Statistics, Summary},
    snapshot::SimSnapshot,
};

/// The unit of simulated time. The simulator attaches no meaning to it
/// (seconds in most traces), it only relies on it being totally ordered.
pub type SimTime = u64;

/// Index of a machine node, in `0..node_count`.
pub type NodeId = usize;

/// Unique job identifier, taken from the trace.
pub type JobId = u64;

/// Defines the interface for reading job traces.
///
/// One type per on-disk format. The user can implement their own as long
/// as it yields [JobSpec]s; validation against the machine happens later,
/// in [crate::job::init].
pub trait JobGen<T> {
    fn new(path: PathBuf) -> Self;
    /// Either the full list of records is returned, or the first
    /// malformed line is reported.
    fn read_jobs(&self) -> Result<Vec<JobSpec>, ConfigError>;
    /// Turns one decoded record into a [JobSpec].
    fn gen_single(&self, d: T, id: JobId) -> JobSpec;
}

//---START EXTERNAL INTERFACES

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceFormat {
    /// Whitespace separated `arrival procs runtime [estimate]`
    #[default]
    Standard,
    /// Comma separated `jobIndex, duration, procs`, everything arrives at 0
    Triple,
}

/// The classic scheduler trace: one job per line,
/// `arrival procs runtime [estimate]`.
///
/// A missing or non-positive estimate becomes twice the runtime. Ids are
/// handed out in file order, starting at 1.
pub struct StandardTraceParser {
    pub path: PathBuf,
}

impl JobGen<&[i64; 4]> for StandardTraceParser {
    fn new(path: PathBuf) -> Self {
        Self {
            path
        }
    }

    fn read_jobs(&self) -> Result<Vec<JobSpec>, ConfigError> {
        let mut res = vec![];
        let mut next_id = 1;
        for (lineno, line) in read_lines(&self.path)?.into_iter().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue; }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 || fields.len() > 4 {
                return Err(self.bad_line(lineno, format!("expected 3 or 4 fields, found {}", fields.len())));
            }
            let mut data_buf: [i64; 4] = [0; 4];
            for (idx, f) in fields.iter().enumerate() {
                data_buf[idx] = f.parse::<i64>()
                    .map_err(|_| self.bad_line(lineno, format!("`{f}` is not an integer")))?;
            }
            if data_buf[0] < 0 || data_buf[2] < 0 {
                return Err(self.bad_line(lineno, String::from("negative arrival or runtime")));
            }
            res.push(self.gen_single(&data_buf, next_id));
            next_id += 1;
        }

        Ok(res)
    }

    fn gen_single(&self, d: &[i64; 4], id: JobId) -> JobSpec {
        let runtime = d[2] as SimTime;
        let estimate = if d[3] <= 0 { runtime.saturating_mul(2) } else { d[3] as SimTime };
        JobSpec {
            id,
            arrival:            d[0] as SimTime,
            procs:              d[1].max(0) as u32,
            estimated_duration: estimate,
            actual_duration:    runtime,
        }
    }
}

impl StandardTraceParser {
    fn bad_line(&self, lineno: usize, message: String) -> ConfigError {
        ConfigError::Trace {
            path: self.path.display().to_string(),
            line: lineno + 1,
            message,
        }
    }
}

/// The `jobIndex, duration, procs` triple produced by live job feeds.
///
/// Every job arrives at time zero and runs for exactly its duration.
/// [write_triple] turns a record back into the very same line.
pub struct TripleTraceParser {
    pub path: PathBuf,
}

impl JobGen<&[u64; 3]> for TripleTraceParser {
    fn new(path: PathBuf) -> Self {
        Self {
            path
        }
    }

    fn read_jobs(&self) -> Result<Vec<JobSpec>, ConfigError> {
        let mut res = vec![];
        let mut data_buf: [u64; 3] = [0; 3];
        for (lineno, line) in read_lines(&self.path)?.into_iter().enumerate() {
            let line = line.trim();
            // Header lines and blanks carry no digits at all.
            if line.is_empty() || line.starts_with('#') || !line.chars().any(|c| c.is_ascii_digit()) {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 3 {
                return Err(ConfigError::Trace {
                    path: self.path.display().to_string(),
                    line: lineno + 1,
                    message: format!("expected `jobIndex, duration, procs`, found {} field(s)", fields.len()),
                });
            }
            for (idx, f) in fields.iter().enumerate() {
                data_buf[idx] = f.parse::<u64>().map_err(|_| ConfigError::Trace {
                    path: self.path.display().to_string(),
                    line: lineno + 1,
                    message: format!("`{f}` is not a non-negative integer"),
                })?;
            }
            res.push(self.gen_single(&data_buf, data_buf[0]));
        }

        Ok(res)
    }

    fn gen_single(&self, d: &[u64; 3], id: JobId) -> JobSpec {
        JobSpec {
            id,
            arrival:            0,
            procs:              d[2].min(u32::MAX as u64) as u32,
            estimated_duration: d[1],
            actual_duration:    d[1],
        }
    }
}

/// Renders a job the way [StandardTraceParser] reads it.
pub fn write_standard(spec: &JobSpec) -> String {
    format!("{} {} {} {}", spec.arrival, spec.procs, spec.actual_duration, spec.estimated_duration)
}

/// Renders a job the way [TripleTraceParser] reads it.
pub fn write_triple(spec: &JobSpec) -> String {
    format!("{}, {}, {}", spec.id, spec.actual_duration, spec.procs)
}

fn read_lines(path: &Path) -> Result<Vec<String>, ConfigError> {
    let io_err = |source| ConfigError::Io { path: path.display().to_string(), source };
    let fd = std::fs::File::open(path).map_err(io_err)?;
    BufReader::new(fd)
        .lines()
        .collect::<Result<Vec<String>, _>>()
        .map_err(io_err)
}

//---END EXTERNAL INTERFACES

/// Reads a trace of the given format. No validation against any machine
/// happens here.
pub fn read_from_path<T, B>(file_path: PathBuf) -> Result<Vec<JobSpec>, ConfigError>
where T: JobGen<B> {
    let parser = T::new(file_path);
    parser.read_jobs()
}

/// Dispatches on [TraceFormat].
pub fn read_trace(file_path: PathBuf, format: TraceFormat) -> Result<Vec<JobSpec>, ConfigError> {
    match format {
        TraceFormat::Standard   => read_from_path::<StandardTraceParser, &[i64; 4]>(file_path),
        TraceFormat::Triple     => read_from_path::<TripleTraceParser, &[u64; 3]>(file_path),
    }
}
