use anyhow::{bail, Context};
use rayon::prelude::*;
use schedcore::{config::SimConfig, stats::LogKind, *};
use tracing_subscriber::EnvFilter;

/// Discrete-event simulator for batch job scheduling
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file; flags below override its fields
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    config:         Option<PathBuf>,

    /// Path to job trace
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:          Option<PathBuf>,

    /// Trace format
    #[arg(short, long, value_enum)]
    format:         Option<TraceFormat>,

    /// Number of machine nodes
    #[arg(short, long)]
    #[arg(value_parser = clap::value_parser!(usize))]
    nodes:          Option<usize>,

    /// Cores per node
    #[arg(long)]
    #[arg(value_parser = clap::value_parser!(u32))]
    cores:          Option<u32>,

    /// Machine: simple, mesh[x,y(,z)] or torus[x,y(,z)]
    #[arg(short, long)]
    machine:        Option<String>,

    /// Allocator(s); one replica runs per allocator/scheduler pair
    #[arg(short, long)]
    allocator:      Vec<String>,

    /// Scheduler(s): fcfs, pqueue[cmp], easy[cmp]
    #[arg(short, long)]
    scheduler:      Vec<String>,

    /// Retry refused allocations after this many time units
    #[arg(short, long)]
    #[arg(value_parser = clap::value_parser!(SimTime))]
    retry:          Option<SimTime>,

    /// Take a snapshot at these times
    #[arg(long, value_delimiter = ',')]
    snapshot_at:    Vec<SimTime>,

    /// Resume from a snapshot file instead of starting from scratch
    #[arg(long, value_parser = clap::value_parser!(PathBuf))]
    resume:         Option<PathBuf>,

    /// Where to write logs and snapshots
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    output_dir:     Option<PathBuf>,

    /// Logs to write
    #[arg(short, long, value_enum, value_delimiter = ',')]
    logs:           Vec<LogKind>,

    /// Track fair start times
    #[arg(long, value_enum)]
    fst:            Option<FstMode>,

    /// Default log level, unless RUST_LOG says otherwise
    #[arg(long, default_value = "info")]
    log_level:      String,
}

impl Args {
    fn base_config(&self) -> anyhow::Result<SimConfig> {
        let mut res = match &self.config {
            Some(path)  => SimConfig::from_json_file(path)?,
            None        => SimConfig::default(),
        };
        if let Some(t) = &self.input        { res.trace = Some(t.clone()); }
        if let Some(f) = self.format        { res.trace_format = f; }
        if let Some(n) = self.nodes         { res.nodes = n; }
        if let Some(c) = self.cores         { res.cores_per_node = c; }
        if let Some(m) = &self.machine      { res.machine = m.clone(); }
        if let Some(r) = self.retry         { res.retry_interval = Some(r); }
        if let Some(o) = &self.output_dir   { res.output_dir = Some(o.clone()); }
        if !self.snapshot_at.is_empty()     { res.snapshot_at = self.snapshot_at.clone(); }
        if !self.logs.is_empty()            { res.logs = self.logs.clone(); }
        if let Some(m) = self.fst           { res.fst = Some(m); }

        Ok(res)
    }

    /// One configuration per allocator/scheduler pair.
    fn replicas(&self) -> anyhow::Result<Vec<SimConfig>> {
        let base = self.base_config()?;
        let allocators = if self.allocator.is_empty() { vec![base.allocator.clone()] } else { self.allocator.clone() };
        let schedulers = if self.scheduler.is_empty() { vec![base.scheduler.clone()] } else { self.scheduler.clone() };

        Ok(allocators.iter()
            .cartesian_product(schedulers.iter())
            .map(|(a, s)| SimConfig {
                allocator: a.clone(),
                scheduler: s.clone(),
                ..base.clone()
            })
            .collect())
    }
}

fn file_safe(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

struct Report {
    label:      String,
    setup:      String,
    summary:    Summary,
}

fn finish(sim: &mut Simulation, cfg: &SimConfig, base: &str) -> anyhow::Result<Summary> {
    let summary = sim.run()?;
    if let Some(dir) = &cfg.output_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        for path in sim.write_logs(dir, base, &cfg.logs)? {
            info!(path = %path.display(), "log written");
        }
        for snap in sim.snapshots() {
            let path = dir.join(format!("{base}.snapshot.{}.json", snap.time));
            snap.write_to(&path)?;
            info!(path = %path.display(), "snapshot written");
        }
    }

    Ok(summary)
}

fn run_replica(cfg: SimConfig, base: String) -> anyhow::Result<Report> {
    let mut sim = Simulation::from_config(&cfg)
        .with_context(|| format!("setting up {} / {}", cfg.allocator, cfg.scheduler))?;
    let setup = sim.setup_info();
    let summary = finish(&mut sim, &cfg, &base)?;

    Ok(Report {
        label: format!("{} / {}", cfg.allocator, cfg.scheduler),
        setup,
        summary,
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let replicas = cli.replicas()?;
    let trace_base = replicas[0].trace_base();

    let reports: Vec<Report> = if let Some(path) = &cli.resume {
        if replicas.len() != 1 {
            bail!("--resume takes exactly one allocator and one scheduler");
        }
        let cfg = &replicas[0];
        let snapshot = SimSnapshot::read_from(path)?;
        let mut sim = Simulation::from_snapshot(cfg, snapshot)?;
        let setup = sim.setup_info();
        let summary = finish(&mut sim, cfg, &format!("{trace_base}.resumed"))?;
        vec![Report { label: format!("{} / {} (resumed)", cfg.allocator, cfg.scheduler), setup, summary }]
    } else {
        let many = replicas.len() > 1;
        // Every replica owns its whole world; nothing crosses threads.
        replicas.into_par_iter()
            .map(|cfg| {
                let base = if many {
                    format!("{trace_base}.{}.{}", file_safe(&cfg.allocator), file_safe(&cfg.scheduler))
                } else {
                    trace_base.clone()
                };
                run_replica(cfg, base)
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    for r in reports {
        println!("==== {} ====", r.label);
        println!("{}", r.setup);
        println!("{}", r.summary);
    }

    Ok(())
}
