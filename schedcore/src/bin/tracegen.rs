use std::fs::File;

use anyhow::{ensure, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use schedcore::*;

/// Synthetic job trace generator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Where to write the trace
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    output:         PathBuf,

    /// Output format
    #[arg(value_enum)]
    format:         TraceFormat,

    /// Number of jobs
    #[arg(short, long, default_value_t = 100)]
    #[arg(value_parser = clap::value_parser!(u64))]
    jobs:           u64,

    /// Largest processor request
    #[arg(short = 'p', long, default_value_t = 16)]
    #[arg(value_parser = clap::value_parser!(u32))]
    max_procs:      u32,

    /// Longest runtime
    #[arg(short = 'r', long, default_value_t = 1000)]
    #[arg(value_parser = clap::value_parser!(SimTime))]
    max_runtime:    SimTime,

    /// Mean time between arrivals (standard format only)
    #[arg(short = 'a', long, default_value_t = 50)]
    #[arg(value_parser = clap::value_parser!(SimTime))]
    interarrival:   SimTime,

    /// RNG seed
    #[arg(short, long, default_value_t = 0)]
    #[arg(value_parser = clap::value_parser!(u64))]
    seed:           u64,
}

fn generate(cli: &Args) -> Vec<JobSpec> {
    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut arrival = 0;
    (1..=cli.jobs)
        .map(|id| {
            let runtime = rng.gen_range(1..=cli.max_runtime);
            let procs = rng.gen_range(1..=cli.max_procs);
            let spec = match cli.format {
                TraceFormat::Standard   => {
                    // Users overestimate, by up to 3x.
                    let estimate = (runtime as f64 * rng.gen_range(1.0..3.0)).ceil() as SimTime;
                    JobSpec { id, arrival, procs, estimated_duration: estimate, actual_duration: runtime }
                },
                TraceFormat::Triple     => JobSpec { id, arrival: 0, procs, estimated_duration: runtime, actual_duration: runtime },
            };
            arrival += rng.gen_range(0..=2 * cli.interarrival);

            spec
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    ensure!(cli.max_procs > 0 && cli.max_runtime > 0, "Processor and runtime limits must be positive");

    let specs = generate(&cli);
    let mut out = File::create(&cli.output).with_context(|| format!("creating {}", cli.output.display()))?;
    match cli.format {
        TraceFormat::Standard   => {
            writeln!(out, "# arrival procs runtime estimate")?;
            for s in &specs { writeln!(out, "{}", write_standard(s))?; }
        },
        TraceFormat::Triple     => {
            writeln!(out, "jobIndex, duration, nodesRequested")?;
            for s in &specs { writeln!(out, "{}", write_triple(s))?; }
        },
    }
    println!("Wrote {} jobs to {}", specs.len(), cli.output.display());

    Ok(())
}
