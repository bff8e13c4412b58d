use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wave_sim_core::solver::DisplacementComponent;
use wave_sim_core::{
    ContainerReader, RunOutcome, Session, SimError, SimulationConfig, SolverObserver, StrategyKind,
};

/// Execution strategy selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Sequential,
    ThreadPool,
    SharedArena,
}

/// Headless elastic wave simulation
#[derive(Parser, Debug)]
#[command(name = "wave-sim-demo")]
#[command(about = "Runs an elastic wave simulation and writes a result container", long_about = None)]
struct Args {
    /// JSON configuration file (defaults to a homogeneous GaAs block)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of time steps
    #[arg(short, long)]
    steps: Option<usize>,

    /// Override the execution strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Worker or pool thread count for parallel strategies (default: one per core)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output container path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

/// Prints status changes and every tenth percent to stdout.
struct ConsoleObserver;

impl SolverObserver for ConsoleObserver {
    fn status(&self, text: &str) {
        println!("[status] {text}");
    }

    fn progress(&self, percent: u8) {
        if percent % 10 == 0 {
            println!("[progress] {percent:>3}%");
        }
    }

    fn error(&self, error: &SimError) {
        eprintln!("[error] {error}");
    }
}

fn effective_config(args: &Args) -> wave_sim_core::Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::gaas_block(),
    };
    if let Some(steps) = args.steps {
        config.steps = steps;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = match strategy {
            StrategyArg::Sequential => StrategyKind::Sequential,
            StrategyArg::ThreadPool => StrategyKind::ThreadPool {
                threads: args.workers,
            },
            StrategyArg::SharedArena => StrategyKind::SharedArena {
                workers: args.workers,
            },
        };
    }
    if args.output.is_some() {
        config.writer.path.clone_from(&args.output);
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> wave_sim_core::Result<()> {
    let config = effective_config(args)?;
    if let Some(path) = &args.write_config {
        config.save(path)?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    println!("=== Elastic Wave Simulation ===\n");
    println!(
        "Domain: {:.2} x {:.2} x {:.2}, materials: {} / {}, {} inclusion(s)",
        config.domain.x,
        config.domain.y,
        config.domain.z,
        config.primary,
        config.secondary,
        config.inclusions.len()
    );

    let mut session = Session::new(config)?;
    session.set_observer(Arc::new(ConsoleObserver));
    let dims = session.mesh()?.dims();
    println!("Grid: {} x {} x {} nodes\n", dims.nx, dims.ny, dims.nz);

    let summary = session.execute()?;
    println!("\n=== Summary ===");
    println!(
        "Outcome: {}",
        match summary.outcome {
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
        }
    );
    println!("Steps run: {}, recorded: {}", summary.steps_run, summary.recorded_steps);
    println!("dt: {:.3e} s", summary.dt);
    println!(
        "Wall time: {:.2} s ({:.3} ms/step)",
        summary.elapsed.as_secs_f64(),
        summary.mean_step_ms
    );
    println!("Output: {}", summary.output.display());

    if summary.recorded_steps == 0 {
        return Ok(());
    }
    let mut reader = ContainerReader::open(&summary.output)?;
    let last = reader.recorded_steps() as usize - 1;
    for component in DisplacementComponent::ALL {
        let field = reader.read_step(component, last)?;
        let peak = field.as_slice().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        println!("Peak |{component}| at step {last}: {peak:.4e}");
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Starting with {:?}", args);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
