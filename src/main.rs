use clap::Parser;
use gmh_governance::QuorumConfig;
use simulation::{run_simulation, SimulationConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

pub mod simulation;

/// Seeded multi-user propose/vote/merge simulation.
#[derive(Parser, Debug)]
#[command(name = "groupmind")]
#[command(about = "Simulate users proposing, voting on and merging outline changes")]
#[command(version)]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Seed for the action generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of simulated users
    #[arg(long, default_value_t = 5)]
    users: usize,

    /// Number of rounds; every user acts once per round
    #[arg(long, default_value_t = 50)]
    rounds: usize,

    /// Quorum configuration as a JSON file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let quorum = match &args.config {
        Some(path) => match QuorumConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "invalid quorum configuration");
                return ExitCode::FAILURE;
            }
        },
        None => QuorumConfig::default().with_eligible_voters(args.users),
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║            GROUPMIND GOVERNANCE SIMULATION                 ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let config = SimulationConfig {
        users: args.users.max(1),
        rounds: args.rounds,
        seed: args.seed,
        quorum,
    };
    match rt.block_on(run_simulation(config)) {
        Ok(stats) => {
            stats.print();
            println!("\n✓ Simulation completed successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
