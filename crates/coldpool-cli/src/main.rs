use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "coldpool",
    about = "coldpool — simulate an autoscaling worker tier with cold starts",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file to completion as fast as possible.
    Run {
        /// Scenario file (TOML with [engine] and [[arrival]] tables).
        #[arg(short, long)]
        file: PathBuf,
        /// Simulated time to run for, in milliseconds.
        #[arg(long, default_value = "30000")]
        duration_ms: u64,
        /// Simulated time per step, in milliseconds.
        #[arg(long, default_value = "100")]
        step_ms: u64,
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
        /// Print the final metrics in Prometheus text format.
        #[arg(long)]
        prometheus: bool,
    },
    /// Drive a scenario in real time, one step per wall-clock tick.
    ///
    /// Stops on Ctrl-C, or once the simulated clock reaches --duration-ms.
    Live {
        #[arg(short, long)]
        file: PathBuf,
        /// Wall-clock interval between steps, in milliseconds.
        #[arg(long, default_value = "100")]
        tick_ms: u64,
        /// Speed multiplier applied to every step (0.1 to 10).
        #[arg(long, default_value = "1.0")]
        speed: f64,
        /// Stop once this much simulated time has elapsed.
        #[arg(long)]
        duration_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("coldpool=info"))?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run {
            file,
            duration_ms,
            step_ms,
            format,
            prometheus,
        } => commands::run::run(&file, duration_ms, step_ms, &format, prometheus),
        Commands::Live {
            file,
            tick_ms,
            speed,
            duration_ms,
        } => commands::live::live(&file, tick_ms, speed, duration_ms).await,
    }
}
