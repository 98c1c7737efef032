use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sift-queue",
    version,
    about = "Background task queue driver for SIFT",
    long_about = "Run demo tasks through the SIFT background task queue and watch the\n\
                  aggregated progress signal. Queue settings come from $SIFT_QUEUE_WORKERS\n\
                  and $SIFT_QUEUE_NOTIFY_CAPACITY (or a .env file)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Enqueue demo tasks and print aggregated progress until the queue is idle
    Demo(DemoArgs),
    /// Show the effective queue configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct DemoArgs {
    /// Number of interactive tasks (round-robin over interactive workers)
    #[arg(long, default_value_t = 3)]
    pub interactive: usize,

    /// Number of background tasks
    #[arg(long, default_value_t = 1)]
    pub background: usize,

    /// Progress steps per task
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub steps: u32,

    /// Delay between steps in milliseconds
    #[arg(long, default_value_t = 100)]
    pub step_ms: u64,

    /// Add one interactive task that fails after this many steps
    #[arg(long)]
    pub fail_at: Option<u32>,

    /// Override the worker count from the environment
    #[arg(long)]
    pub workers: Option<usize>,

    /// Seconds to wait for the queue to drain after the last event
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Emit JSON lines instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
