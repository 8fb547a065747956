//! CLI for machinefeed — replay recorded machine sensor histories as live telemetry.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "machinefeed")]
#[command(about = "machinefeed — replay recorded machine sensor histories as live telemetry")]
#[command(version = machinefeed_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream telemetry to WebSocket consumers, one update per tick
    Serve {
        /// Directory of per-machine CSV histories
        #[arg(long, default_value = "machine_feed")]
        data_dir: String,

        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "8081")]
        port: u16,

        /// Tick interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Frames buffered per consumer before a slow consumer is dropped
        #[arg(long, default_value = "32")]
        queue: usize,
    },

    /// Load the data directory and list machines with their row counts
    Scan {
        /// Directory of per-machine CSV histories
        #[arg(long, default_value = "machine_feed")]
        data_dir: String,
    },

    /// Run ticks offline and print each update message as one JSON line
    Replay {
        /// Directory of per-machine CSV histories
        #[arg(long, default_value = "machine_feed")]
        data_dir: String,

        /// Number of ticks to run
        #[arg(long, default_value = "10")]
        ticks: u64,

        /// Milliseconds between tick timestamps
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Sleep between ticks instead of running as fast as possible
        #[arg(long)]
        realtime: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            data_dir,
            host,
            port,
            interval_ms,
            queue,
        } => commands::serve::run(&data_dir, &host, port, interval_ms, queue),
        Commands::Scan { data_dir } => commands::scan::run(&data_dir),
        Commands::Replay {
            data_dir,
            ticks,
            interval_ms,
            realtime,
        } => commands::replay::run(&data_dir, ticks, interval_ms, realtime),
    }
}
