use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "acb")]
#[command(about = "Adjusted cost base transaction replay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply unprocessed transactions, posting entries to the journal
    Replay {
        /// Layered config paths in merge order (base -> overrides)
        #[arg(long = "config", required = true)]
        config_paths: Vec<PathBuf>,

        /// Stop after this many applied transactions (0 = no limit).
        /// Overrides replay.batch_size and ACB_BATCH_SIZE.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Fail instead of warning when the config has keys nothing reads
        #[arg(long, default_value_t = false)]
        strict_keys: bool,
    },

    /// List same-day buy/sell groups that need an Order value
    Ambiguities {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<PathBuf>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Journal utilities
    Journal {
        #[command(subcommand)]
        cmd: JournalCmd,
    },
}

#[derive(Subcommand)]
enum JournalCmd {
    /// Check the hash chain and entry balance of a journal file
    Verify {
        path: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience); silent when missing.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Replay {
            config_paths,
            batch_size,
            strict_keys,
        } => commands::replay::run(&config_paths, batch_size, strict_keys),

        Commands::Ambiguities { config_paths } => commands::inspect::ambiguities(&config_paths),

        Commands::ConfigHash { paths } => {
            let loaded = acb_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }

        Commands::Journal { cmd } => match cmd {
            JournalCmd::Verify { path } => commands::inspect::verify_journal(&path),
        },
    }
}
