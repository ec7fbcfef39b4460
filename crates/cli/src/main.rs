mod keygen;
mod simulate;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Covenant multi-party endorsement toolkit.
#[derive(Parser)]
#[command(name = "covenant", version, about = "Covenant multi-party endorsement toolkit")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a node identity keypair
    Keygen {
        /// Key algorithm
        #[arg(long, default_value = "ed25519")]
        algorithm: String,
        /// Output path prefix; writes <prefix>.secret and <prefix>.pub
        #[arg(long, default_value = "covenant-key")]
        prefix: String,
    },

    /// Run issue and transfer steps across an in-process network
    Simulate {
        /// Path to the network description TOML
        config: PathBuf,
    },
}

/// Logs go to stderr so `--output json` stays machine-readable.
fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match cli.command {
        Commands::Keygen { algorithm, prefix } => {
            keygen::cmd_keygen(&algorithm, &prefix, cli.quiet);
        }
        Commands::Simulate { config } => {
            simulate::cmd_simulate(&config, cli.output, cli.quiet);
        }
    }
}
