pub mod ops;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "payment_repair")]
#[command(about = "Payments database repair tool", long_about = None)]
pub struct Cli {
    /// Config file
    #[arg(long, default_value = "payment_repair.toml")]
    pub config: String,
    /// Database path, overrides the config file
    #[arg(long)]
    pub db: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete failed htlcs from settled payments
    Migrate {
        /// Run the migration but discard its changes
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the store as fixture JSON
    Dump {
        /// Only dump this top-level bucket
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Load a fixture into the store
    Restore { file: String },
    /// Compare the store against a fixture
    Verify { file: String },
}
