use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use payment_repair::cli::{ops, Cli, Commands};
use payment_repair::config::RepairConfig;
use payment_repair::kvdb::SledDb;
use payment_repair::Result;

fn main() {
    let cli = Cli::parse();

    let mut config = RepairConfig::load_or_default(&cli.config);
    if let Some(db_path) = cli.db {
        config.store.db_path = db_path;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command, &config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &RepairConfig) -> Result<()> {
    info!("Opening payments store at '{}'", config.store.db_path);
    let db = SledDb::open(&config.store.db_path, &config.store.tree)?;

    match command {
        Commands::Migrate { dry_run } => {
            ops::handle_migrate_command(&db, dry_run)?;
        }
        Commands::Dump { bucket } => ops::handle_dump_command(&db, bucket.as_deref())?,
        Commands::Restore { file } => ops::handle_restore_command(&db, &file)?,
        Commands::Verify { file } => ops::handle_verify_command(&db, &file)?,
    }
    Ok(())
}
