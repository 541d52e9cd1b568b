use tracing::{info, warn};

use crate::error::{RepairError, Result};
use crate::fixture;
use crate::kvdb::{SledDb, Tree};
use crate::migration::{migrate_payments, MigrationStats};

pub fn handle_migrate_command(db: &SledDb, dry_run: bool) -> Result<MigrationStats> {
    let stats = if dry_run {
        let stats = db.view(|tx| migrate_payments(tx))?;
        info!("Dry run: changes discarded");
        stats
    } else {
        db.update(|tx| migrate_payments(tx))?
    };

    println!(
        "payments: {}, without htlcs: {}, settled: {}, failed htlcs pruned: {}, keys deleted: {}",
        stats.payments,
        stats.without_htlcs,
        stats.settled,
        stats.attempts_pruned,
        stats.keys_deleted
    );
    Ok(stats)
}

pub fn handle_dump_command(db: &SledDb, bucket: Option<&str>) -> Result<()> {
    let mut tree = db.load()?;
    if let Some(name) = bucket {
        let node = tree
            .remove(name.as_bytes())
            .ok_or_else(|| RepairError::Fixture(format!("no top-level bucket '{}'", name)))?;
        tree = Tree::new();
        tree.insert(name.as_bytes().to_vec(), node);
    }
    println!("{}", serde_json::to_string_pretty(&fixture::tree_to_json(&tree))?);
    Ok(())
}

fn read_fixture(path: &str) -> Result<Tree> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    fixture::tree_from_json(&value)
}

pub fn handle_restore_command(db: &SledDb, path: &str) -> Result<()> {
    let tree = read_fixture(path)?;
    db.update(|tx| fixture::restore(tx, &tree))?;
    info!("Restored {} top-level bucket(s) from '{}'", tree.len(), path);
    Ok(())
}

pub fn handle_verify_command(db: &SledDb, path: &str) -> Result<()> {
    let expected = read_fixture(path)?;
    let differences = fixture::diff(&expected, &db.load()?);
    if differences.is_empty() {
        println!("Store matches '{}'", path);
        return Ok(());
    }
    for line in &differences {
        println!("{}", line);
    }
    warn!("Store differs from '{}'", path);
    Err(RepairError::Fixture(format!(
        "{} difference(s) against '{}'",
        differences.len(),
        path
    )))
}
