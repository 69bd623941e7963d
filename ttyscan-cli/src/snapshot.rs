//! Registry snapshot replay (--snapshot flag).
//!
//! A snapshot is a TOML description of a registry tree. Replaying one runs
//! the real discovery walk against it, so output can be reproduced on any
//! host.

use {
    anyhow::{Context, Result},
    log::debug,
    std::{fs, path::Path},
    ttyscan::{Enumerator, RegistryEnumerator, SimulatedRegistry, Snapshot},
};

/// Parse a snapshot from TOML text.
pub(crate) fn parse_snapshot(content: &str) -> Result<Snapshot> {
    toml::from_str(content).context("Invalid registry snapshot")
}

/// Read and parse the snapshot at `path`.
pub(crate) fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot file {}", path.display()))?;
    let snapshot =
        parse_snapshot(&content).with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    debug!(
        "Loaded snapshot with {} node(s) from {}",
        snapshot.nodes.len(),
        path.display()
    );
    Ok(snapshot)
}

/// Enumerator replaying the snapshot at `path`.
pub(crate) fn snapshot_enumerator(path: &Path) -> Result<Box<dyn Enumerator + Send + Sync>> {
    let registry = SimulatedRegistry::new(load_snapshot(path)?);
    Ok(Box::new(RegistryEnumerator::new(registry)))
}
