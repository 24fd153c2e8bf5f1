use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use newsroom_core::{ContentId, LedgerEntry};

/// Human-readable per-content log, one file per content item.
///
/// Mirrors ledger entries as they are recorded. The ledger stays the source
/// of truth: a journal write failure is logged and otherwise ignored.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    dir: Option<PathBuf>,
}

impl Journal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn path_for(&self, content_id: &ContentId) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.log", content_id.as_str())))
    }

    pub fn record(&self, entry: &LedgerEntry) {
        if let Err(e) = self.append(entry) {
            tracing::warn!(content_id = %entry.content_id, ordinal = entry.ordinal, error = %e, "journal write failed");
        }
    }

    fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let Some(path) = self.path_for(&entry.content_id) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create journal dir {}", parent.display()))?;
        }
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open journal {}", path.display()))?;
        writeln!(f, "{}", entry.summary())?;
        Ok(())
    }
}
