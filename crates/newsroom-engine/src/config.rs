use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use newsroom_core::{RetryPolicy, Schema, DEFAULT_MAX_PAYLOAD_BYTES};
use newsroom_roles::NewsRoomSpec;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub newsrooms: Vec<NewsRoomSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Deadline for one role invocation when the node sets none.
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_base_delay_ms() -> u64 {
    RetryPolicy::default().base_delay_ms
}

fn default_max_delay_ms() -> u64 {
    RetryPolicy::default().max_delay_ms
}

fn default_node_timeout_ms() -> u64 {
    30_000
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            node_timeout_ms: default_node_timeout_ms(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

impl EngineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.max_payload_bytes)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub path: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default)]
    pub dir: Option<String>,
}

impl Config {
    pub fn default_for_desk(desk: &str) -> Self {
        Self {
            engine: EngineConfig::default(),
            ledger: LedgerConfig {
                path: ".newsroom/ledger.db".to_string(),
            },
            journal: JournalConfig {
                dir: Some(format!("~/.newsroom/journal/{desk}")),
            },
            newsrooms: vec![],
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| "parse newsroom.toml")?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path(root: &Path) -> PathBuf {
        root.join(".newsroom").join("newsroom.toml")
    }

    pub fn ledger_path(&self, root: &Path) -> PathBuf {
        resolve(root, &self.ledger.path)
    }

    pub fn journal_dir(&self, root: &Path) -> Option<PathBuf> {
        self.journal.dir.as_deref().map(|d| resolve(root, d))
    }
}

/// Expands `~` and anchors relative paths at `root`.
fn resolve(root: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}
