//! Runtime configuration: an optional TOML file layered with `GATELOG_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use gatelog_core::archiver::DEFAULT_BATCH_SIZE;
use serde::Deserialize;

/// Settings for one archiver invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiverConfig {
  /// SQLite database holding the live and archive tables.
  #[serde(default = "default_database_path")]
  pub database_path: PathBuf,
  /// Rows per insert-then-delete transaction.
  #[serde(default = "default_batch_size")]
  pub batch_size:    usize,
}

fn default_database_path() -> PathBuf { PathBuf::from("gatelog.db") }

fn default_batch_size() -> usize { DEFAULT_BATCH_SIZE }

impl ArchiverConfig {
  /// Read `path` if it exists, then apply environment overrides such as
  /// `GATELOG_DATABASE_PATH` and `GATELOG_BATCH_SIZE`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("GATELOG"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ArchiverConfig")?;
    cfg.database_path = expand_tilde(&cfg.database_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
