//! CLI Configuration
//!
//! Finds the configuration file and resolves tenants from it. The engine
//! only ever sees the resolved [`TenantConfig`].

use anyhow::{anyhow, Context, Result};
use cig_core::{ConfigFile, TenantConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

const FILE_NAMES: [&str; 2] = ["config.toml", "config.json"];

/// Global options that decide where configuration comes from
pub struct Settings {
    config: Option<PathBuf>,
    tenant_key: Option<String>,
}

impl Settings {
    pub fn new(config: Option<PathBuf>, tenant_key: Option<String>) -> Self {
        Self { config, tenant_key }
    }

    /// Configuration file contents
    pub fn load(&self) -> Result<ConfigFile> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => find_config(&search_paths())?,
        };
        debug!(path = %path.display(), "loading configuration");

        ConfigFile::load(&path).with_context(|| format!("failed to load configuration from {}", path.display()))
    }

    /// The tenant selected with `--tenant-key`, or the active one
    pub fn tenant(&self) -> Result<TenantConfig> {
        Ok(self.load()?.tenant(self.tenant_key.as_deref())?)
    }

    /// Selected tenant plus another one named by key
    pub fn tenant_pair(&self, other: &str) -> Result<(TenantConfig, TenantConfig)> {
        let file = self.load()?;
        let selected = file.tenant(self.tenant_key.as_deref())?;
        let other = file
            .tenant(Some(other))
            .with_context(|| format!("destination tenant '{}'", other))?;
        Ok((selected, other))
    }
}

/// Working directory first, then `~/.cig`
fn search_paths() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from(".")];
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".cig"));
    }

    roots
        .iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .collect()
}

fn find_config(candidates: &[PathBuf]) -> Result<PathBuf> {
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| {
            anyhow!(
                "no configuration file found (looked for {}); run `cig generate-config` to create one",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}

/// True when `path` names a JSON configuration file
pub fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
