//! generate-config command

use crate::config::is_json;
use crate::output::success;
use anyhow::{Context, Result};
use cig_core::ConfigFile;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

const TOML_HEADER: &str = "\
# cig configuration
#
# active_tenant_key selects the tenant used when --tenant-key is not given.
# Authorization type is \"oauth\" (client_id, client_secret, token_url)
# or \"basic\" (username, password).

";

/// Template content for `path`, JSON or commented TOML by extension
fn render(path: &Path) -> Result<String> {
    let template = ConfigFile::template();
    if is_json(path) {
        Ok(serde_json::to_string_pretty(&template)?)
    } else {
        Ok(format!("{}{}", TOML_HEADER, template.to_toml()?))
    }
}

pub fn handle(path: &Path) -> Result<()> {
    let content = render(path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    success(&format!("Configuration template written to {}", path.display()));
    Ok(())
}
