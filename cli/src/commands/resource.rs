//! Resource commands

use crate::config::Settings;
use crate::output::success;
use crate::ResourceCommands;
use anyhow::{anyhow, Context, Result};
use cig_core::{flow, TenantClient};
use std::path::Path;

/// Resource name taken from the uploaded file
fn default_name(file: &Path) -> Result<String> {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("cannot derive a resource name from {}", file.display()))
}

pub async fn handle(action: ResourceCommands, settings: &Settings) -> Result<()> {
    match action {
        ResourceCommands::Update {
            flow_id,
            file,
            resource_type,
            name,
            flow_version,
        } => {
            let name = match name {
                Some(name) => name,
                None => default_name(&file)?,
            };

            let client = TenantClient::new(&settings.tenant()?)?;
            let mut content = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("cannot open {}", file.display()))?;
            let response =
                flow::update_resource(&client, &flow_id, &flow_version, &name, &resource_type, &mut content)
                    .await
                    .with_context(|| format!("failed to update resource {} of flow {}", name, flow_id))?;

            success(&format!("Resource {} of flow {} updated.", name, flow_id));
            if !response.is_empty() {
                println!("{}", response);
            }
        }
    }
    Ok(())
}
