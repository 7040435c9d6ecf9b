//! Package commands

use super::{archive_path, create_output, discard};
use crate::config::Settings;
use crate::output::{success, FlowRow, OutputFormat, PackageRow};
use crate::PackageCommands;
use anyhow::{Context, Result};
use cig_core::{package, TenantClient};

pub async fn handle(action: PackageCommands, settings: &Settings, format: OutputFormat) -> Result<()> {
    let client = TenantClient::new(&settings.tenant()?)?;

    match action {
        PackageCommands::Ls => {
            let packages = package::list_packages(&client).await.context("failed to list packages")?;
            format.print::<_, PackageRow>(&packages)?;
        }
        PackageCommands::Inspect { id } => {
            let package = package::inspect_package(&client, &id)
                .await
                .with_context(|| format!("failed to inspect package {}", id))?;
            format.print_one::<_, PackageRow>(&package)?;
        }
        PackageCommands::Flows { id } => {
            let flows = package::package_flows(&client, &id)
                .await
                .with_context(|| format!("failed to list flows of package {}", id))?;
            format.print::<_, FlowRow>(&flows)?;
        }
        PackageCommands::Download { id, output } => {
            let path = archive_path(output, &id);
            let mut file = create_output(&path).await?;
            let bytes = match package::download_package(&client, &id, &mut file).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    discard(&path).await;
                    return Err(e).with_context(|| format!("failed to download package {}", id));
                }
            };
            success(&format!("Content downloaded to {}.\nnumber of bytes: {}", path.display(), bytes));
        }
    }
    Ok(())
}
