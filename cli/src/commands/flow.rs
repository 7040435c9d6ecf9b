//! Flow commands

use super::{archive_path, content, create_output, discard, open_input};
use crate::config::Settings;
use crate::output::{notice, success, ConfigurationRow, FlowRow, OutputFormat};
use crate::FlowCommands;
use anyhow::{bail, Context, Result};
use cig_core::model::{Collection, Results};
use cig_core::{
    batch, copy_flow, flow, transport_flow, ConfigurationParameter, Destination, TenantClient, TransportOptions,
};
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Parse `Key=key1,Value=value1`. Everything after `,Value=` is the value.
pub fn parse_parameter(s: &str) -> Result<ConfigurationParameter, String> {
    let invalid = || format!("invalid parameter '{}', expected Key=key1,Value=value1", s);

    let rest = s.strip_prefix("Key=").ok_or_else(invalid)?;
    let (key, value) = rest.split_once(",Value=").ok_or_else(invalid)?;
    if key.is_empty() {
        return Err(invalid());
    }

    Ok(ConfigurationParameter::new(key, value, ""))
}

/// Parameter file: the envelope written by `flow configurations -o`, or a
/// plain list
#[derive(Deserialize)]
#[serde(untagged)]
enum ParameterFile {
    Envelope(Collection<ConfigurationParameter>),
    List(Vec<ConfigurationParameter>),
}

impl ParameterFile {
    fn into_parameters(self) -> Vec<ConfigurationParameter> {
        match self {
            ParameterFile::Envelope(c) => c.d.results,
            ParameterFile::List(l) => l,
        }
    }
}

async fn read_parameter_file(path: &Path) -> Result<Vec<ConfigurationParameter>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let file: ParameterFile =
        serde_json::from_str(&content).with_context(|| format!("cannot decode parameters in {}", path.display()))?;
    Ok(file.into_parameters())
}

pub async fn handle(action: FlowCommands, settings: &Settings, format: OutputFormat) -> Result<()> {
    match action {
        FlowCommands::Inspect { id, flow_version } => {
            let client = TenantClient::new(&settings.tenant()?)?;
            let flow = flow::inspect_flow(&client, &id, &flow_version)
                .await
                .with_context(|| format!("failed to inspect flow {}", id))?;
            format.print_one::<_, FlowRow>(&flow)?;
        }
        FlowCommands::Download {
            id,
            output,
            flow_version,
        } => {
            let client = TenantClient::new(&settings.tenant()?)?;
            let path = archive_path(output, &id);
            let mut file = create_output(&path).await?;
            let bytes = match flow::download_flow(&client, &id, &flow_version, &mut file).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    discard(&path).await;
                    return Err(e).with_context(|| format!("failed to download flow {}", id));
                }
            };
            success(&format!("Content downloaded to {}.\nnumber of bytes: {}", path.display(), bytes));
        }
        FlowCommands::Create {
            name,
            id,
            package_id,
            file,
        } => {
            let client = TenantClient::new(&settings.tenant()?)?;
            let mut input = open_input(file.as_deref()).await?;
            let created = flow::create_flow(&client, &name, &id, &package_id, content(&mut input))
                .await
                .with_context(|| format!("failed to create flow {}", id))?;
            success("Integration flow created.");
            format.print_one::<_, FlowRow>(&created)?;
        }
        FlowCommands::Update {
            id,
            name,
            file,
            flow_version,
        } => {
            let client = TenantClient::new(&settings.tenant()?)?;
            let mut input = open_input(file.as_deref()).await?;
            let response = flow::update_flow(&client, &name, &id, &flow_version, content(&mut input))
                .await
                .with_context(|| format!("failed to update flow {}", id))?;
            success(&format!("Integration flow {} updated.", id));
            if !response.is_empty() {
                println!("{}", response);
            }
        }
        FlowCommands::Deploy { id, flow_version } => {
            let client = TenantClient::new(&settings.tenant()?)?;
            let task_id = flow::deploy_flow(&client, &id, &flow_version)
                .await
                .with_context(|| format!("failed to deploy flow {}", id))?;
            success("Task ID:");
            println!("{}", task_id);
        }
        FlowCommands::Configurations {
            id,
            output,
            flow_version,
        } => {
            let client = TenantClient::new(&settings.tenant()?)?;
            let configs = flow::flow_configurations(&client, &id, &flow_version)
                .await
                .with_context(|| format!("failed to read configurations of flow {}", id))?;

            match output {
                Some(path) => {
                    let envelope = Collection {
                        d: Results { results: configs },
                    };
                    let mut file = create_output(&path).await?;
                    file.write_all(serde_json::to_string_pretty(&envelope)?.as_bytes()).await?;
                    file.flush().await?;
                    success(&format!("Configurations written to {}", path.display()));
                }
                None => format.print::<_, ConfigurationRow>(&configs)?,
            }
        }
        FlowCommands::UpdateConfigs {
            id,
            parameters,
            input_file,
            no_batch,
        } => {
            let mut all = match input_file {
                Some(path) => read_parameter_file(&path).await?,
                None => Vec::new(),
            };
            all.extend(parameters);
            if all.is_empty() {
                bail!("no parameters given; use -p Key=key1,Value=value1 or -i <file>");
            }

            let client = TenantClient::new(&settings.tenant()?)?;
            let response = if no_batch {
                flow::update_configurations_individually(&client, &id, &all).await
            } else {
                batch::update_configurations(&client, &id, &all).await
            }
            .with_context(|| format!("failed to update configurations of flow {}", id))?;

            success(&format!("{} configuration parameter(s) of flow {} updated.", all.len(), id));
            print!("{}", response);
        }
        FlowCommands::Copy {
            src_flow_id,
            dest_flow_id,
            dest_flow_name,
            dest_package_id,
        } => {
            let tenant = settings.tenant()?;
            let destination = Destination::new(&tenant, &dest_flow_id)
                .with_name(dest_flow_name.as_deref())
                .with_package(dest_package_id.as_deref());

            copy_flow(
                &mut std::io::stdout(),
                &tenant,
                &src_flow_id,
                &destination,
                &TransportOptions::default(),
            )
            .await
            .with_context(|| format!("failed to copy flow {} to {}", src_flow_id, dest_flow_id))?;
        }
        FlowCommands::Transport {
            src_flow_id,
            dest_flow_id,
            dest_tenant_key,
            dest_flow_name,
            dest_package_id,
            strict,
        } => {
            let (source, target) = settings.tenant_pair(&dest_tenant_key)?;
            if source.key == target.key && src_flow_id == dest_flow_id {
                notice("Source and destination are the same flow; its content will be uploaded unchanged.");
            }

            let destination = Destination::new(&target, &dest_flow_id)
                .with_name(dest_flow_name.as_deref())
                .with_package(dest_package_id.as_deref());
            let options = TransportOptions {
                strict_destination_probe: strict,
                ..Default::default()
            };

            transport_flow(&mut std::io::stdout(), &source, &src_flow_id, &destination, options)
                .await
                .with_context(|| {
                    format!(
                        "failed to transport flow {} from {} to {}",
                        src_flow_id, source.key, target.key
                    )
                })?;
        }
    }
    Ok(())
}
