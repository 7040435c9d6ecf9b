//! Integration flow operations
//!
//! Each operation is one authenticated request/response cycle against the
//! design-time artifact endpoints. Writes perform a fresh CSRF handshake
//! first; nothing is cached between calls.

use crate::error::Result;
use crate::model::{
    Collection, ConfigurationParameter, Entity, FlowConfiguration, IntegrationFlow, ParameterValueBody,
};
use crate::session::TenantClient;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Method, Response};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Archive content handed to create/update
pub type FlowContent<'a> = &'a mut (dyn AsyncRead + Unpin + Send);

/// OData key of a design-time artifact
pub fn artifact_path(id: &str, version: &str) -> String {
    format!("IntegrationDesigntimeArtifacts(Id='{}',Version='{}')", id, version)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateFlowBody<'a> {
    name: &'a str,
    id: &'a str,
    package_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateFlowBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceBody {
    resource_content: String,
}

/// Read the whole stream and base64 it; empty content counts as absent
async fn encode_content(content: Option<FlowContent<'_>>) -> Result<Option<String>> {
    let Some(reader) = content else {
        return Ok(None);
    };

    let mut data = Vec::new();
    reader.read_to_end(&mut data).await?;
    if data.is_empty() {
        return Ok(None);
    }

    Ok(Some(BASE64.encode(&data)))
}

/// Fetch a flow's metadata
pub async fn inspect_flow(client: &TenantClient, id: &str, version: &str) -> Result<IntegrationFlow> {
    let url = client.url(&format!("/{}", artifact_path(id, version)))?;
    let request = client.request(Method::GET, url).await?;
    let response = client.execute(request).await?;

    let flow: Entity<IntegrationFlow> = response.json().await?;
    Ok(flow.d)
}

/// Stream a flow's archive into `sink`, returning the bytes written
pub async fn download_flow<W>(client: &TenantClient, id: &str, version: &str, sink: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let url = client.url(&format!("/{}/$value", artifact_path(id, version)))?;
    let request = client.request(Method::GET, url).await?;
    let response = client.execute(request).await?;

    let written = stream_body(response, sink).await?;
    info!(tenant = client.key(), flow = id, bytes = written, "flow content downloaded");
    Ok(written)
}

/// Copy a response body chunk by chunk without buffering it whole
pub(crate) async fn stream_body<W>(mut response: Response, sink: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        sink.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    sink.flush().await?;
    Ok(written)
}

/// Create a flow; without content an empty flow is created
pub async fn create_flow(
    client: &TenantClient,
    name: &str,
    id: &str,
    package_id: &str,
    content: Option<FlowContent<'_>>,
) -> Result<IntegrationFlow> {
    let body = CreateFlowBody {
        name,
        id,
        package_id,
        artifact_content: encode_content(content).await?,
    };

    let session = client.handshake().await?;
    let url = client.url("/IntegrationDesigntimeArtifacts")?;
    let request = client.mutation(Method::POST, url, &session).await?.json(&body);
    let response = client.execute(request).await?;

    let created: Entity<IntegrationFlow> = response.json().await?;
    info!(tenant = client.key(), flow = %created.d.id, "flow created");
    Ok(created.d)
}

/// Update a flow's name and, when given, its content. Returns the raw
/// response body.
pub async fn update_flow(
    client: &TenantClient,
    name: &str,
    id: &str,
    version: &str,
    content: Option<FlowContent<'_>>,
) -> Result<String> {
    let body = UpdateFlowBody {
        name,
        artifact_content: encode_content(content).await?,
    };

    let session = client.handshake().await?;
    let url = client.url(&format!("/{}", artifact_path(id, version)))?;
    let request = client.mutation(Method::PUT, url, &session).await?.json(&body);
    let response = client.execute(request).await?;

    info!(tenant = client.key(), flow = id, "flow updated");
    Ok(response.text().await?)
}

/// Trigger deployment; returns the task id for status polling
pub async fn deploy_flow(client: &TenantClient, id: &str, version: &str) -> Result<String> {
    let session = client.handshake().await?;
    // `Url` escapes the quotes of an http query as %27 (set_query included);
    // the service decodes them back to the quoted literals.
    let url = client.url(&format!(
        "/DeployIntegrationDesigntimeArtifact?Id='{}'&Version='{}'",
        id, version
    ))?;
    let request = client.mutation(Method::POST, url, &session).await?;
    let response = client.execute(request).await?;

    let task_id = response.text().await?;
    info!(tenant = client.key(), flow = id, task = %task_id, "flow deployment triggered");
    Ok(task_id)
}

/// List a flow's externalized configuration parameters
pub async fn flow_configurations(
    client: &TenantClient,
    id: &str,
    version: &str,
) -> Result<Vec<FlowConfiguration>> {
    let url = client.url(&format!("/{}/Configurations", artifact_path(id, version)))?;
    let request = client.request(Method::GET, url).await?;
    let response = client.execute(request).await?;

    let configs: Collection<FlowConfiguration> = response.json().await?;
    Ok(configs.d.results)
}

/// Write parameters one request at a time; stops at the first failure.
/// Returns the response bodies, one per line.
pub async fn update_configurations_individually(
    client: &TenantClient,
    id: &str,
    params: &[ConfigurationParameter],
) -> Result<String> {
    let session = client.handshake().await?;
    let mut combined = String::new();

    for param in params {
        let url = client.url(&format!(
            "/{}/$links/Configurations('{}')",
            artifact_path(id, crate::model::ACTIVE_VERSION),
            param.parameter_key
        ))?;
        let request = client
            .mutation(Method::PUT, url, &session)
            .await?
            .json(&ParameterValueBody::from(param));
        let response = client.execute(request).await?;

        debug!(flow = id, key = %param.parameter_key, "configuration parameter updated");
        combined.push_str(&response.text().await?);
        combined.push('\n');
    }

    Ok(combined)
}

/// Replace a resource (script, mapping, schema...) of a flow
pub async fn update_resource(
    client: &TenantClient,
    flow_id: &str,
    version: &str,
    name: &str,
    resource_type: &str,
    content: FlowContent<'_>,
) -> Result<String> {
    let mut data = Vec::new();
    content.read_to_end(&mut data).await?;
    let body = ResourceBody {
        resource_content: BASE64.encode(&data),
    };

    let session = client.handshake().await?;
    let url = client.url(&format!(
        "/{}/$links/Resources(Name='{}',ResourceType='{}')",
        artifact_path(flow_id, version),
        name,
        resource_type
    ))?;
    let request = client.mutation(Method::PUT, url, &session).await?.json(&body);
    let response = client.execute(request).await?;

    info!(tenant = client.key(), flow = flow_id, resource = name, "flow resource updated");
    Ok(response.text().await?)
}
