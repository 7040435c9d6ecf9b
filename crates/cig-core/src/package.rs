//! Integration package queries

use crate::error::Result;
use crate::flow::stream_body;
use crate::model::{Collection, Entity, IntegrationFlow, IntegrationPackage};
use crate::session::TenantClient;
use reqwest::Method;
use tokio::io::AsyncWrite;
use tracing::info;

fn package_path(id: &str) -> String {
    format!("/IntegrationPackages('{}')", id)
}

/// All packages of the tenant
pub async fn list_packages(client: &TenantClient) -> Result<Vec<IntegrationPackage>> {
    let url = client.url("/IntegrationPackages")?;
    let request = client.request(Method::GET, url).await?;
    let response = client.execute(request).await?;

    let packages: Collection<IntegrationPackage> = response.json().await?;
    Ok(packages.d.results)
}

pub async fn inspect_package(client: &TenantClient, id: &str) -> Result<IntegrationPackage> {
    let url = client.url(&package_path(id))?;
    let request = client.request(Method::GET, url).await?;
    let response = client.execute(request).await?;

    let package: Entity<IntegrationPackage> = response.json().await?;
    Ok(package.d)
}

/// Design-time flows contained in a package
pub async fn package_flows(client: &TenantClient, id: &str) -> Result<Vec<IntegrationFlow>> {
    let url = client.url(&format!("{}/IntegrationDesigntimeArtifacts", package_path(id)))?;
    let request = client.request(Method::GET, url).await?;
    let response = client.execute(request).await?;

    let flows: Collection<IntegrationFlow> = response.json().await?;
    Ok(flows.d.results)
}

/// Stream the package archive into `sink`, returning the bytes written
pub async fn download_package<W>(client: &TenantClient, id: &str, sink: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let url = client.url(&format!("{}/$value", package_path(id)))?;
    let request = client.request(Method::GET, url).await?;
    let response = client.execute(request).await?;

    let written = stream_body(response, sink).await?;
    info!(tenant = client.key(), package = id, bytes = written, "package content downloaded");
    Ok(written)
}
