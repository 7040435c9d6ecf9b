//! Flow transport between tenants
//!
//! A transport runs once through a fixed sequence of steps:
//!
//! 1. inspect the source flow (active version)
//! 2. download its archive into a scoped temporary file
//! 3. rewrite the archive identity when the destination id differs
//! 4. probe the destination for an existing flow
//! 5. update the existing flow, or create a new one
//! 6. write a short report to the caller's sink
//!
//! There are no retries. Temporary files are dropped on every exit path, so
//! a failure leaves nothing behind locally; the destination tenant may still
//! be left without the flow or with its previous content.

use crate::archive;
use crate::config::TenantConfig;
use crate::error::Result;
use crate::flow;
use crate::model::{IntegrationFlow, ACTIVE_VERSION};
use crate::session::TenantClient;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Transport tuning
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Abort when the destination probe fails with anything but not-found.
    /// When unset every probe failure is read as "flow does not exist".
    pub strict_destination_probe: bool,
    /// Directory for downloaded and rewritten archives; the system temp
    /// directory when unset
    pub work_dir: Option<PathBuf>,
}

impl TransportOptions {
    fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Where a flow should end up
#[derive(Debug, Clone, Copy)]
pub struct Destination<'a> {
    pub tenant: &'a TenantConfig,
    pub flow_id: &'a str,
    /// Defaults to the existing destination name on update, the source name
    /// on create
    pub flow_name: Option<&'a str>,
    /// Defaults to the source package
    pub package_id: Option<&'a str>,
}

impl<'a> Destination<'a> {
    pub fn new(tenant: &'a TenantConfig, flow_id: &'a str) -> Self {
        Self {
            tenant,
            flow_id,
            flow_name: None,
            package_id: None,
        }
    }

    pub fn with_name(mut self, name: Option<&'a str>) -> Self {
        self.flow_name = name.filter(|n| !n.is_empty());
        self
    }

    pub fn with_package(mut self, package_id: Option<&'a str>) -> Self {
        self.package_id = package_id.filter(|p| !p.is_empty());
        self
    }
}

/// How the flow was published on the destination
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Published {
    Created { flow: IntegrationFlow },
    Updated { response: String },
}

/// Result of a transport or copy
#[derive(Debug, Clone, Serialize)]
pub struct TransportOutcome {
    pub flow_id: String,
    /// Archive bytes downloaded from the source
    pub bytes: u64,
    /// Whether the archive identity was rewritten
    pub renamed: bool,
    pub flow_name: String,
    pub package_id: String,
    pub published: Published,
}

impl TransportOutcome {
    pub fn is_update(&self) -> bool {
        matches!(self.published, Published::Updated { .. })
    }
}

// =============================================================================
// Shared steps
// =============================================================================

/// Source flow metadata plus its archive on disk
struct Fetched {
    flow: IntegrationFlow,
    bytes: u64,
    download: NamedTempFile,
    renamed: Option<NamedTempFile>,
}

impl Fetched {
    /// Archive to publish: the rewritten copy if there is one
    fn artifact(&self) -> &Path {
        self.renamed
            .as_ref()
            .map(NamedTempFile::path)
            .unwrap_or_else(|| self.download.path())
    }
}

/// Inspect, download and, when the ids differ, rewrite the source flow
async fn fetch_source<W: Write>(
    out: &mut W,
    source: &TenantClient,
    source_id: &str,
    destination_id: &str,
    work_dir: &Path,
) -> Result<Fetched> {
    info!(tenant = source.key(), flow = source_id, "inspecting source flow");
    let flow = flow::inspect_flow(source, source_id, ACTIVE_VERSION).await?;

    let download = tempfile::Builder::new()
        .prefix("flow")
        .suffix(".zip")
        .tempfile_in(work_dir)?;
    let mut sink = tokio::fs::File::from_std(download.reopen()?);
    let bytes = flow::download_flow(source, source_id, ACTIVE_VERSION, &mut sink).await?;
    drop(sink);
    writeln!(out, "Content downloaded.\nnumber of bytes: {}", bytes)?;

    let renamed = if source_id != destination_id {
        info!(from = source_id, to = destination_id, "rewriting flow identity");
        Some(archive::adjust_identity_in(
            work_dir,
            download.path(),
            source_id,
            destination_id,
        )?)
    } else {
        None
    };

    Ok(Fetched {
        flow,
        bytes,
        download,
        renamed,
    })
}

/// Create the flow on `client`, defaulting name and package to the source's
async fn publish_new<W: Write>(
    out: &mut W,
    client: &TenantClient,
    fetched: &Fetched,
    destination: &Destination<'_>,
) -> Result<TransportOutcome> {
    let flow_name = fallback(out, destination.flow_name, &fetched.flow.name, "flow name", "source")?;
    let package_id = fallback(out, destination.package_id, &fetched.flow.package_id, "package", "source")?;

    let mut content = tokio::fs::File::open(fetched.artifact()).await?;
    let created = flow::create_flow(client, &flow_name, destination.flow_id, &package_id, Some(&mut content)).await?;

    writeln!(out, "Integration flow created.")?;
    writeln!(out, "{}", serde_json::to_string_pretty(&created)?)?;

    Ok(TransportOutcome {
        flow_id: created.id.clone(),
        bytes: fetched.bytes,
        renamed: fetched.renamed.is_some(),
        flow_name,
        package_id,
        published: Published::Created { flow: created },
    })
}

/// Use the caller's override or report the default taken instead
fn fallback<W: Write>(
    out: &mut W,
    requested: Option<&str>,
    default: &str,
    what: &str,
    origin: &str,
) -> Result<String> {
    match requested {
        Some(value) => Ok(value.to_string()),
        None => {
            writeln!(out, "Using {} {} '{}'", origin, what, default)?;
            Ok(default.to_string())
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Move the active version of `source_id` from `source` to `destination`.
///
/// The destination flow is updated when it already exists and created
/// otherwise. Progress lines and the final result are written to `out`.
pub async fn transport_flow<W: Write>(
    out: &mut W,
    source: &TenantConfig,
    source_id: &str,
    destination: &Destination<'_>,
    options: TransportOptions,
) -> Result<TransportOutcome> {
    let source_client = TenantClient::new(source)?;
    let fetched = fetch_source(out, &source_client, source_id, destination.flow_id, &options.work_dir()).await?;

    let client = TenantClient::new(destination.tenant)?;
    let existing = probe_destination(&client, destination.flow_id, &options).await?;

    let outcome = match existing {
        Some(existing) => {
            let flow_name = fallback(out, destination.flow_name, &existing.name, "flow name", "destination")?;

            let mut content = tokio::fs::File::open(fetched.artifact()).await?;
            let response = flow::update_flow(
                &client,
                &flow_name,
                destination.flow_id,
                ACTIVE_VERSION,
                Some(&mut content),
            )
            .await?;
            writeln!(out, "Integration flow {} updated. Response: {}", destination.flow_id, response)?;

            TransportOutcome {
                flow_id: destination.flow_id.to_string(),
                bytes: fetched.bytes,
                renamed: fetched.renamed.is_some(),
                flow_name,
                package_id: existing.package_id,
                published: Published::Updated { response },
            }
        }
        None => publish_new(out, &client, &fetched, destination).await?,
    };

    info!(
        from = source.key.as_str(),
        to = destination.tenant.key.as_str(),
        flow = %outcome.flow_id,
        updated = outcome.is_update(),
        "flow transported"
    );
    Ok(outcome)
}

/// Look up the destination flow; `None` means it should be created
async fn probe_destination(
    client: &TenantClient,
    flow_id: &str,
    options: &TransportOptions,
) -> Result<Option<IntegrationFlow>> {
    match flow::inspect_flow(client, flow_id, ACTIVE_VERSION).await {
        Ok(existing) if !existing.id.is_empty() => Ok(Some(existing)),
        Ok(_) => Ok(None),
        Err(e) if e.is_not_found() => {
            info!(tenant = client.key(), flow = flow_id, "destination flow does not exist yet");
            Ok(None)
        }
        Err(e) if options.strict_destination_probe => Err(e),
        Err(e) => {
            warn!(tenant = client.key(), flow = flow_id, error = %e, "destination probe failed, creating flow");
            Ok(None)
        }
    }
}

// =============================================================================
// Copy
// =============================================================================

/// Copy a flow within one tenant under a new id. Always creates, so only
/// `options.work_dir` applies.
pub async fn copy_flow<W: Write>(
    out: &mut W,
    tenant: &TenantConfig,
    source_id: &str,
    destination: &Destination<'_>,
    options: &TransportOptions,
) -> Result<TransportOutcome> {
    let client = TenantClient::new(tenant)?;
    let fetched = fetch_source(out, &client, source_id, destination.flow_id, &options.work_dir()).await?;
    let outcome = publish_new(out, &client, &fetched, destination).await?;

    info!(tenant = tenant.key.as_str(), from = source_id, to = %outcome.flow_id, "flow copied");
    Ok(outcome)
}
