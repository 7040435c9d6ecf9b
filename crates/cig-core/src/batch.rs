//! OData `$batch` requests
//!
//! A batch carries ordered sub-requests inside one changeset of a
//! `multipart/mixed` body. The service applies the changeset as a unit and
//! answers with a multipart body of its own, which is returned verbatim.

use crate::error::Result;
use crate::flow::artifact_path;
use crate::model::{ConfigurationParameter, ParameterValueBody, ACTIVE_VERSION};
use crate::session::TenantClient;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tracing::info;

/// Outer boundary of the batch body
pub const BATCH_BOUNDARY: &str = "batch_request";

/// Boundary of the single changeset inside the batch
pub const CHANGESET_BOUNDARY: &str = "changeset_abc";

const CRLF: &str = "\r\n";

/// One HTTP request embedded in a changeset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRequest {
    pub method: Method,
    /// Path relative to the API root, without a leading slash
    pub path: String,
    pub body: String,
}

/// Ordered list of sub-requests sent as one changeset
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    requests: Vec<SubRequest>,
}

impl BatchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, method: Method, path: impl Into<String>, body: impl Into<String>) {
        self.requests.push(SubRequest {
            method,
            path: path.into(),
            body: body.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// `Content-Type` header value of the outer request
    pub fn content_type() -> String {
        format!("multipart/mixed; boundary={}", BATCH_BOUNDARY)
    }

    /// Serialize into the multipart body, CRLF line endings throughout
    pub fn to_body(&self) -> String {
        let mut body = String::new();

        body.push_str(&format!("--{}{CRLF}", BATCH_BOUNDARY));
        body.push_str(&format!(
            "Content-Type: multipart/mixed; boundary={}{CRLF}{CRLF}",
            CHANGESET_BOUNDARY
        ));

        for request in &self.requests {
            body.push_str(&format!("--{}{CRLF}", CHANGESET_BOUNDARY));
            body.push_str(&format!("Content-Type: application/http{CRLF}"));
            body.push_str(&format!("Content-Transfer-Encoding:binary{CRLF}{CRLF}"));
            body.push_str(&format!("{} {} HTTP/1.1{CRLF}", request.method, request.path));
            body.push_str(&format!("Accept: application/json{CRLF}"));
            body.push_str(&format!("Content-Type: application/json{CRLF}{CRLF}"));
            body.push_str(&request.body);
            body.push_str(CRLF);
            body.push_str(CRLF);
        }

        body.push_str(&format!("--{}--{CRLF}{CRLF}", CHANGESET_BOUNDARY));
        body.push_str(&format!("--{}--{CRLF}", BATCH_BOUNDARY));
        body
    }
}

/// Changeset writing each parameter of the flow's active version
pub fn configuration_batch(flow_id: &str, params: &[ConfigurationParameter]) -> Result<BatchRequest> {
    let mut batch = BatchRequest::new();
    for param in params {
        let path = format!(
            "{}/$links/Configurations('{}')",
            artifact_path(flow_id, ACTIVE_VERSION),
            param.parameter_key
        );
        let body = serde_json::to_string(&ParameterValueBody::from(param))?;
        batch.push(Method::PUT, path, body);
    }
    Ok(batch)
}

/// Write all parameters in one `$batch` call.
///
/// Returns the raw multipart response followed by a newline.
pub async fn update_configurations(
    client: &TenantClient,
    flow_id: &str,
    params: &[ConfigurationParameter],
) -> Result<String> {
    let batch = configuration_batch(flow_id, params)?;

    let session = client.handshake().await?;
    let url = client.url("/$batch")?;
    let request = client
        .request(Method::POST, url)
        .await?
        .header(CONTENT_TYPE, BatchRequest::content_type())
        .body(batch.to_body());
    let request = session.apply(request);
    let response = client.execute(request).await?;

    info!(tenant = client.key(), flow = flow_id, parameters = batch.len(), "configuration batch applied");

    let mut text = response.text().await?;
    text.push('\n');
    Ok(text)
}
