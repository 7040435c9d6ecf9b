//! Error taxonomy and response classification
//!
//! Every remote call funnels its non-2xx responses through [`classify`],
//! which reduces the heterogeneous error shapes of the integration API to
//! three kinds: connection failures, missing artifacts and everything else.

use reqwest::{Response, StatusCode};
use thiserror::Error;
use tracing::debug;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CigError>;

/// Engine errors
#[derive(Error, Debug)]
pub enum CigError {
    /// The request never produced a response (DNS, refused, timeout)
    #[error("connection error: {0}")]
    Connection(#[source] reqwest::Error),

    /// Remote service answered 404
    #[error("not found: {body}")]
    NotFound { body: String },

    /// Remote service answered with any other non-2xx status
    #[error("invalid server response ({status}): {body}")]
    InvalidResponse { status: u16, body: String },

    /// HTTP client failure after a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Archive transform failed at the named step
    #[error("error {step}: {source}")]
    Transform {
        step: &'static str,
        #[source]
        source: Box<CigError>,
    },

    /// Identity string absent from an archive member
    #[error("identity '{id}' not found in {member}")]
    IdentityNotFound { member: &'static str, id: String },

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl CigError {
    /// Returns true if the remote service reported the artifact as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, CigError::NotFound { .. })
    }

    /// Returns true if no response was received
    pub fn is_connection(&self) -> bool {
        matches!(self, CigError::Connection(_))
    }

    /// Returns true for non-2xx responses other than 404
    pub fn is_invalid_response(&self) -> bool {
        matches!(self, CigError::InvalidResponse { .. })
    }

    /// Wraps an error with the archive transform step that produced it
    pub(crate) fn in_step(self, step: &'static str) -> Self {
        CigError::Transform {
            step,
            source: Box::new(self),
        }
    }
}

/// Bytes of an error body kept for the error message
pub const MAX_ERROR_BODY: usize = 64 * 1024;

/// Maps a non-2xx response to an error carrying the raw body.
///
/// The body is kept as opaque text: the remote JSON error envelope is meant
/// for display, not for branching. At most [`MAX_ERROR_BODY`] bytes are read;
/// the rest is discarded. A body that cannot be read surfaces the read
/// failure itself.
pub async fn classify(mut response: Response) -> CigError {
    let status = response.status();
    let mut body = Vec::new();

    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_ERROR_BODY - body.len();
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if body.len() == MAX_ERROR_BODY {
                    debug!(status = status.as_u16(), "error body truncated");
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => return CigError::Http(e),
        }
    }

    classify_parts(status, String::from_utf8_lossy(&body).into_owned())
}

fn classify_parts(status: StatusCode, body: String) -> CigError {
    if status == StatusCode::NOT_FOUND {
        CigError::NotFound { body }
    } else {
        CigError::InvalidResponse {
            status: status.as_u16(),
            body,
        }
    }
}

/// Passes 2xx responses through and classifies everything else
pub async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(classify(response).await)
    }
}
