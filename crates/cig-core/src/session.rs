//! Session and authentication
//!
//! [`TenantClient`] attaches tenant credentials to every request: a bearer
//! token from an OAuth client-credentials token source, or HTTP basic
//! credentials. Mutating requests additionally need a [`Session`]: a CSRF
//! token plus the cookies handed out with it, fetched fresh through
//! [`TenantClient::handshake`] before each group of writes.

use crate::config::{AuthKind, TenantConfig};
use crate::error::{ensure_success, CigError, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// Header carrying the CSRF token in both directions
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_LEEWAY_SECS: i64 = 30;

const USER_AGENT: &str = concat!("cig/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Credentials
// =============================================================================

enum Credentials {
    OAuth(TokenSource),
    Basic { username: String, password: String },
    Anonymous,
}

/// OAuth 2.0 client-credentials token source with a cached access token
struct TokenSource {
    client_id: String,
    client_secret: String,
    token_url: String,
    token: RwLock<Option<AccessToken>>,
}

#[derive(Clone, Debug)]
struct AccessToken {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_valid(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(TOKEN_EXPIRY_LEEWAY_SECS) > Utc::now(),
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenSource {
    fn cached(&self) -> Option<String> {
        self.token
            .read()
            .as_ref()
            .filter(|t| t.is_valid())
            .map(|t| t.access_token.clone())
    }

    async fn access_token(&self, http: &reqwest::Client) -> Result<String> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        debug!("POST {}", self.token_url);
        let response = http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(CigError::Connection)?;
        let response = ensure_success(response).await?;

        let token: TokenResponse = response.json().await?;
        let fresh = AccessToken {
            access_token: token.access_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        };
        let value = fresh.access_token.clone();
        *self.token.write() = Some(fresh);

        Ok(value)
    }
}

// =============================================================================
// Session
// =============================================================================

/// CSRF token and cookies obtained from one tenant's handshake
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub csrf_token: String,
    /// `name=value` pairs from the handshake's `Set-Cookie` headers
    pub cookies: Vec<String>,
}

impl Session {
    fn from_response(response: &Response) -> Self {
        let csrf_token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(|pair| pair.trim().to_string())
            .filter(|pair| !pair.is_empty())
            .collect();

        Self { csrf_token, cookies }
    }

    /// Adds the token and replays every cookie on a mutating request
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(CSRF_HEADER, &self.csrf_token);
        if self.cookies.is_empty() {
            request
        } else {
            request.header(COOKIE, self.cookies.join("; "))
        }
    }
}

// =============================================================================
// Tenant client
// =============================================================================

/// Authenticated HTTP client bound to one tenant
pub struct TenantClient {
    key: String,
    base_url: String,
    http: reqwest::Client,
    credentials: Credentials,
}

impl TenantClient {
    /// Build a client for the tenant's authorization kind.
    ///
    /// Unknown kinds yield a client that sends no credentials; the remote
    /// service then rejects the calls.
    pub fn new(tenant: &TenantConfig) -> Result<Self> {
        let auth = &tenant.authorization;
        let credentials = match &auth.kind {
            AuthKind::OAuth => Credentials::OAuth(TokenSource {
                client_id: auth.client_id.clone(),
                client_secret: auth.client_secret.clone(),
                token_url: auth.token_url.clone(),
                token: RwLock::new(None),
            }),
            AuthKind::Basic => Credentials::Basic {
                username: auth.username.clone(),
                password: auth.password.clone(),
            },
            AuthKind::Other(kind) if kind.is_empty() => {
                warn!(tenant = %tenant.key, "no authorization type configured, sending requests without credentials");
                Credentials::Anonymous
            }
            AuthKind::Other(kind) => {
                warn!(tenant = %tenant.key, kind = %kind, "unsupported authorization type, sending requests without credentials");
                Credentials::Anonymous
            }
        };

        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            key: tenant.key.clone(),
            base_url: tenant.api_url.trim_end_matches('/').to_string(),
            http,
            credentials,
        })
    }

    /// Tenant key this client talks to
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Absolute URL for an API path such as `/IntegrationPackages`
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Authenticated request accepting JSON
    pub async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        debug!("{} {}", method, url);
        let request = self
            .http
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        self.authorize(request).await
    }

    /// Authenticated JSON request carrying the session token and cookies
    pub async fn mutation(&self, method: Method, url: Url, session: &Session) -> Result<RequestBuilder> {
        let request = self
            .request(method, url)
            .await?
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(session.apply(request))
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match &self.credentials {
            Credentials::OAuth(source) => request.bearer_auth(source.access_token(&self.http).await?),
            Credentials::Basic { username, password } => request.basic_auth(username, Some(password)),
            Credentials::Anonymous => request,
        })
    }

    /// Send a request; transport failures become [`CigError::Connection`]
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(CigError::Connection)
    }

    /// Send a request and classify non-2xx responses
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        ensure_success(self.send(request).await?).await
    }

    /// Fetch a CSRF token and the cookies bound to it
    pub async fn handshake(&self) -> Result<Session> {
        let url = self.url("/")?;
        let request = self.request(Method::GET, url).await?.header(CSRF_HEADER, "Fetch");
        let response = self.send(request).await?;

        let session = Session::from_response(&response);
        if session.csrf_token.is_empty() {
            warn!(tenant = %self.key, status = %response.status(), "handshake returned no CSRF token");
        }
        debug!(tenant = %self.key, cookies = session.cookies.len(), "CSRF handshake complete");

        Ok(session)
    }
}
