//! Tenant configuration
//!
//! A configuration file lists the tenants the tool can talk to and names the
//! active one. Engine entry points never read files themselves: they take an
//! already resolved [`TenantConfig`].

use crate::{CigError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Authorization scheme of a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthKind {
    /// OAuth 2.0 client credentials
    OAuth,
    /// HTTP basic authentication
    Basic,
    /// Anything else; requests go out without credentials
    Other(String),
}

impl From<String> for AuthKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "oauth" => AuthKind::OAuth,
            "basic" => AuthKind::Basic,
            _ => AuthKind::Other(value),
        }
    }
}

impl From<AuthKind> for String {
    fn from(kind: AuthKind) -> Self {
        match kind {
            AuthKind::OAuth => "oauth".into(),
            AuthKind::Basic => "basic".into(),
            AuthKind::Other(s) => s,
        }
    }
}

/// No type given: requests go out without credentials
impl Default for AuthKind {
    fn default() -> Self {
        AuthKind::Other(String::new())
    }
}

/// Credentials of a tenant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(rename = "type", alias = "Type", default)]
    pub kind: AuthKind,
    #[serde(alias = "Username", default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(alias = "Password", default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(alias = "ClientID", default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(alias = "ClientSecret", default, skip_serializing_if = "String::is_empty")]
    pub client_secret: String,
    #[serde(alias = "TokenURL", default, skip_serializing_if = "String::is_empty")]
    pub token_url: String,
}

impl Authorization {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: AuthKind::Basic,
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn oauth(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            kind: AuthKind::OAuth,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: token_url.into(),
            ..Default::default()
        }
    }
}

/// One tenant of the integration platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(alias = "Key")]
    pub key: String,
    #[serde(alias = "ApiURL")]
    pub api_url: String,
    #[serde(alias = "Authorization", default)]
    pub authorization: Authorization,
}

impl TenantConfig {
    pub fn new(key: impl Into<String>, api_url: impl Into<String>, authorization: Authorization) -> Self {
        Self {
            key: key.into(),
            api_url: api_url.into(),
            authorization,
        }
    }
}

/// Configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(alias = "ActiveTenantKey", default)]
    pub active_tenant_key: String,
    #[serde(alias = "Tenants", default)]
    pub tenants: Vec<TenantConfig>,
}

impl ConfigFile {
    /// Load from a `.toml` or `.json` file, chosen by extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_toml(&content)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CigError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CigError::Config(e.to_string()))
    }

    /// Look up a tenant, falling back to the active tenant key
    pub fn tenant(&self, key: Option<&str>) -> Result<TenantConfig> {
        let key = key.unwrap_or(&self.active_tenant_key);
        if key.is_empty() {
            return Err(CigError::Config("no tenant key given and no active tenant set".into()));
        }

        let tenant = self
            .tenants
            .iter()
            .find(|t| t.key == key)
            .ok_or_else(|| CigError::Config(format!("tenant '{}' not found", key)))?;

        if tenant.api_url.is_empty() {
            return Err(CigError::Config(format!("tenant '{}' has no api_url", key)));
        }

        Ok(tenant.clone())
    }

    /// Template written by `generate-config`
    pub fn template() -> Self {
        Self {
            active_tenant_key: "dev".into(),
            tenants: vec![
                TenantConfig::new(
                    "dev",
                    "https://dev-tenant.example.com/api/v1",
                    Authorization::oauth(
                        "client-id",
                        "client-secret",
                        "https://dev-tenant.authentication.example.com/oauth/token",
                    ),
                ),
                TenantConfig::new(
                    "qa",
                    "https://qa-tenant.example.com/api/v1",
                    Authorization::basic("user", "password"),
                ),
            ],
        }
    }
}
