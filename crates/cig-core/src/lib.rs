//! Cloud Integration engine
//!
//! Client-side engine for the design-time API of a cloud integration
//! tenant: flow and package operations, configuration updates and the
//! cross-tenant flow transport.
//!
//! ## Features
//!
//! - **Sessions**: OAuth client-credentials or basic auth, CSRF handshake
//! - **Flows**: inspect, download, create, update, deploy
//! - **Configurations**: `$batch` and per-parameter updates
//! - **Archive rewrite**: renames a flow inside its zip archive
//! - **Transport**: moves a flow between tenants, creating or updating
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        transport                             │
//! │   inspect → download → adjust identity → probe → publish     │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │
//! │  │   flow    │  │  package  │  │   batch   │  │  archive  │  │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └───────────┘  │
//! │        └──────────────┼──────────────┘                       │
//! │                 ┌─────┴─────┐  ┌───────────┐                 │
//! │                 │  session  │──│   error   │                 │
//! │                 └───────────┘  └───────────┘                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entry point takes an already resolved [`TenantConfig`]; nothing in
//! this crate looks for configuration files on its own.

pub mod archive;
pub mod batch;
pub mod config;
pub mod error;
pub mod flow;
pub mod model;
pub mod package;
pub mod session;
pub mod transport;

pub use batch::{update_configurations, BatchRequest};
pub use config::{AuthKind, Authorization, ConfigFile, TenantConfig};
pub use error::{CigError, Result};
pub use model::{
    ConfigurationParameter, FlowConfiguration, IntegrationFlow, IntegrationPackage, ACTIVE_VERSION,
};
pub use session::{Session, TenantClient};
pub use transport::{copy_flow, transport_flow, Destination, Published, TransportOptions, TransportOutcome};
