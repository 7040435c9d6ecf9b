//! Cloud Integration CLI
//!
//! Command-line interface for the design-time API of cloud integration
//! tenants.
//!
//! # Usage
//!
//! ```bash
//! cig package ls
//! cig flow inspect PurchaseOrder --format json
//! cig flow update-configs PurchaseOrder -p Key=APIKey,Value=abc
//! cig flow transport PurchaseOrder PurchaseOrder -d qa
//! cig generate-config -o ~/.cig/config.toml
//! ```

use cig_core::{ConfigurationParameter, ACTIVE_VERSION};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "cig")]
#[command(version)]
#[command(about = "Cloud Integration Command Line Interface", long_about = None)]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(long, global = true, env = "CIG_CONFIG")]
    config: Option<PathBuf>,

    /// Tenant key; defaults to the active tenant of the configuration file
    #[arg(long, short = 't', global = true, env = "CIG_TENANT")]
    tenant_key: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// More log output (-v info, -vv debug)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Integration packages
    Package {
        #[command(subcommand)]
        action: PackageCommands,
    },
    /// Integration flows
    Flow {
        #[command(subcommand)]
        action: FlowCommands,
    },
    /// Flow resources
    Resource {
        #[command(subcommand)]
        action: ResourceCommands,
    },
    /// Write a configuration template
    GenerateConfig {
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum PackageCommands {
    /// List all packages
    #[command(alias = "list")]
    Ls,
    /// Get package details
    Inspect { id: String },
    /// List the flows of a package
    Flows { id: String },
    /// Download the package archive
    Download {
        id: String,
        /// Target file, defaults to <id>.zip
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum FlowCommands {
    /// Get flow details
    Inspect {
        id: String,
        #[arg(long = "version", default_value = ACTIVE_VERSION)]
        flow_version: String,
    },
    /// Download the flow archive
    Download {
        id: String,
        /// Target file, defaults to <id>.zip
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long = "version", default_value = ACTIVE_VERSION)]
        flow_version: String,
    },
    /// Create a flow, empty unless an archive is given
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        package_id: String,
        /// Flow archive (.zip)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Update a flow's name and optionally its content
    Update {
        id: String,
        #[arg(long)]
        name: String,
        /// Flow archive (.zip)
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long = "version", default_value = ACTIVE_VERSION)]
        flow_version: String,
    },
    /// Deploy a flow
    Deploy {
        id: String,
        #[arg(long = "version", default_value = ACTIVE_VERSION)]
        flow_version: String,
    },
    /// Show configuration parameters
    #[command(aliases = ["configs", "c"])]
    Configurations {
        id: String,
        /// Write the parameters as JSON instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long = "version", default_value = ACTIVE_VERSION)]
        flow_version: String,
    },
    /// Update configuration parameters
    UpdateConfigs {
        id: String,
        /// Parameter as Key=key1,Value=value1
        #[arg(short = 'p', long = "parameter", value_parser = commands::flow::parse_parameter)]
        parameters: Vec<ConfigurationParameter>,
        /// JSON file in the format written by `flow configurations -o`
        #[arg(short = 'i', long)]
        input_file: Option<PathBuf>,
        /// One request per parameter instead of a single $batch call
        #[arg(long)]
        no_batch: bool,
    },
    /// Copy a flow within the tenant
    Copy {
        src_flow_id: String,
        dest_flow_id: String,
        #[arg(long)]
        dest_flow_name: Option<String>,
        #[arg(long)]
        dest_package_id: Option<String>,
    },
    /// Transport a flow to another tenant
    Transport {
        src_flow_id: String,
        dest_flow_id: String,
        /// Destination tenant key
        #[arg(short = 'd', long)]
        dest_tenant_key: String,
        #[arg(short = 'n', long)]
        dest_flow_name: Option<String>,
        #[arg(short = 'p', long)]
        dest_package_id: Option<String>,
        /// Abort when the destination lookup fails for any reason but a
        /// missing flow
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum ResourceCommands {
    /// Replace a resource of a flow
    Update {
        flow_id: String,
        #[arg(long)]
        file: PathBuf,
        /// Resource type, e.g. groovy, xslt, mmap
        #[arg(long = "type")]
        resource_type: String,
        /// Resource name, defaults to the file name
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "version", default_value = ACTIVE_VERSION)]
        flow_version: String,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = config::Settings::new(cli.config, cli.tenant_key);

    let result = match cli.command {
        Commands::Package { action } => commands::package::handle(action, &settings, cli.format).await,
        Commands::Flow { action } => commands::flow::handle(action, &settings, cli.format).await,
        Commands::Resource { action } => commands::resource::handle(action, &settings).await,
        Commands::GenerateConfig { output } => commands::generate::handle(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
