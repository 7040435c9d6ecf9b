//! Output formatting

use anyhow::Result;
use cig_core::{FlowConfiguration, IntegrationFlow, IntegrationPackage};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Print `data` as JSON/YAML, or as a table of `R` rows
    pub fn print<T, R>(&self, data: &[T]) -> Result<()>
    where
        T: Serialize,
        R: Tabled + for<'a> From<&'a T>,
    {
        println!("{}", self.render::<T, R>(data)?);
        Ok(())
    }

    pub fn render<T, R>(&self, data: &[T]) -> Result<String>
    where
        T: Serialize,
        R: Tabled + for<'a> From<&'a T>,
    {
        Ok(match self {
            OutputFormat::Json => serde_json::to_string_pretty(data)?,
            OutputFormat::Yaml => serde_yaml::to_string(data)?,
            OutputFormat::Table => Table::new(data.iter().map(|item| R::from(item)))
                .with(Style::rounded())
                .to_string(),
        })
    }

    /// Single entity; JSON/YAML print the object itself rather than a list
    pub fn print_one<T, R>(&self, item: &T) -> Result<()>
    where
        T: Serialize,
        R: Tabled + for<'a> From<&'a T>,
    {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item)?),
            OutputFormat::Yaml => println!("{}", serde_yaml::to_string(item)?),
            OutputFormat::Table => self.print::<T, R>(std::slice::from_ref(item))?,
        }
        Ok(())
    }
}

pub fn success(message: &str) {
    println!("{}", message.green());
}

pub fn notice(message: &str) {
    println!("{}", message.yellow());
}

// =============================================================================
// Table rows
// =============================================================================

#[derive(Tabled)]
pub struct PackageRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Modified By")]
    modified_by: String,
}

impl From<&IntegrationPackage> for PackageRow {
    fn from(p: &IntegrationPackage) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            version: p.version.clone(),
            vendor: p.vendor.clone(),
            modified_by: p.modified_by.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct FlowRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Package")]
    package_id: String,
    #[tabled(rename = "Modified By")]
    modified_by: String,
}

impl From<&IntegrationFlow> for FlowRow {
    fn from(f: &IntegrationFlow) -> Self {
        Self {
            id: f.id.clone(),
            name: f.name.clone(),
            version: f.version.clone(),
            package_id: f.package_id.clone(),
            modified_by: f.modified_by.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct ConfigurationRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Type")]
    data_type: String,
}

impl From<&FlowConfiguration> for ConfigurationRow {
    fn from(c: &FlowConfiguration) -> Self {
        Self {
            key: c.parameter_key.clone(),
            value: c.parameter_value.clone(),
            data_type: c.data_type.clone(),
        }
    }
}
