use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::checker::Installed;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Failed to read inventory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid inventory {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Snapshot of every customer's environments and installed apps
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Inventory {
    pub customers: Vec<Customer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

/// A Business Central environment of a tenant
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub kind: EnvironmentKind,
    #[serde(default)]
    pub installed_apps: Vec<InstalledApp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    #[default]
    Production,
    Sandbox,
}

/// An app installed in an environment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub app_id: String,
    pub name: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl Installed for InstalledApp {
    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl Installed for &InstalledApp {
    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl Inventory {
    /// Read an inventory from a JSON file
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| InventoryError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Every environment paired with its customer
    pub fn environments(&self) -> impl Iterator<Item = (&Customer, &Environment)> {
        self.customers.iter().flat_map(|customer| {
            customer
                .environments
                .iter()
                .map(move |environment| (customer, environment))
        })
    }

    /// Every installed app across all environments
    pub fn installations(&self) -> impl Iterator<Item = &InstalledApp> {
        self.environments()
            .flat_map(|(_, environment)| environment.installed_apps.iter())
    }

    /// Look up an environment by customer and environment name (case-insensitive)
    pub fn find_environment(&self, customer: &str, environment: &str) -> Option<&Environment> {
        self.environments()
            .find(|(c, e)| {
                c.name.eq_ignore_ascii_case(customer) && e.name.eq_ignore_ascii_case(environment)
            })
            .map(|(_, e)| e)
    }
}
