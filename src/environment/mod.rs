//! Customer environments and their installed apps
//!
//! - [`types`]: Inventory model loaded from JSON
//! - [`diff`]: Comparison of installed apps across environments

pub mod diff;
pub mod types;

pub use diff::{ComparisonRow, EnvironmentComparison, RowStatus, compare_environments};
pub use types::{Customer, Environment, EnvironmentKind, InstalledApp, Inventory, InventoryError};
