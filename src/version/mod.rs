//! Version management layer for installed app checking
//!
//! This module provides the core functionality for parsing and comparing
//! loosely formatted app versions, storing reference versions, and fetching
//! them from GitHub.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────▶│    Cache    │◀────│   Checker   │
//! │  (GitHub)   │     │  (catalog)  │     │ (outdated?) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │   Parser    │
//!                                         │(version cmp)│
//!                                         └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: SQLite-based application catalog
//! - [`checker`]: Outdatedness classification and fleet aggregation
//! - [`parser`]: Digit-run version parsing and zero-padded comparison
//! - [`registry`]: Source trait for repositories, manifests and releases
//! - [`registries`]: Concrete source implementations (GitHub)
//! - [`error`]: Error types for catalog and source operations
//! - [`types`]: Common types like `CatalogEntry` and `Release`

pub mod cache;
pub mod checker;
pub mod error;
pub mod parser;
pub mod registries;
pub mod registry;
pub mod types;
