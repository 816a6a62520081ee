//! Source implementations for fetching application metadata

pub mod github;

pub use github::GitHubRegistry;
