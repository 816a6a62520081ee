pub mod config;
pub mod environment;
pub mod logging;
pub mod sync;
pub mod version;
