//! Portal access: profile lookups and endpoint configuration.

mod client;
pub mod config;

pub use client::{PortalClient, PortalUser};
pub use config::{load_portal_config, ConfigSource, PortalConfig, Setting};
