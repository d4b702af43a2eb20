//! Message provider harness for contract tests
//!
//! - [`server`] - the provider process: ping, produce-message and set-state routes
//! - [`launcher`] - start a provider process, wait for it, stop it on drop
//! - [`registry`] - typed handlers and state providers, resolved by name
//! - [`config`] - positional configuration shared by both sides

pub mod config;
pub mod fixtures;
pub mod launcher;
pub mod products;
pub mod registry;
pub mod server;

pub use config::{CallableRef, ConfigError, ProviderConfig};
pub use launcher::{
    start_provider, with_provider, HealthCheck, LaunchOptions, ProviderSession, StartupError,
};
pub use registry::{Message, MessageHandler, Registry, RegistryError, StateProvider};
