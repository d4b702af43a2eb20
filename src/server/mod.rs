//! The provider process
//!
//! Serves the ping, produce-message and set-state routes over callables
//! resolved from a [`crate::registry::Registry`], and shuts down gracefully on
//! SIGINT/SIGTERM.

pub mod entry;
pub mod provider;
pub mod shutdown;

pub use entry::{init_tracing, run_from_args};
pub use provider::{
    announcement, bind_loopback, Provider, ANNOUNCEMENT_PREFIX, METADATA_HEADER, PING_RESPONSE,
    STATE_SET_RESPONSE,
};
pub use shutdown::{
    shutdown_channel, shutdown_on_signal, ShutdownController, ShutdownSignal, SignalListener,
};

#[cfg(test)]
#[path = "provider_test.rs"]
mod provider_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
