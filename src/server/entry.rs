//! Process entry point for a provider binary
//!
//! A provider binary only has to build its [`Registry`] and hand over:
//!
//! ```no_run
//! # async fn demo() -> std::process::ExitCode {
//! let registry = provider_harness::fixtures::builtin_registry();
//! provider_harness::server::run_from_args(std::env::args(), &registry).await
//! # }
//! ```

use crate::config::{usage, ConfigError, ProviderConfig};
use crate::registry::Registry;
use crate::server::provider::{announcement, bind_loopback, Provider};
use crate::server::shutdown::{shutdown_channel, shutdown_on_signal};
use std::io::Write;
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing::{error, info};

const DEFAULT_PROGRAM: &str = "provider-harness";

/// Install the stderr fmt subscriber, filtered by `RUST_LOG` (default `info`)
///
/// Output goes to stderr without ANSI colours so the launcher can forward it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

/// Parse `args` (including the program name), then resolve, bind, announce and serve
///
/// Returns exit code 1 on usage, configuration, resolution or bind errors and
/// 0 after a signalled shutdown.
pub async fn run_from_args<I>(args: I, registry: &Registry) -> ExitCode
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let program = args.next().unwrap_or_else(|| DEFAULT_PROGRAM.to_string());

    let config = match ProviderConfig::from_args(args) {
        Ok(config) => config,
        Err(ConfigError::Usage(_)) => {
            eprintln!("{}", usage(&program));
            return ExitCode::from(1);
        }
        Err(e) => {
            error!(error = %e, "Invalid provider configuration");
            return ExitCode::from(1);
        }
    };

    let provider = match Provider::from_registry(config, registry) {
        Ok(provider) => provider,
        Err(e) => {
            error!(error = %e, "Failed to resolve provider callables");
            return ExitCode::from(1);
        }
    };

    match serve(provider).await {
        Ok(()) => {
            info!("Provider shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Provider server failed");
            ExitCode::from(1)
        }
    }
}

async fn serve(provider: Provider) -> Result<(), std::io::Error> {
    let (controller, signal) = shutdown_channel();
    let signal_task = shutdown_on_signal(controller)?;

    let listener = bind_loopback().await?;
    let addr = listener.local_addr()?;
    announce(addr)?;

    let result = provider.serve(listener, signal).await;
    signal_task.abort();
    result
}

/// Write the startup line the launcher scrapes
fn announce(addr: SocketAddr) -> Result<(), std::io::Error> {
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "{}", announcement(addr))?;
    stderr.flush()
}
