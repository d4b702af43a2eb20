//! Graceful shutdown for the provider process
//!
//! The launcher stops the provider with SIGINT (or a forced kill where that
//! signal does not exist). The provider turns the OS signal into a
//! [`ShutdownSignal`] so axum can drain in-flight requests before exiting.

use tokio::sync::watch;
use tracing::info;

/// Receiving side of the shutdown channel
///
/// Holds `None` until a stop is requested, then the reason for it.
pub struct ShutdownSignal {
    receiver: watch::Receiver<Option<&'static str>>,
}

impl ShutdownSignal {
    /// Wait for a stop request and return its reason
    ///
    /// Returns `None` if the controller is dropped without requesting one.
    pub async fn wait(&mut self) -> Option<&'static str> {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        }
    }
}

/// Sending side of the shutdown channel
pub struct ShutdownController {
    sender: watch::Sender<Option<&'static str>>,
}

impl ShutdownController {
    /// Request a stop; later requests keep the first reason
    pub fn shutdown(&self, reason: &'static str) {
        let first = self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if first {
            info!(reason, "Provider shutdown requested");
        }
    }
}

pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(None);
    (ShutdownController { sender }, ShutdownSignal { receiver })
}

/// Registered OS termination signals
///
/// Handlers are installed on construction, so a signal that arrives before
/// anyone awaits [`SignalListener::recv`] is still observed.
pub struct SignalListener {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl SignalListener {
    /// Install SIGINT and SIGTERM handlers
    #[cfg(unix)]
    pub fn register() -> Result<Self, std::io::Error> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> Result<Self, std::io::Error> {
        Ok(Self {})
    }

    /// Wait for the next termination signal and return its name
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to wait for Ctrl+C");
            std::future::pending::<()>().await;
        }
        "CTRL_C"
    }
}

/// Trigger `controller` once a termination signal arrives
///
/// Handlers are registered before this returns.
pub fn shutdown_on_signal(
    controller: ShutdownController,
) -> Result<tokio::task::JoinHandle<()>, std::io::Error> {
    let mut listener = SignalListener::register()?;
    Ok(tokio::spawn(async move {
        controller.shutdown(listener.recv().await);
    }))
}
