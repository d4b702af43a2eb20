//! A running provider process

use super::health::endpoint;
use std::process::ExitStatus;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Handle on a started provider
///
/// Dropping the session asks the process to stop (SIGINT on unix, a forced
/// kill elsewhere) without waiting for it to exit.
pub struct ProviderSession {
    child: Child,
    base_url: Url,
    forwarders: Vec<JoinHandle<()>>,
    terminated: bool,
}

impl ProviderSession {
    pub(crate) fn new(child: Child, base_url: Url, forwarders: Vec<JoinHandle<()>>) -> Self {
        Self {
            child,
            base_url,
            forwarders,
            terminated: false,
        }
    }

    /// Base URL the provider announced, e.g. `http://127.0.0.1:41234`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of a route on this provider
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        endpoint(&self.base_url, path)
    }

    /// OS process id, `None` once the process has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Signal the process to stop without waiting
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        info!(url = %self.base_url, "Stopping provider");
        terminate(&mut self.child);
    }

    /// Signal the process and wait for it to exit
    ///
    /// Output forwarding runs until the process closes its pipes.
    pub async fn shutdown(mut self) -> std::io::Result<ExitStatus> {
        self.terminate();
        let status = self.child.wait().await;
        for forwarder in self.forwarders.drain(..) {
            let _ = forwarder.await;
        }
        status
    }
}

impl Drop for ProviderSession {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Ask `child` to stop: SIGINT where available, otherwise a forced kill
#[cfg(unix)]
pub(crate) fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        debug!("Provider already exited");
        return;
    };
    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "Provider pid out of range, killing instead");
        let _ = child.start_kill();
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGINT) {
        warn!(pid, error = %e, "Failed to send SIGINT to provider");
    }
}

#[cfg(not(unix))]
pub(crate) fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to kill provider");
    }
}
