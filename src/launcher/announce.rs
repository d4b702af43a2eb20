//! Provider output handling
//!
//! stderr is scanned for the ` * Running on <url>` startup line; both streams
//! are forwarded to `tracing` until the process closes them.

use crate::server::ANNOUNCEMENT_PREFIX;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

/// Result of watching stderr during startup
#[derive(Debug)]
pub(crate) enum Startup {
    Announced(Url),
    /// stderr closed without an announcement; carries every line seen
    Closed(Vec<String>),
}

/// Extract the base URL from a provider startup line
///
/// Returns `None` for any other line, or if the announced URL does not parse.
pub fn parse_announcement(line: &str) -> Option<Url> {
    let rest = line.strip_prefix(ANNOUNCEMENT_PREFIX)?;
    let raw = rest.split(' ').next()?.trim_end();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(line = %line, error = %e, "Ignoring malformed startup line");
            None
        }
    }
}

/// Scan stderr for the startup line, then keep forwarding it
pub(crate) async fn watch_stderr<R>(stderr: R, startup: oneshot::Sender<Startup>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    let mut startup = Some(startup);
    let mut captured = Vec::new();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Provider stderr closed");
                break;
            }
        };

        if startup.is_some() {
            if let Some(url) = parse_announcement(&line) {
                if let Some(sender) = startup.take() {
                    let _ = sender.send(Startup::Announced(url));
                }
            } else {
                captured.push(line.clone());
            }
        }
        debug!("Provider stderr: {}", line.trim_end());
    }

    if let Some(sender) = startup {
        let _ = sender.send(Startup::Closed(captured));
    }
}

/// Forward stdout lines until the stream closes
pub(crate) async fn forward_stdout<R>(stdout: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("Provider stdout: {}", line.trim_end());
    }
}
