//! Launch a provider process for the duration of a test
//!
//! [`start_provider`] spawns the provider binary, waits for its startup line,
//! confirms the ping route answers and hands back a [`ProviderSession`].
//! Dropping the session signals the process to stop.

mod announce;
mod health;
mod session;

pub use announce::parse_announcement;
pub use health::{endpoint, wait_until_healthy, HealthCheck};
pub use session::ProviderSession;

use crate::config::ProviderConfig;
use announce::{forward_stdout, watch_stderr, Startup};
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use url::Url;

/// Default time allowed for the provider to announce its address
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for exit status or captured stderr once startup has failed
const EXIT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to spawn provider '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("provider process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("provider process exited ({status}) before announcing its address")]
    ExitedBeforeAnnouncing { status: String, stderr: String },

    #[error("provider did not announce its address within {0:?}")]
    AnnouncementTimeout(Duration),

    #[error("invalid provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build health check client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to ping provider at {url} after {attempts} attempts")]
    HealthCheckFailed { url: Url, attempts: u32 },
}

/// How to start one provider process
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub program: PathBuf,
    pub config: ProviderConfig,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub startup_timeout: Duration,
    pub health: HealthCheck,
}

impl LaunchOptions {
    pub fn new(program: impl Into<PathBuf>, config: ProviderConfig) -> Self {
        Self {
            program: program.into(),
            config,
            current_dir: None,
            env: Vec::new(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            health: HealthCheck::default(),
        }
    }

    /// Defaults, overridden by environment variables:
    /// - PROVIDER_HARNESS_STARTUP_TIMEOUT_SECS: announcement timeout in seconds
    /// - PROVIDER_HARNESS_HEALTH_ATTEMPTS: number of ping attempts
    pub fn from_env(program: impl Into<PathBuf>, config: ProviderConfig) -> Self {
        let mut options = Self::new(program, config);
        options.startup_timeout = Duration::from_secs(env_override(
            std::env::var("PROVIDER_HARNESS_STARTUP_TIMEOUT_SECS").ok(),
            DEFAULT_STARTUP_TIMEOUT.as_secs(),
        ));
        options.health.attempts = env_override(
            std::env::var("PROVIDER_HARNESS_HEALTH_ATTEMPTS").ok(),
            options.health.attempts,
        );
        options
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_health_check(mut self, health: HealthCheck) -> Self {
        self.health = health;
        self
    }
}

/// Parse an environment override, keeping `default` when unset or invalid
fn env_override<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Start a provider process and wait until it is serving
///
/// Fails without retrying if the process exits before announcing its address,
/// does not announce within the startup timeout, or never answers the ping
/// route. The process is signalled to stop on every failure path.
pub async fn start_provider(options: LaunchOptions) -> Result<ProviderSession, StartupError> {
    let args = options.config.to_args();
    debug!(
        program = %options.program.display(),
        handler = %options.config.handler,
        produce_message_url = %options.config.produce_message_url,
        state_provider = ?options.config.state_provider.as_ref().map(ToString::to_string),
        set_provider_state_url = %options.config.set_provider_state_url,
        "Launching provider"
    );

    let mut command = Command::new(&options.program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &options.current_dir {
        command.current_dir(dir);
    }
    command.envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let mut child = command.spawn().map_err(|source| StartupError::Spawn {
        program: options.program.display().to_string(),
        source,
    })?;

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        (None, _) => {
            session::terminate(&mut child);
            return Err(StartupError::MissingPipe("stdout"));
        }
        (_, None) => {
            session::terminate(&mut child);
            return Err(StartupError::MissingPipe("stderr"));
        }
    };

    let (startup_tx, startup_rx) = oneshot::channel();
    let forwarders = vec![
        tokio::spawn(forward_stdout(stdout)),
        tokio::spawn(watch_stderr(stderr, startup_tx)),
    ];

    let base_url =
        match wait_for_announcement(&mut child, startup_rx, options.startup_timeout).await {
            Ok(url) => url,
            Err(e) => {
                session::terminate(&mut child);
                return Err(e);
            }
        };
    debug!(url = %base_url, "Provider announced its address");

    // From here on, dropping the session signals the child
    let session = ProviderSession::new(child, base_url, forwarders);
    wait_until_healthy(session.base_url(), &options.health).await?;

    info!(url = %session.base_url(), pid = ?session.pid(), "Provider started");
    Ok(session)
}

/// Run `f` with the URL of a freshly started provider, stopping it afterwards
///
/// The provider is signalled even if `f` panics.
pub async fn with_provider<F, Fut, T>(options: LaunchOptions, f: F) -> Result<T, StartupError>
where
    F: FnOnce(Url) -> Fut,
    Fut: Future<Output = T>,
{
    let session = start_provider(options).await?;
    let output = f(session.base_url().clone()).await;
    drop(session);
    Ok(output)
}

enum Outcome {
    Startup(Result<Startup, oneshot::error::RecvError>),
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
}

/// Wait for the first of: announcement, process exit, timeout
async fn wait_for_announcement(
    child: &mut Child,
    mut startup_rx: oneshot::Receiver<Startup>,
    timeout: Duration,
) -> Result<Url, StartupError> {
    let outcome = tokio::select! {
        startup = &mut startup_rx => Outcome::Startup(startup),
        status = child.wait() => Outcome::Exited(status),
        _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
    };

    let (status, captured) = match outcome {
        Outcome::Startup(Ok(Startup::Announced(url))) => return Ok(url),
        Outcome::TimedOut => {
            error!(timeout = ?timeout, "Provider did not announce its address");
            return Err(StartupError::AnnouncementTimeout(timeout));
        }
        Outcome::Startup(Ok(Startup::Closed(captured))) => {
            // stderr closed first; the exit status follows shortly
            let status = tokio::time::timeout(EXIT_GRACE, child.wait()).await;
            (status.ok().and_then(Result::ok), captured)
        }
        Outcome::Startup(Err(_)) => (None, Vec::new()),
        Outcome::Exited(status) => {
            let captured = match tokio::time::timeout(EXIT_GRACE, startup_rx).await {
                Ok(Ok(Startup::Closed(captured))) => captured,
                Ok(Ok(Startup::Announced(url))) => {
                    // Announced and died in the same instant
                    debug!(url = %url, "Provider announced after exiting");
                    Vec::new()
                }
                _ => Vec::new(),
            };
            (status.ok(), captured)
        }
    };

    let status = status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown status".to_string());
    let stderr = captured.join("\n");
    error!(status = %status, "Provider process exited before announcing its address");
    error!("Provider stderr: {}", stderr);

    Err(StartupError::ExitedBeforeAnnouncing { status, stderr })
}

#[cfg(test)]
#[path = "launcher_test.rs"]
mod tests;
