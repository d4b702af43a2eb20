//! Readiness polling against the provider's ping route

use super::StartupError;
use crate::config::PING_PATH;
use crate::server::PING_RESPONSE;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Ping budget: `attempts` tries, each bounded by `timeout`, `interval` apart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub attempts: u32,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            attempts: 50,
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(1),
        }
    }
}

/// Join an absolute route path onto a base URL, keeping any base path
pub fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

/// Poll the ping route until it answers exactly `pong`
///
/// Connection errors and unexpected bodies are retried until the attempt
/// budget runs out.
pub async fn wait_until_healthy(base: &Url, check: &HealthCheck) -> Result<(), StartupError> {
    let url = endpoint(base, PING_PATH)?;
    let client = reqwest::Client::builder()
        .timeout(check.timeout)
        .no_proxy()
        .build()?;

    for attempt in 1..=check.attempts {
        match client.get(url.clone()).send().await {
            Ok(response) => match response.text().await {
                Ok(body) if body == PING_RESPONSE => {
                    debug!(url = %url, attempt, "Provider answered ping");
                    return Ok(());
                }
                Ok(body) => debug!(attempt, body = %body, "Unexpected ping response"),
                Err(e) => debug!(attempt, error = %e, "Failed to read ping response"),
            },
            Err(e) => debug!(attempt, error = %e, "Ping failed"),
        }
        tokio::time::sleep(check.interval).await;
    }

    Err(StartupError::HealthCheckFailed {
        url,
        attempts: check.attempts,
    })
}
