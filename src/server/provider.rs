//! The message provider HTTP service
//!
//! - `GET /_test/ping` - Liveness probe, always `pong`
//! - `POST <produce_message_url>` - Produce a message through the handler
//! - `POST <set_provider_state_url>?state=..` - Forward a provider state
//!
//! Handler and state provider failures never escape a route: they become a
//! 500 response carrying the error text.

use crate::config::{ProviderConfig, PING_PATH};
use crate::registry::{Message, MessageHandler, Registry, RegistryError, StateProvider};
use crate::server::shutdown::ShutdownSignal;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Body returned by the liveness route
pub const PING_RESPONSE: &str = "pong";

/// Body returned after a provider state is set
pub const STATE_SET_RESPONSE: &str = "Provider state set";

/// Response header carrying base64-encoded message metadata
pub const METADATA_HEADER: &str = "pact-message-metadata";

/// Prefix of the startup line the launcher scrapes from stderr
pub const ANNOUNCEMENT_PREFIX: &str = " * Running on ";

/// Callables shared by the routes
#[derive(Clone)]
struct RouteState {
    handler: Arc<dyn MessageHandler>,
    state_provider: Option<Arc<dyn StateProvider>>,
}

/// A configured provider, ready to bind and serve
pub struct Provider {
    config: ProviderConfig,
    state: RouteState,
}

impl Provider {
    pub fn new(
        config: ProviderConfig,
        handler: Arc<dyn MessageHandler>,
        state_provider: Option<Arc<dyn StateProvider>>,
    ) -> Self {
        Self {
            config,
            state: RouteState {
                handler,
                state_provider,
            },
        }
    }

    /// Resolve the configured callables against `registry`
    pub fn from_registry(
        config: ProviderConfig,
        registry: &Registry,
    ) -> Result<Self, RegistryError> {
        let handler = registry.resolve_handler(&config.handler)?;
        let state_provider = config
            .state_provider
            .as_ref()
            .map(|callable| registry.resolve_state_provider(callable))
            .transpose()?;
        Ok(Self::new(config, handler, state_provider))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the router for the three provider routes
    pub fn router(&self) -> Router {
        Router::new()
            .route(PING_PATH, get(ping))
            .route(&self.config.produce_message_url, post(produce_message))
            .route(&self.config.set_provider_state_url, post(set_provider_state))
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` fires
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let app = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!(
                addr = %addr,
                handler = %self.config.handler,
                produce = %self.config.produce_message_url,
                set_state = %self.config.set_provider_state_url,
                "Provider serving"
            );
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let reason = shutdown.wait().await.unwrap_or("controller dropped");
                info!(reason, "Draining in-flight requests");
            })
            .await
    }
}

/// Bind a loopback listener on an OS-assigned port
///
/// The listener keeps the port, so nothing can claim it between selection and
/// serving.
pub async fn bind_loopback() -> Result<TcpListener, std::io::Error> {
    TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
}

/// Base URL for a bound address
pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// The startup line announcing the provider's base URL
pub fn announcement(addr: SocketAddr) -> String {
    format!("{}{}", ANNOUNCEMENT_PREFIX, base_url(addr))
}

async fn ping() -> &'static str {
    PING_RESPONSE
}

async fn produce_message(State(state): State<RouteState>, body: Bytes) -> Response {
    let description = description_from_body(&body);
    debug!(description = ?description, "Produce message requested");

    let result = call_user(move || {
        if let Some(provider) = &state.state_provider {
            provider.set_state(description.as_deref())?;
        }
        state.handler.produce()
    })
    .await;

    match result {
        Ok(message) => message_response(message),
        Err(text) => {
            warn!(error = %text, "Message handler failed");
            (StatusCode::INTERNAL_SERVER_ERROR, text).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SetStateQuery {
    state: String,
}

async fn set_provider_state(
    State(state): State<RouteState>,
    Query(query): Query<SetStateQuery>,
) -> Response {
    debug!(state = %query.state, "Provider state requested");

    if let Some(provider) = state.state_provider {
        let result = call_user(move || provider.set_state(Some(&query.state))).await;
        if let Err(text) = result {
            warn!(error = %text, "State provider failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, text).into_response();
        }
    }

    (StatusCode::OK, STATE_SET_RESPONSE).into_response()
}

/// Extract `description` from a produce request body
///
/// A missing body, malformed JSON or a non-string description all yield `None`.
fn description_from_body(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn message_response(message: Message) -> Response {
    let content_type = match HeaderValue::from_str(&message.content_type) {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("invalid content type '{}': {}", message.content_type, e),
            )
                .into_response()
        }
    };

    let mut response = (StatusCode::OK, message.body).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);

    if let Some(metadata) = message.metadata.filter(|m| !m.is_empty()) {
        // Base64 output is always a valid header value
        if let Ok(value) = HeaderValue::from_str(&STANDARD.encode(metadata)) {
            headers.insert(HeaderName::from_static(METADATA_HEADER), value);
        }
    }

    response
}

/// Run a user callable on the blocking pool, flattening errors and panics to text
async fn call_user<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => Err(panic_message(e.into_panic())),
        Err(e) => Err(e.to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(text) => *text,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(text) => text.to_string(),
            Err(_) => "handler panicked".to_string(),
        },
    }
}
