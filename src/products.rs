//! Product events published to the `products` topic
//!
//! This is the message domain of the Kafka example: every change to a product
//! is published as a [`ProductEvent`] with an incremented version. The
//! [`ProductFixture`] exposes it to the provider, choosing which event to
//! produce from the last provider state it was given.

use crate::registry::{Message, MessageHandler, Registry, StateProvider};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Topic product events are published to
pub const PRODUCTS_TOPIC: &str = "products";

/// Module name the fixture registers under
pub const MODULE: &str = "products";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("invalid product version '{0}', expected v<number>")]
    InvalidVersion(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEvent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub event: EventType,
}

/// Build the event for a product change, bumping its version
///
/// A product without an id gets a fresh UUID.
pub fn create_event(product: Product, event: EventType) -> Result<ProductEvent, ProductError> {
    let version = increment_version(product.version.as_deref())?;
    Ok(ProductEvent {
        id: product
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: product.name,
        kind: product.kind,
        version,
        event,
    })
}

/// `v<n>` becomes `v<n+1>`; no version becomes `v1`
pub fn increment_version(version: Option<&str>) -> Result<String, ProductError> {
    let Some(version) = version else {
        return Ok("v1".to_string());
    };
    let number = version
        .strip_prefix('v')
        .and_then(|n| n.parse::<u32>().ok())
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| ProductError::InvalidVersion(version.to_string()))?;
    Ok(format!("v{}", number))
}

/// Metadata attached to every product message
pub fn message_metadata() -> String {
    json!({ "kafka_topic": PRODUCTS_TOPIC }).to_string()
}

/// The product every fixture state refers to
pub fn sample_product() -> Product {
    Product {
        id: Some("some-uuid-1234-5678".to_string()),
        name: "Some Product".to_string(),
        kind: "Product Range".to_string(),
        version: Some("v1".to_string()),
    }
}

/// Map a provider state description to the event it expects
pub fn event_for_state(state: &str) -> Option<EventType> {
    match state {
        "a product event create" | "a product created event" => Some(EventType::Created),
        "a product event update" | "a product updated event" => Some(EventType::Updated),
        "a product event delete" | "a product deleted event" => Some(EventType::Deleted),
        _ => None,
    }
}

/// Handler and state provider over the product event domain
#[derive(Debug, Default)]
pub struct ProductFixture {
    state: Mutex<Option<String>>,
}

impl ProductFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last state received, if any
    pub fn current_state(&self) -> Option<String> {
        self.lock().clone()
    }

    // Recovers a poisoned lock
    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateProvider for ProductFixture {
    fn set_state(&self, state: Option<&str>) -> anyhow::Result<()> {
        *self.lock() = state.map(str::to_string);
        Ok(())
    }
}

impl MessageHandler for ProductFixture {
    fn produce(&self) -> anyhow::Result<Message> {
        let state = self
            .current_state()
            .ok_or_else(|| anyhow::anyhow!("no provider state set"))?;
        let event_type = event_for_state(&state)
            .ok_or_else(|| anyhow::anyhow!("unknown provider state: {}", state))?;

        let event = create_event(sample_product(), event_type)?;
        let body = serde_json::to_vec(&event)?;
        Ok(Message::new(body, "application/json").with_metadata(message_metadata()))
    }
}

/// Register `products.product_event` and `products.given` sharing one fixture
pub fn register(registry: &mut Registry) -> Arc<ProductFixture> {
    let fixture = Arc::new(ProductFixture::new());
    registry
        .register_handler_arc(MODULE, "product_event", fixture.clone())
        .register_state_provider_arc(MODULE, "given", fixture.clone());
    fixture
}

#[cfg(test)]
#[path = "products_test.rs"]
mod tests;
