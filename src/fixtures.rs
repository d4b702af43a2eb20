//! Callables compiled into the `provider-harness` binary
//!
//! | name                       | kind           | behaviour                          |
//! |----------------------------|----------------|------------------------------------|
//! | `fixtures.hello`           | handler        | `hello` as `text/plain`            |
//! | `fixtures.boom`            | handler        | fails with `boom`                  |
//! | `products.product_event`   | handler        | product event for the last state   |
//! | `products.given`           | state provider | records the state for the handler  |

use crate::products;
use crate::registry::{Message, Registry};

/// Module name of the simple fixtures
pub const MODULE: &str = "fixtures";

pub fn hello() -> anyhow::Result<Message> {
    Ok(Message::new("hello", "text/plain"))
}

pub fn boom() -> anyhow::Result<Message> {
    anyhow::bail!("boom")
}

/// Registry with every built-in callable
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_handler(MODULE, "hello", hello)
        .register_handler(MODULE, "boom", boom);
    products::register(&mut registry);
    registry
}
