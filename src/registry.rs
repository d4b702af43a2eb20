//! Callable registry
//!
//! The provider process is told which handler and state provider to use by
//! name (`module function`). Names resolve against a [`Registry`] that the
//! binary populates at startup, so the callable contract is checked by the
//! compiler instead of at request time.

use crate::config::CallableRef;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no module named '{0}'")]
    UnknownModule(String),

    #[error("module '{module}' has no function '{function}'")]
    UnknownFunction { module: String, function: String },
}

/// A message produced by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: Option<String>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
            metadata: None,
        }
    }

    /// Attach metadata; an empty string is treated as no metadata
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        let metadata = metadata.into();
        self.metadata = (!metadata.is_empty()).then_some(metadata);
        self
    }
}

/// Produces the message under test
pub trait MessageHandler: Send + Sync {
    fn produce(&self) -> anyhow::Result<Message>;
}

impl<F> MessageHandler for F
where
    F: Fn() -> anyhow::Result<Message> + Send + Sync,
{
    fn produce(&self) -> anyhow::Result<Message> {
        self()
    }
}

/// Puts the fixture into a named provider state
///
/// `None` is passed when a produce request carries no description.
pub trait StateProvider: Send + Sync {
    fn set_state(&self, state: Option<&str>) -> anyhow::Result<()>;
}

impl<F> StateProvider for F
where
    F: Fn(Option<&str>) -> anyhow::Result<()> + Send + Sync,
{
    fn set_state(&self, state: Option<&str>) -> anyhow::Result<()> {
        self(state)
    }
}

/// Named handlers and state providers, grouped by module
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, HashMap<String, Arc<dyn MessageHandler>>>,
    state_providers: HashMap<String, HashMap<String, Arc<dyn StateProvider>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler<H>(
        &mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        handler: H,
    ) -> &mut Self
    where
        H: MessageHandler + 'static,
    {
        self.register_handler_arc(module, function, Arc::new(handler))
    }

    /// Register a handler that shares state with other registrations
    pub fn register_handler_arc(
        &mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> &mut Self {
        self.handlers
            .entry(module.into())
            .or_default()
            .insert(function.into(), handler);
        self
    }

    pub fn register_state_provider<P>(
        &mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        provider: P,
    ) -> &mut Self
    where
        P: StateProvider + 'static,
    {
        self.register_state_provider_arc(module, function, Arc::new(provider))
    }

    /// Register a state provider that shares state with other registrations
    pub fn register_state_provider_arc(
        &mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        provider: Arc<dyn StateProvider>,
    ) -> &mut Self {
        self.state_providers
            .entry(module.into())
            .or_default()
            .insert(function.into(), provider);
        self
    }

    pub fn resolve_handler(
        &self,
        callable: &CallableRef,
    ) -> Result<Arc<dyn MessageHandler>, RegistryError> {
        lookup(&self.handlers, callable, self.has_module(&callable.module))
    }

    pub fn resolve_state_provider(
        &self,
        callable: &CallableRef,
    ) -> Result<Arc<dyn StateProvider>, RegistryError> {
        lookup(
            &self.state_providers,
            callable,
            self.has_module(&callable.module),
        )
    }

    /// Whether any handler or state provider is registered under `module`
    pub fn has_module(&self, module: &str) -> bool {
        self.handlers.contains_key(module) || self.state_providers.contains_key(module)
    }
}

fn lookup<T: ?Sized>(
    modules: &HashMap<String, HashMap<String, Arc<T>>>,
    callable: &CallableRef,
    module_known: bool,
) -> Result<Arc<T>, RegistryError> {
    if !module_known {
        return Err(RegistryError::UnknownModule(callable.module.clone()));
    }
    modules
        .get(&callable.module)
        .and_then(|functions| functions.get(&callable.function))
        .cloned()
        .ok_or_else(|| RegistryError::UnknownFunction {
            module: callable.module.clone(),
            function: callable.function.clone(),
        })
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
