//! Provider configuration
//!
//! The provider process receives its configuration positionally:
//!
//! ```text
//! <handler_module> <handler_function> <produce_message_url>
//! <state_provider_module> [<state_provider_function> [<set_provider_state_url>]]
//! ```
//!
//! The launcher builds the same list with [`ProviderConfig::to_args`].

use std::fmt;
use thiserror::Error;

/// Default route for message production
pub const DEFAULT_PRODUCE_MESSAGE_URL: &str = "/produce_message";

/// Default route for setting provider state
pub const DEFAULT_SET_PROVIDER_STATE_URL: &str = "/set_provider_state";

/// Liveness route, always served
pub const PING_PATH: &str = "/_test/ping";

/// Minimum number of positional arguments the provider process accepts
const MIN_ARGS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("expected at least 4 arguments, got {0}")]
    Usage(usize),

    #[error("state provider module '{0}' given without a function name")]
    MissingStateFunction(String),

    #[error("route '{0}' must start with '/'")]
    InvalidRoute(String),

    #[error("route '{0}' is used more than once")]
    ConflictingRoutes(String),
}

/// Symbolic reference to a user callable: `module.function`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallableRef {
    pub module: String,
    pub function: String,
}

impl CallableRef {
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
        }
    }
}

impl fmt::Display for CallableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.function)
    }
}

/// Everything the provider needs to know at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub handler: CallableRef,
    pub produce_message_url: String,
    pub state_provider: Option<CallableRef>,
    pub set_provider_state_url: String,
}

impl ProviderConfig {
    /// Config with default routes and no state provider
    pub fn new(handler: CallableRef) -> Self {
        Self {
            handler,
            produce_message_url: DEFAULT_PRODUCE_MESSAGE_URL.to_string(),
            state_provider: None,
            set_provider_state_url: DEFAULT_SET_PROVIDER_STATE_URL.to_string(),
        }
    }

    pub fn with_state_provider(mut self, state_provider: CallableRef) -> Self {
        self.state_provider = Some(state_provider);
        self
    }

    pub fn with_produce_message_url(mut self, url: impl Into<String>) -> Self {
        self.produce_message_url = url.into();
        self
    }

    pub fn with_set_provider_state_url(mut self, url: impl Into<String>) -> Self {
        self.set_provider_state_url = url.into();
        self
    }

    /// Parse positional arguments (program name already stripped)
    ///
    /// Empty route arguments fall back to the defaults and an empty state
    /// provider module means "no state provider".
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.len() < MIN_ARGS {
            return Err(ConfigError::Usage(args.len()));
        }

        let arg = |index: usize| args.get(index).cloned().unwrap_or_default();
        let or_default = |value: String, default: &str| {
            if value.is_empty() {
                default.to_string()
            } else {
                value
            }
        };

        let state_module = arg(3);
        let state_function = arg(4);
        let state_provider = match (state_module.is_empty(), state_function.is_empty()) {
            (true, _) => None,
            (false, true) => return Err(ConfigError::MissingStateFunction(state_module)),
            (false, false) => Some(CallableRef::new(state_module, state_function)),
        };

        let config = Self {
            handler: CallableRef::new(arg(0), arg(1)),
            produce_message_url: or_default(arg(2), DEFAULT_PRODUCE_MESSAGE_URL),
            state_provider,
            set_provider_state_url: or_default(arg(5), DEFAULT_SET_PROVIDER_STATE_URL),
        };
        config.validate()?;
        Ok(config)
    }

    /// Positional arguments for the provider process, in `from_args` order
    pub fn to_args(&self) -> Vec<String> {
        let (state_module, state_function) = match &self.state_provider {
            Some(callable) => (callable.module.clone(), callable.function.clone()),
            None => (String::new(), String::new()),
        };
        vec![
            self.handler.module.clone(),
            self.handler.function.clone(),
            self.produce_message_url.clone(),
            state_module,
            state_function,
            self.set_provider_state_url.clone(),
        ]
    }

    /// Check that the routes can be mounted side by side
    pub fn validate(&self) -> Result<(), ConfigError> {
        for route in [&self.produce_message_url, &self.set_provider_state_url] {
            if !route.starts_with('/') {
                return Err(ConfigError::InvalidRoute(route.clone()));
            }
            if route == PING_PATH {
                return Err(ConfigError::ConflictingRoutes(route.clone()));
            }
        }
        if self.produce_message_url == self.set_provider_state_url {
            return Err(ConfigError::ConflictingRoutes(
                self.produce_message_url.clone(),
            ));
        }
        Ok(())
    }
}

/// Usage line printed when too few arguments are given
pub fn usage(program: &str) -> String {
    format!(
        "Usage: {} <handler_module> <handler_function> <produce_message_url> \
         <state_provider_module> [<state_provider_function> [<set_provider_state_url>]]",
        program
    )
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
