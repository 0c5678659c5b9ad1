//! Entry point: a client holding the top-level option layer and a shared
//! dispatcher.
//!
//! Every handle derived from the client (databases, collections, tables,
//! admins) copies its parent's layer list and appends its own. Handles never
//! point back at their parent, and changing a parent after a child was
//! created does not affect the child.

use crate::admin::AstraAdmin;
use crate::command::Command;
use crate::database::Database;
use crate::dispatcher::CommandDispatcher;
use crate::error::Result;
use crate::operations::Operation;
use crate::options::{CommandOptions, EffectiveConfig};
use crate::url::UrlTarget;
use std::sync::Arc;

/// Option layers plus the dispatcher they are sent through.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    pub(crate) dispatcher: Arc<CommandDispatcher>,
    layers: Vec<Arc<CommandOptions>>,
}

impl Scope {
    pub(crate) fn new(dispatcher: Arc<CommandDispatcher>, root: CommandOptions) -> Self {
        Self { dispatcher, layers: vec![Arc::new(root)] }
    }

    /// Snapshot of these layers with `options` appended.
    pub(crate) fn child(&self, options: Option<CommandOptions>) -> Self {
        let mut layers = self.layers.clone();
        layers.extend(options.map(Arc::new));
        Self { dispatcher: self.dispatcher.clone(), layers }
    }

    /// A command carrying this scope's layers followed by the per-call layer.
    pub(crate) fn command(
        &self,
        operation: Operation,
        target: UrlTarget,
        call: Option<CommandOptions>,
    ) -> Command {
        Command::new(operation, target).layers(self.layers.iter().cloned()).call_options(call)
    }

    /// Resolve the layers with an optional per-call layer on top.
    pub(crate) fn resolve(&self, call: Option<&CommandOptions>) -> EffectiveConfig {
        CommandOptions::merge(self.layers.iter().map(Arc::as_ref).chain(call))
    }
}

#[derive(Debug, Clone)]
pub struct DataApiClient {
    scope: Scope,
}

impl DataApiClient {
    /// Client authenticating with `token`, all other options at their defaults.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_options(CommandOptions::new().token(token))
    }

    pub fn with_options(options: CommandOptions) -> Self {
        Self { scope: Scope::new(Arc::new(CommandDispatcher::new()), options) }
    }

    /// Client configured from `ASTRA_DB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_options(CommandOptions::from_env()?))
    }

    /// Replace the dispatcher, e.g. to route through a custom transport.
    pub fn with_dispatcher(mut self, dispatcher: CommandDispatcher) -> Self {
        self.scope.dispatcher = Arc::new(dispatcher);
        self
    }

    /// Resolved client-level options.
    pub fn config(&self) -> EffectiveConfig {
        self.scope.resolve(None)
    }

    pub fn database(&self, endpoint: impl Into<String>) -> Database {
        self.database_with_options(endpoint, None)
    }

    pub fn database_with_options(
        &self,
        endpoint: impl Into<String>,
        options: Option<CommandOptions>,
    ) -> Database {
        Database::new(self.scope.child(options), endpoint.into())
    }

    /// DevOps API handle. Fails unless the destination is Astra.
    pub fn admin(&self) -> Result<AstraAdmin> {
        self.admin_with_options(None)
    }

    pub fn admin_with_options(&self, options: Option<CommandOptions>) -> Result<AstraAdmin> {
        AstraAdmin::new(self.scope.child(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Destination, Environment};

    #[test]
    fn child_scopes_do_not_leak_into_parent() {
        let client = DataApiClient::with_options(CommandOptions::new().keyspace("root"));
        let child = client.scope.child(Some(CommandOptions::new().keyspace("child")));
        assert_eq!(child.resolve(None).keyspace, "child");
        assert_eq!(client.config().keyspace, "root");
    }

    #[test]
    fn call_layer_wins_over_scope_layers() {
        let client = DataApiClient::new("t");
        let scope = client.scope.child(Some(CommandOptions::new().environment(Environment::Dev)));
        let call = CommandOptions::new().environment(Environment::Test);
        assert_eq!(scope.resolve(Some(&call)).environment, Environment::Test);
        assert_eq!(scope.resolve(None).environment, Environment::Dev);
        assert_eq!(scope.resolve(None).token.as_deref(), Some("t"));
    }

    #[test]
    fn admin_requires_astra_destination() {
        let client =
            DataApiClient::with_options(CommandOptions::new().destination(Destination::Hcd));
        assert!(client.admin().unwrap_err().is_usage());
        assert!(DataApiClient::new("t").admin().is_ok());
    }
}
