//! DevOps API handles: [`AstraAdmin`] for databases, [`DatabaseAdmin`] for
//! the keyspaces of one database.
//!
//! Lifecycle calls return once the request is accepted. When asked to wait,
//! they poll the database description with a [`PollingWaiter`] until the
//! target state is reported, bounded by the database-admin or keyspace-admin
//! timeout of the resolved options.

use crate::client::Scope;
use crate::command::Command;
use crate::error::{DataApiError, Result};
use crate::model::{DatabaseCreationOptions, DatabaseInfo, DatabaseStatus};
use crate::operations::{self, Operation};
use crate::options::{CommandOptions, Destination, TimeoutKind};
use crate::polling::PollingWaiter;
use crate::url::UrlTarget;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

pub const DATABASE_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const KEYSPACE_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) fn require_astra(scope: &Scope) -> Result<()> {
    match scope.resolve(None).destination {
        Destination::Astra => Ok(()),
        other => Err(DataApiError::usage(format!(
            "the DevOps API is only available for Astra (destination is {other:?})"
        ))),
    }
}

fn admin_command(
    scope: &Scope,
    operation: Operation,
    path: &[&str],
    call: Option<CommandOptions>,
    last: CommandOptions,
) -> Command {
    scope
        .command(operation, UrlTarget::admin(path.iter().copied()), call)
        .layer(Arc::new(last))
}

fn waiter(
    scope: &Scope,
    interval: Duration,
    kind: TimeoutKind,
    call: Option<&CommandOptions>,
) -> PollingWaiter {
    PollingWaiter::new(interval, scope.resolve(call).request_timeout(kind))
}

fn database_gone(found: Result<DatabaseInfo>) -> Result<bool> {
    match found {
        Ok(info) => Ok(info.status == DatabaseStatus::Terminated),
        Err(DataApiError::Service { status: 404, .. }) => Ok(true),
        Err(err) => Err(err),
    }
}

fn id_from_location(location: Option<String>) -> Result<String> {
    location
        .as_deref()
        .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            DataApiError::decode("createDatabase response has no usable Location header", None)
        })
}

#[derive(Debug, Clone)]
pub struct AstraAdmin {
    scope: Scope,
    poll_interval: Duration,
}

impl AstraAdmin {
    pub(crate) fn new(scope: Scope) -> Result<Self> {
        require_astra(&scope)?;
        Ok(Self { scope, poll_interval: DATABASE_POLL_INTERVAL })
    }

    /// Interval between state checks while waiting on a database.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn command(
        &self,
        operation: Operation,
        path: &[&str],
        call: Option<CommandOptions>,
    ) -> Command {
        let last = CommandOptions::new().include_keyspace_in_url(false);
        admin_command(&self.scope, operation, path, call, last)
    }

    pub async fn list_databases(&self, call: Option<CommandOptions>) -> Result<Vec<DatabaseInfo>> {
        let command = self.command(operations::LIST_DATABASES, &["databases"], call);
        self.scope.dispatcher.raw(command).await
    }

    pub fn list_databases_blocking(
        &self,
        call: Option<CommandOptions>,
    ) -> Result<Vec<DatabaseInfo>> {
        let command = self.command(operations::LIST_DATABASES, &["databases"], call);
        self.scope.dispatcher.raw_blocking(command)
    }

    pub async fn get_database(
        &self,
        id: &str,
        call: Option<CommandOptions>,
    ) -> Result<DatabaseInfo> {
        let command = self.command(operations::GET_DATABASE, &["databases", id], call);
        self.scope.dispatcher.raw(command).await
    }

    pub fn get_database_blocking(
        &self,
        id: &str,
        call: Option<CommandOptions>,
    ) -> Result<DatabaseInfo> {
        let command = self.command(operations::GET_DATABASE, &["databases", id], call);
        self.scope.dispatcher.raw_blocking(command)
    }

    fn create_command(
        &self,
        options: &DatabaseCreationOptions,
        call: Option<CommandOptions>,
    ) -> Result<(Command, Arc<Mutex<Option<String>>>)> {
        let location = Arc::new(Mutex::new(None));
        let slot = location.clone();
        let command = self
            .command(operations::CREATE_DATABASE, &["databases"], call)
            .payload(options)?
            .inspect(move |meta| {
                if let Ok(mut slot) = slot.lock() {
                    *slot = meta.location().map(str::to_string);
                }
            });
        Ok((command, location))
    }

    fn created_id(location: &Mutex<Option<String>>) -> Result<String> {
        let location = location.lock().map(|slot| slot.clone()).unwrap_or_default();
        id_from_location(location)
    }

    /// Create a database. The new id is read from the `Location` header.
    /// With `wait`, returns only after the database reports `ACTIVE`.
    pub async fn create_database(
        &self,
        options: DatabaseCreationOptions,
        wait: bool,
        call: Option<CommandOptions>,
    ) -> Result<DatabaseAdmin> {
        let (command, location) = self.create_command(&options, call.clone())?;
        let _: Value = self.scope.dispatcher.execute(command).await?;
        let id = Self::created_id(&location)?;
        info!(
            target: "astra_data_api::admin",
            database = %id,
            name = %options.name,
            "database creation accepted"
        );

        if wait {
            let cancel = self.scope.resolve(call.as_ref()).cancellation;
            let condition = format!("database {id} to become ACTIVE");
            let target = id.as_str();
            waiter(&self.scope, self.poll_interval, TimeoutKind::DatabaseAdmin, call.as_ref())
                .wait_until(&condition, cancel.as_ref(), || {
                    let call = call.clone();
                    async move {
                        Ok(self.get_database(target, call).await?.status == DatabaseStatus::Active)
                    }
                })
                .await?;
            info!(target: "astra_data_api::admin", database = %id, "database is active");
        }
        Ok(self.database_admin(id))
    }

    pub fn create_database_blocking(
        &self,
        options: DatabaseCreationOptions,
        wait: bool,
        call: Option<CommandOptions>,
    ) -> Result<DatabaseAdmin> {
        let (command, location) = self.create_command(&options, call.clone())?;
        let _: Value = self.scope.dispatcher.execute_blocking(command)?;
        let id = Self::created_id(&location)?;
        info!(
            target: "astra_data_api::admin",
            database = %id,
            name = %options.name,
            "database creation accepted"
        );

        if wait {
            let cancel = self.scope.resolve(call.as_ref()).cancellation;
            let condition = format!("database {id} to become ACTIVE");
            waiter(&self.scope, self.poll_interval, TimeoutKind::DatabaseAdmin, call.as_ref())
                .wait_until_blocking(&condition, cancel.as_ref(), || {
                    let info = self.get_database_blocking(&id, call.clone())?;
                    Ok(info.status == DatabaseStatus::Active)
                })?;
            info!(target: "astra_data_api::admin", database = %id, "database is active");
        }
        Ok(self.database_admin(id))
    }

    /// Terminate a database. With `wait`, returns once it is reported
    /// `TERMINATED` or no longer found.
    pub async fn drop_database(
        &self,
        id: &str,
        wait: bool,
        call: Option<CommandOptions>,
    ) -> Result<()> {
        let path = ["databases", id, "terminate"];
        let command = self.command(operations::TERMINATE_DATABASE, &path, call.clone());
        let _: Value = self.scope.dispatcher.execute(command).await?;
        info!(target: "astra_data_api::admin", database = %id, "database termination accepted");

        if wait {
            let cancel = self.scope.resolve(call.as_ref()).cancellation;
            let condition = format!("database {id} to terminate");
            waiter(&self.scope, self.poll_interval, TimeoutKind::DatabaseAdmin, call.as_ref())
                .wait_until(&condition, cancel.as_ref(), || {
                    let call = call.clone();
                    async move { database_gone(self.get_database(id, call).await) }
                })
                .await?;
            info!(target: "astra_data_api::admin", database = %id, "database terminated");
        }
        Ok(())
    }

    pub fn drop_database_blocking(
        &self,
        id: &str,
        wait: bool,
        call: Option<CommandOptions>,
    ) -> Result<()> {
        let path = ["databases", id, "terminate"];
        let command = self.command(operations::TERMINATE_DATABASE, &path, call.clone());
        let _: Value = self.scope.dispatcher.execute_blocking(command)?;
        info!(target: "astra_data_api::admin", database = %id, "database termination accepted");

        if wait {
            let cancel = self.scope.resolve(call.as_ref()).cancellation;
            let condition = format!("database {id} to terminate");
            waiter(&self.scope, self.poll_interval, TimeoutKind::DatabaseAdmin, call.as_ref())
                .wait_until_blocking(&condition, cancel.as_ref(), || {
                    database_gone(self.get_database_blocking(id, call.clone()))
                })?;
            info!(target: "astra_data_api::admin", database = %id, "database terminated");
        }
        Ok(())
    }

    /// Keyspace administration for database `id`.
    pub fn database_admin(&self, id: impl Into<String>) -> DatabaseAdmin {
        DatabaseAdmin::new(self.scope.clone(), id.into())
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseAdmin {
    scope: Scope,
    id: String,
    poll_interval: Duration,
}

impl DatabaseAdmin {
    pub(crate) fn new(scope: Scope, id: String) -> Self {
        Self { scope, id, poll_interval: KEYSPACE_POLL_INTERVAL }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn info_command(&self, call: Option<CommandOptions>) -> Command {
        let last = CommandOptions::new().include_keyspace_in_url(false);
        let path = ["databases", self.id.as_str()];
        admin_command(&self.scope, operations::GET_DATABASE, &path, call, last)
    }

    // The keyspace segment is appended by the admin URL builder.
    fn keyspace_command(
        &self,
        operation: Operation,
        keyspace: &str,
        call: Option<CommandOptions>,
    ) -> Result<Command> {
        if keyspace.trim().is_empty() {
            return Err(DataApiError::usage("keyspace name must not be empty"));
        }
        let last = CommandOptions::new().keyspace(keyspace).include_keyspace_in_url(true);
        let path = ["databases", self.id.as_str(), "keyspaces"];
        Ok(admin_command(&self.scope, operation, &path, call, last))
    }

    pub async fn info(&self, call: Option<CommandOptions>) -> Result<DatabaseInfo> {
        self.scope.dispatcher.raw(self.info_command(call)).await
    }

    pub fn info_blocking(&self, call: Option<CommandOptions>) -> Result<DatabaseInfo> {
        self.scope.dispatcher.raw_blocking(self.info_command(call))
    }

    pub async fn list_keyspaces(&self, call: Option<CommandOptions>) -> Result<Vec<String>> {
        Ok(self.info(call).await?.keyspaces())
    }

    pub fn list_keyspaces_blocking(&self, call: Option<CommandOptions>) -> Result<Vec<String>> {
        Ok(self.info_blocking(call)?.keyspaces())
    }

    async fn await_keyspace(
        &self,
        keyspace: &str,
        present: bool,
        call: Option<CommandOptions>,
    ) -> Result<()> {
        let cancel = self.scope.resolve(call.as_ref()).cancellation;
        let condition = keyspace_condition(keyspace, present);
        waiter(&self.scope, self.poll_interval, TimeoutKind::KeyspaceAdmin, call.as_ref())
            .wait_until(&condition, cancel.as_ref(), || {
                let call = call.clone();
                async move {
                    let keyspaces = self.list_keyspaces(call).await?;
                    Ok(keyspaces.iter().any(|k| k == keyspace) == present)
                }
            })
            .await
    }

    fn await_keyspace_blocking(
        &self,
        keyspace: &str,
        present: bool,
        call: Option<CommandOptions>,
    ) -> Result<()> {
        let cancel = self.scope.resolve(call.as_ref()).cancellation;
        let condition = keyspace_condition(keyspace, present);
        waiter(&self.scope, self.poll_interval, TimeoutKind::KeyspaceAdmin, call.as_ref())
            .wait_until_blocking(&condition, cancel.as_ref(), || {
                let keyspaces = self.list_keyspaces_blocking(call.clone())?;
                Ok(keyspaces.iter().any(|k| k == keyspace) == present)
            })
    }

    /// Create `keyspace` and wait until the database lists it.
    pub async fn create_keyspace(
        &self,
        keyspace: &str,
        call: Option<CommandOptions>,
    ) -> Result<()> {
        let command = self.keyspace_command(operations::CREATE_KEYSPACE, keyspace, call.clone())?;
        let _: Value = self.scope.dispatcher.execute(command).await?;
        self.await_keyspace(keyspace, true, call).await?;
        info!(target: "astra_data_api::admin", database = %self.id, keyspace, "keyspace created");
        Ok(())
    }

    pub fn create_keyspace_blocking(
        &self,
        keyspace: &str,
        call: Option<CommandOptions>,
    ) -> Result<()> {
        let command = self.keyspace_command(operations::CREATE_KEYSPACE, keyspace, call.clone())?;
        let _: Value = self.scope.dispatcher.execute_blocking(command)?;
        self.await_keyspace_blocking(keyspace, true, call)?;
        info!(target: "astra_data_api::admin", database = %self.id, keyspace, "keyspace created");
        Ok(())
    }

    /// Drop `keyspace` and wait until the database no longer lists it.
    pub async fn drop_keyspace(&self, keyspace: &str, call: Option<CommandOptions>) -> Result<()> {
        let command = self.keyspace_command(operations::DROP_KEYSPACE, keyspace, call.clone())?;
        let _: Value = self.scope.dispatcher.execute(command).await?;
        self.await_keyspace(keyspace, false, call).await?;
        info!(target: "astra_data_api::admin", database = %self.id, keyspace, "keyspace dropped");
        Ok(())
    }

    pub fn drop_keyspace_blocking(
        &self,
        keyspace: &str,
        call: Option<CommandOptions>,
    ) -> Result<()> {
        let command = self.keyspace_command(operations::DROP_KEYSPACE, keyspace, call.clone())?;
        let _: Value = self.scope.dispatcher.execute_blocking(command)?;
        self.await_keyspace_blocking(keyspace, false, call)?;
        info!(target: "astra_data_api::admin", database = %self.id, keyspace, "keyspace dropped");
        Ok(())
    }
}

fn keyspace_condition(keyspace: &str, present: bool) -> String {
    if present {
        format!("keyspace {keyspace} to appear")
    } else {
        format!("keyspace {keyspace} to disappear")
    }
}
