//! One database endpoint: collection and table management plus handles to
//! the collections and tables it holds.

use crate::admin::{require_astra, DatabaseAdmin};
use crate::client::Scope;
use crate::collection::Collection;
use crate::command::Command;
use crate::error::{DataApiError, Result};
use crate::model::{
    CollectionDefinition, CollectionInfo, EmbeddingProviderInfo, EmbeddingProvidersStatus,
};
use crate::operations::{self, Operation};
use crate::options::CommandOptions;
use crate::schema::{TableDefinition, TableSchema};
use crate::table::Table;
use crate::url::{database_id_from_endpoint, UrlTarget};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::info;

// Handles returned from a create call live in the keyspace the call targeted.
fn keyspace_layer(call: Option<&CommandOptions>) -> Option<CommandOptions> {
    call.and_then(|c| c.keyspace.clone()).map(|keyspace| CommandOptions::new().keyspace(keyspace))
}

#[derive(Debug, Deserialize)]
struct CollectionNames {
    #[serde(default)]
    collections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfos {
    #[serde(default)]
    collections: Vec<CollectionInfo>,
}

#[derive(Debug, Deserialize)]
struct TableNames {
    #[serde(default)]
    tables: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Database {
    scope: Scope,
    endpoint: String,
}

impl Database {
    pub(crate) fn new(scope: Scope, endpoint: String) -> Self {
        Self { scope, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Keyspace that commands from this handle resolve to.
    pub fn keyspace(&self) -> String {
        self.scope.resolve(None).keyspace
    }

    /// Handle to an existing collection. No request is sent.
    pub fn collection<T>(&self, name: impl Into<String>) -> Collection<T> {
        self.collection_with_options(name, None)
    }

    pub fn collection_with_options<T>(
        &self,
        name: impl Into<String>,
        options: Option<CommandOptions>,
    ) -> Collection<T> {
        Collection::new(self.scope.child(options), self.endpoint.clone(), name.into())
    }

    pub fn table<T>(&self, name: impl Into<String>) -> Table<T> {
        self.table_with_options(name, None)
    }

    pub fn table_with_options<T>(
        &self,
        name: impl Into<String>,
        options: Option<CommandOptions>,
    ) -> Table<T> {
        Table::new(self.collection_with_options(name, options))
    }

    /// Keyspace administration for this database. Only Astra endpoints carry
    /// a database id.
    pub fn admin(&self) -> Result<DatabaseAdmin> {
        require_astra(&self.scope)?;
        let id = database_id_from_endpoint(&self.endpoint).ok_or_else(|| {
            DataApiError::usage(format!("no database id in endpoint '{}'", self.endpoint))
        })?;
        Ok(DatabaseAdmin::new(self.scope.clone(), id))
    }

    fn command(&self, operation: Operation, call: Option<CommandOptions>) -> Command {
        self.scope.command(operation, UrlTarget::data(self.endpoint.as_str()), call)
    }

    fn create_collection_command(
        &self,
        name: &str,
        definition: Option<&CollectionDefinition>,
        call: Option<CommandOptions>,
    ) -> Result<Command> {
        let mut payload = Map::new();
        payload.insert("name".into(), json!(name));
        if let Some(definition) = definition {
            let options = serde_json::to_value(definition).map_err(DataApiError::Serialize)?;
            payload.insert("options".into(), options);
        }
        Ok(self.command(operations::CREATE_COLLECTION, call).json(Value::Object(payload)))
    }

    pub async fn create_collection<T>(
        &self,
        name: &str,
        definition: Option<CollectionDefinition>,
        call: Option<CommandOptions>,
    ) -> Result<Collection<T>> {
        let layer = keyspace_layer(call.as_ref());
        let command = self.create_collection_command(name, definition.as_ref(), call)?;
        let _: Value = self.scope.dispatcher.status(command).await?;
        info!(target: "astra_data_api::database", collection = name, "collection created");
        Ok(self.collection_with_options(name, layer))
    }

    pub fn create_collection_blocking<T>(
        &self,
        name: &str,
        definition: Option<CollectionDefinition>,
        call: Option<CommandOptions>,
    ) -> Result<Collection<T>> {
        let layer = keyspace_layer(call.as_ref());
        let command = self.create_collection_command(name, definition.as_ref(), call)?;
        let _: Value = self.scope.dispatcher.status_blocking(command)?;
        info!(target: "astra_data_api::database", collection = name, "collection created");
        Ok(self.collection_with_options(name, layer))
    }

    fn find_collections_command(&self, explain: bool, call: Option<CommandOptions>) -> Command {
        self.command(operations::FIND_COLLECTIONS, call)
            .json(json!({ "options": { "explain": explain } }))
    }

    pub async fn list_collection_names(&self, call: Option<CommandOptions>) -> Result<Vec<String>> {
        let status: CollectionNames =
            self.scope.dispatcher.status(self.find_collections_command(false, call)).await?;
        Ok(status.collections)
    }

    pub fn list_collection_names_blocking(
        &self,
        call: Option<CommandOptions>,
    ) -> Result<Vec<String>> {
        let status: CollectionNames =
            self.scope.dispatcher.status_blocking(self.find_collections_command(false, call))?;
        Ok(status.collections)
    }

    /// Collections with their definitions.
    pub async fn list_collections(
        &self,
        call: Option<CommandOptions>,
    ) -> Result<Vec<CollectionInfo>> {
        let status: CollectionInfos =
            self.scope.dispatcher.status(self.find_collections_command(true, call)).await?;
        Ok(status.collections)
    }

    pub fn list_collections_blocking(
        &self,
        call: Option<CommandOptions>,
    ) -> Result<Vec<CollectionInfo>> {
        let status: CollectionInfos =
            self.scope.dispatcher.status_blocking(self.find_collections_command(true, call))?;
        Ok(status.collections)
    }

    fn named_command(
        &self,
        operation: Operation,
        name: &str,
        call: Option<CommandOptions>,
    ) -> Command {
        self.command(operation, call).json(json!({ "name": name }))
    }

    pub async fn drop_collection(&self, name: &str, call: Option<CommandOptions>) -> Result<()> {
        let command = self.named_command(operations::DELETE_COLLECTION, name, call);
        let _: Value = self.scope.dispatcher.status(command).await?;
        Ok(())
    }

    pub fn drop_collection_blocking(&self, name: &str, call: Option<CommandOptions>) -> Result<()> {
        let command = self.named_command(operations::DELETE_COLLECTION, name, call);
        let _: Value = self.scope.dispatcher.status_blocking(command)?;
        Ok(())
    }

    fn create_table_command(
        &self,
        name: &str,
        definition: &TableDefinition,
        if_not_exists: bool,
        call: Option<CommandOptions>,
    ) -> Result<Command> {
        let payload = definition.create_payload(name, if_not_exists)?;
        Ok(self.command(operations::CREATE_TABLE, call).json(payload))
    }

    /// Create a table from an explicit definition. An invalid definition is
    /// rejected before any request is sent.
    pub async fn create_table<T>(
        &self,
        name: &str,
        definition: &TableDefinition,
        if_not_exists: bool,
        call: Option<CommandOptions>,
    ) -> Result<Table<T>> {
        let layer = keyspace_layer(call.as_ref());
        let command = self.create_table_command(name, definition, if_not_exists, call)?;
        let _: Value = self.scope.dispatcher.status(command).await?;
        info!(target: "astra_data_api::database", table = name, "table created");
        Ok(self.table_with_options(name, layer))
    }

    pub fn create_table_blocking<T>(
        &self,
        name: &str,
        definition: &TableDefinition,
        if_not_exists: bool,
        call: Option<CommandOptions>,
    ) -> Result<Table<T>> {
        let layer = keyspace_layer(call.as_ref());
        let command = self.create_table_command(name, definition, if_not_exists, call)?;
        let _: Value = self.scope.dispatcher.status_blocking(command)?;
        info!(target: "astra_data_api::database", table = name, "table created");
        Ok(self.table_with_options(name, layer))
    }

    /// Create a table laid out by the row type's own definition.
    pub async fn create_table_for<R: TableSchema>(
        &self,
        name: &str,
        if_not_exists: bool,
        call: Option<CommandOptions>,
    ) -> Result<Table<R>> {
        self.create_table(name, &R::table_definition(), if_not_exists, call).await
    }

    pub fn create_table_for_blocking<R: TableSchema>(
        &self,
        name: &str,
        if_not_exists: bool,
        call: Option<CommandOptions>,
    ) -> Result<Table<R>> {
        self.create_table_blocking(name, &R::table_definition(), if_not_exists, call)
    }

    pub async fn list_table_names(&self, call: Option<CommandOptions>) -> Result<Vec<String>> {
        let status: TableNames =
            self.scope.dispatcher.status(self.command(operations::LIST_TABLES, call)).await?;
        Ok(status.tables)
    }

    pub fn list_table_names_blocking(&self, call: Option<CommandOptions>) -> Result<Vec<String>> {
        let status: TableNames =
            self.scope.dispatcher.status_blocking(self.command(operations::LIST_TABLES, call))?;
        Ok(status.tables)
    }

    pub async fn drop_table(&self, name: &str, call: Option<CommandOptions>) -> Result<()> {
        let command = self.named_command(operations::DROP_TABLE, name, call);
        let _: Value = self.scope.dispatcher.status(command).await?;
        Ok(())
    }

    pub fn drop_table_blocking(&self, name: &str, call: Option<CommandOptions>) -> Result<()> {
        let command = self.named_command(operations::DROP_TABLE, name, call);
        let _: Value = self.scope.dispatcher.status_blocking(command)?;
        Ok(())
    }

    // Embedding providers live at the API root, outside any keyspace.
    fn embedding_providers_command(&self, call: Option<CommandOptions>) -> Command {
        let target = UrlTarget::embedding(self.endpoint.as_str());
        self.scope.command(operations::FIND_EMBEDDING_PROVIDERS, target, call)
    }

    pub async fn find_embedding_providers(
        &self,
        call: Option<CommandOptions>,
    ) -> Result<BTreeMap<String, EmbeddingProviderInfo>> {
        let command = self.embedding_providers_command(call);
        let status: EmbeddingProvidersStatus = self.scope.dispatcher.status(command).await?;
        Ok(status.embedding_providers)
    }

    pub fn find_embedding_providers_blocking(
        &self,
        call: Option<CommandOptions>,
    ) -> Result<BTreeMap<String, EmbeddingProviderInfo>> {
        let command = self.embedding_providers_command(call);
        let status: EmbeddingProvidersStatus = self.scope.dispatcher.status_blocking(command)?;
        Ok(status.embedding_providers)
    }
}
