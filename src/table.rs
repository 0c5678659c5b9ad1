//! Typed table of rows. Row CRUD goes through the same commands as
//! collections; tables differ in how they are created and dropped and in
//! returning no delete counts.

use crate::collection::Collection;
use crate::command::Command;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::model::{FindOptions, InsertManyOptions, InsertManyResult, InsertOneResult};
use crate::operations;
use crate::options::CommandOptions;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

pub struct Table<T> {
    rows: Collection<T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self { rows: self.rows.clone() }
    }
}

impl<T> std::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("endpoint", &self.rows.endpoint())
            .field("name", &self.rows.name())
            .finish()
    }
}

impl<T> Table<T> {
    pub(crate) fn new(rows: Collection<T>) -> Self {
        Self { rows }
    }

    pub fn name(&self) -> &str {
        self.rows.name()
    }

    pub fn keyspace(&self) -> String {
        self.rows.keyspace()
    }

    fn drop_command(&self, call: Option<CommandOptions>) -> Command {
        self.rows
            .database_command(operations::DROP_TABLE, call)
            .json(json!({ "name": self.rows.name() }))
    }
}

impl<T> Table<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Insert one row. The returned id is the row's primary key values.
    pub async fn insert_one(
        &self,
        row: &T,
        call: Option<CommandOptions>,
    ) -> Result<InsertOneResult> {
        self.rows.insert_one(row, call).await
    }

    pub fn insert_one_blocking(
        &self,
        row: &T,
        call: Option<CommandOptions>,
    ) -> Result<InsertOneResult> {
        self.rows.insert_one_blocking(row, call)
    }

    pub async fn insert_many(
        &self,
        rows: Vec<T>,
        options: InsertManyOptions,
        call: Option<CommandOptions>,
    ) -> Result<InsertManyResult> {
        self.rows.insert_many(rows, options, call).await
    }

    pub fn insert_many_blocking(
        &self,
        rows: Vec<T>,
        options: InsertManyOptions,
        call: Option<CommandOptions>,
    ) -> Result<InsertManyResult> {
        self.rows.insert_many_blocking(rows, options, call)
    }

    pub async fn find_one(
        &self,
        find: FindOptions,
        call: Option<CommandOptions>,
    ) -> Result<Option<T>> {
        self.rows.find_one(find, call).await
    }

    pub fn find_one_blocking(
        &self,
        find: FindOptions,
        call: Option<CommandOptions>,
    ) -> Result<Option<T>> {
        self.rows.find_one_blocking(find, call)
    }

    pub fn find(&self, find: FindOptions, call: Option<CommandOptions>) -> Cursor<T> {
        self.rows.find(find, call)
    }

    pub async fn delete_one(&self, filter: Value, call: Option<CommandOptions>) -> Result<()> {
        self.rows.delete_one(filter, call).await.map(|_| ())
    }

    pub fn delete_one_blocking(&self, filter: Value, call: Option<CommandOptions>) -> Result<()> {
        self.rows.delete_one_blocking(filter, call).map(|_| ())
    }

    pub async fn delete_many(&self, filter: Value, call: Option<CommandOptions>) -> Result<()> {
        self.rows.delete_many(filter, call).await.map(|_| ())
    }

    pub fn delete_many_blocking(&self, filter: Value, call: Option<CommandOptions>) -> Result<()> {
        self.rows.delete_many_blocking(filter, call).map(|_| ())
    }

    pub async fn drop(&self, call: Option<CommandOptions>) -> Result<()> {
        let _: Value = self.rows.scope().dispatcher.status(self.drop_command(call)).await?;
        Ok(())
    }

    pub fn drop_blocking(&self, call: Option<CommandOptions>) -> Result<()> {
        let _: Value = self.rows.scope().dispatcher.status_blocking(self.drop_command(call))?;
        Ok(())
    }
}
