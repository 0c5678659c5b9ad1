//! Typed document collection.
//!
//! Every operation exists in an async form and a `_blocking` form. Both build
//! the same [`Command`] and differ only in how the dispatcher sends it.

use crate::batch::{BatchPlan, BatchedConcurrentWriter};
use crate::client::Scope;
use crate::command::Command;
use crate::cursor::{Cursor, Page, PageFetcher};
use crate::dispatcher::DataAndStatus;
use crate::error::{DataApiError, Result};
use crate::model::{
    DeleteResult, DocumentCount, FindOneData, FindOptions, FindPage, FindStatus, InsertManyOptions,
    InsertManyResult, InsertOneResult, InsertedIds, UpdateOptions, UpdateResult,
};
use crate::operations::{self, Operation};
use crate::options::CommandOptions;
use crate::url::UrlTarget;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

#[derive(Serialize)]
struct InsertOnePayload<'a, D> {
    document: &'a D,
}

#[derive(Serialize)]
struct InsertManyPayload<'a, D> {
    documents: &'a [D],
    options: InsertManyFlags,
}

#[derive(Serialize)]
struct InsertManyFlags {
    ordered: bool,
}

pub struct Collection<T> {
    scope: Scope,
    endpoint: String,
    name: String,
    _documents: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            endpoint: self.endpoint.clone(),
            name: self.name.clone(),
            _documents: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("endpoint", &self.endpoint)
            .field("name", &self.name)
            .finish()
    }
}

impl<T> Collection<T> {
    pub(crate) fn new(scope: Scope, endpoint: String, name: String) -> Self {
        Self { scope, endpoint, name, _documents: PhantomData }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Keyspace this collection resolves to.
    pub fn keyspace(&self) -> String {
        self.scope.resolve(None).keyspace
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.scope
    }

    pub(crate) fn command(&self, operation: Operation, call: Option<CommandOptions>) -> Command {
        let target = UrlTarget::data_path(self.endpoint.as_str(), [self.name.as_str()]);
        self.scope.command(operation, target, call)
    }

    /// Command addressed to the owning database rather than the collection.
    pub(crate) fn database_command(
        &self,
        operation: Operation,
        call: Option<CommandOptions>,
    ) -> Command {
        self.scope.command(operation, UrlTarget::data(self.endpoint.as_str()), call)
    }

    fn writer(
        &self,
        options: &InsertManyOptions,
        call: Option<&CommandOptions>,
    ) -> Result<BatchedConcurrentWriter> {
        let plan = BatchPlan::for_insert(options)?;
        let cancel = self.scope.resolve(call).cancellation;
        Ok(BatchedConcurrentWriter::new(plan).with_cancellation(cancel))
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn insert_one_command(&self, document: &T, call: Option<CommandOptions>) -> Result<Command> {
        self.command(operations::INSERT_ONE, call).payload(&InsertOnePayload { document })
    }

    fn insert_chunk_command(
        &self,
        documents: &[T],
        ordered: bool,
        call: Option<CommandOptions>,
    ) -> Result<Command> {
        self.command(operations::INSERT_MANY, call)
            .payload(&InsertManyPayload { documents, options: InsertManyFlags { ordered } })
    }

    pub async fn insert_one(
        &self,
        document: &T,
        call: Option<CommandOptions>,
    ) -> Result<InsertOneResult> {
        let command = self.insert_one_command(document, call)?;
        first_inserted_id(self.scope.dispatcher.status(command).await?)
    }

    pub fn insert_one_blocking(
        &self,
        document: &T,
        call: Option<CommandOptions>,
    ) -> Result<InsertOneResult> {
        let command = self.insert_one_command(document, call)?;
        first_inserted_id(self.scope.dispatcher.status_blocking(command)?)
    }

    /// Insert `documents` in chunks, several chunks at a time unless ordered.
    ///
    /// Returned ids follow input order. When some chunks fail the error is
    /// [`DataApiError::PartialBatch`], whose `completed` list holds the ids
    /// that were inserted.
    pub async fn insert_many(
        &self,
        documents: Vec<T>,
        options: InsertManyOptions,
        call: Option<CommandOptions>,
    ) -> Result<InsertManyResult> {
        let writer = self.writer(&options, call.as_ref())?;
        let dispatcher = &self.scope.dispatcher;
        let outcome = writer
            .insert_all(documents, |_, chunk: Vec<T>| {
                let command = self.insert_chunk_command(&chunk, options.ordered, call.clone());
                async move {
                    let status: InsertedIds = dispatcher.status(command?).await?;
                    Ok(status.inserted_ids)
                }
            })
            .await?;
        Ok(InsertManyResult { inserted_ids: outcome.results })
    }

    pub fn insert_many_blocking(
        &self,
        documents: Vec<T>,
        options: InsertManyOptions,
        call: Option<CommandOptions>,
    ) -> Result<InsertManyResult> {
        let writer = self.writer(&options, call.as_ref())?;
        let outcome = writer.insert_all_blocking(documents, |_, chunk: Vec<T>| {
            let command = self.insert_chunk_command(&chunk, options.ordered, call.clone())?;
            let status: InsertedIds = self.scope.dispatcher.status_blocking(command)?;
            Ok(status.inserted_ids)
        })?;
        Ok(InsertManyResult { inserted_ids: outcome.results })
    }

    fn find_one_command(&self, find: &FindOptions, call: Option<CommandOptions>) -> Command {
        self.command(operations::FIND_ONE, call).json(find.find_one_payload())
    }

    /// First document matching `find`, or `None`.
    pub async fn find_one(
        &self,
        find: FindOptions,
        call: Option<CommandOptions>,
    ) -> Result<Option<T>> {
        let command = self.find_one_command(&find, call);
        let found: DataAndStatus<FindOneData<T>, Value> =
            self.scope.dispatcher.data(command).await?;
        Ok(found.data.document)
    }

    pub fn find_one_blocking(
        &self,
        find: FindOptions,
        call: Option<CommandOptions>,
    ) -> Result<Option<T>> {
        let command = self.find_one_command(&find, call);
        let found: DataAndStatus<FindOneData<T>, Value> =
            self.scope.dispatcher.data_blocking(command)?;
        Ok(found.data.document)
    }

    /// Lazy cursor over every matching document. No request is sent until
    /// the cursor is advanced, in either call mode.
    pub fn find(&self, find: FindOptions, call: Option<CommandOptions>) -> Cursor<T> {
        Cursor::new(FindFetcher { collection: self.clone(), find, call })
    }

    fn update_command(
        &self,
        operation: Operation,
        filter: &Value,
        update: &Value,
        options: &UpdateOptions,
        page_state: Option<String>,
        call: Option<CommandOptions>,
    ) -> Command {
        let mut payload = Map::new();
        payload.insert("filter".into(), filter.clone());
        payload.insert("update".into(), update.clone());
        if let Some(sort) = &options.sort {
            payload.insert("sort".into(), sort.clone());
        }
        let mut flags = Map::new();
        flags.insert("upsert".into(), json!(options.upsert));
        if let Some(state) = page_state {
            flags.insert("pageState".into(), json!(state));
        }
        payload.insert("options".into(), Value::Object(flags));
        self.command(operation, call).json(Value::Object(payload))
    }

    pub async fn update_one(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
        call: Option<CommandOptions>,
    ) -> Result<UpdateResult> {
        let command =
            self.update_command(operations::UPDATE_ONE, &filter, &update, &options, None, call);
        self.scope.dispatcher.status(command).await
    }

    pub fn update_one_blocking(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
        call: Option<CommandOptions>,
    ) -> Result<UpdateResult> {
        let command =
            self.update_command(operations::UPDATE_ONE, &filter, &update, &options, None, call);
        self.scope.dispatcher.status_blocking(command)
    }

    /// Update every match. The service updates in pages; counts are summed
    /// across pages.
    pub async fn update_many(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
        call: Option<CommandOptions>,
    ) -> Result<UpdateResult> {
        let mut total = UpdateResult::default();
        let mut page_state = None;
        loop {
            let command = self.update_command(
                operations::UPDATE_MANY,
                &filter,
                &update,
                &options,
                page_state.take(),
                call.clone(),
            );
            let page: UpdateResult = self.scope.dispatcher.status(command).await?;
            page_state = continuation(&page.next_page_state);
            total.absorb(page);
            if page_state.is_none() {
                return Ok(total);
            }
            debug!(
                target: "astra_data_api::collection",
                collection = %self.name,
                "updateMany continues"
            );
        }
    }

    pub fn update_many_blocking(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
        call: Option<CommandOptions>,
    ) -> Result<UpdateResult> {
        let mut total = UpdateResult::default();
        let mut page_state = None;
        loop {
            let command = self.update_command(
                operations::UPDATE_MANY,
                &filter,
                &update,
                &options,
                page_state.take(),
                call.clone(),
            );
            let page: UpdateResult = self.scope.dispatcher.status_blocking(command)?;
            page_state = continuation(&page.next_page_state);
            total.absorb(page);
            if page_state.is_none() {
                return Ok(total);
            }
        }
    }

    fn filter_command(
        &self,
        operation: Operation,
        filter: &Value,
        call: Option<CommandOptions>,
    ) -> Command {
        self.command(operation, call).json(json!({ "filter": filter }))
    }

    pub async fn delete_one(
        &self,
        filter: Value,
        call: Option<CommandOptions>,
    ) -> Result<DeleteResult> {
        let command = self.filter_command(operations::DELETE_ONE, &filter, call);
        self.scope.dispatcher.status(command).await
    }

    pub fn delete_one_blocking(
        &self,
        filter: Value,
        call: Option<CommandOptions>,
    ) -> Result<DeleteResult> {
        let command = self.filter_command(operations::DELETE_ONE, &filter, call);
        self.scope.dispatcher.status_blocking(command)
    }

    /// Delete every match, repeating while the service reports more data.
    pub async fn delete_many(
        &self,
        filter: Value,
        call: Option<CommandOptions>,
    ) -> Result<DeleteResult> {
        let mut total = DeleteResult::default();
        loop {
            let command = self.filter_command(operations::DELETE_MANY, &filter, call.clone());
            let page: DeleteResult = self.scope.dispatcher.status(command).await?;
            total.deleted_count += page.deleted_count;
            if !page.more_data {
                return Ok(total);
            }
            debug!(
                target: "astra_data_api::collection",
                collection = %self.name,
                "deleteMany continues"
            );
        }
    }

    pub fn delete_many_blocking(
        &self,
        filter: Value,
        call: Option<CommandOptions>,
    ) -> Result<DeleteResult> {
        let mut total = DeleteResult::default();
        loop {
            let command = self.filter_command(operations::DELETE_MANY, &filter, call.clone());
            let page: DeleteResult = self.scope.dispatcher.status_blocking(command)?;
            total.deleted_count += page.deleted_count;
            if !page.more_data {
                return Ok(total);
            }
        }
    }

    /// Exact count of matching documents, up to the server-side limit.
    pub async fn count_documents(
        &self,
        filter: Value,
        call: Option<CommandOptions>,
    ) -> Result<DocumentCount> {
        let command = self.filter_command(operations::COUNT_DOCUMENTS, &filter, call);
        self.scope.dispatcher.status(command).await
    }

    pub fn count_documents_blocking(
        &self,
        filter: Value,
        call: Option<CommandOptions>,
    ) -> Result<DocumentCount> {
        let command = self.filter_command(operations::COUNT_DOCUMENTS, &filter, call);
        self.scope.dispatcher.status_blocking(command)
    }

    pub async fn estimated_document_count(&self, call: Option<CommandOptions>) -> Result<u64> {
        let command = self.command(operations::ESTIMATED_DOCUMENT_COUNT, call);
        let count: DocumentCount = self.scope.dispatcher.status(command).await?;
        Ok(count.count)
    }

    pub fn estimated_document_count_blocking(&self, call: Option<CommandOptions>) -> Result<u64> {
        let command = self.command(operations::ESTIMATED_DOCUMENT_COUNT, call);
        let count: DocumentCount = self.scope.dispatcher.status_blocking(command)?;
        Ok(count.count)
    }

    fn drop_command(&self, call: Option<CommandOptions>) -> Command {
        self.database_command(operations::DELETE_COLLECTION, call)
            .json(json!({ "name": self.name }))
    }

    /// Delete the collection and all of its documents.
    pub async fn drop(&self, call: Option<CommandOptions>) -> Result<()> {
        let _: Value = self.scope.dispatcher.status(self.drop_command(call)).await?;
        Ok(())
    }

    pub fn drop_blocking(&self, call: Option<CommandOptions>) -> Result<()> {
        let _: Value = self.scope.dispatcher.status_blocking(self.drop_command(call))?;
        Ok(())
    }
}

fn first_inserted_id(status: InsertedIds) -> Result<InsertOneResult> {
    status
        .inserted_ids
        .into_iter()
        .next()
        .map(|inserted_id| InsertOneResult { inserted_id })
        .ok_or_else(|| DataApiError::decode("insertOne returned no inserted id", None))
}

fn continuation(state: &Option<String>) -> Option<String> {
    state.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// Pages of a `find` command.
pub(crate) struct FindFetcher<T> {
    collection: Collection<T>,
    find: FindOptions,
    call: Option<CommandOptions>,
}

impl<T> FindFetcher<T> {
    fn command(&self, page_state: Option<String>) -> Command {
        self.collection
            .command(operations::FIND, self.call.clone())
            .json(self.find.find_payload(page_state.as_deref()))
    }

    fn page(found: DataAndStatus<FindPage<T>, FindStatus>) -> Page<T> {
        let status = found.status.unwrap_or_default();
        let next = found.data.next_page_state.or(status.next_page_state);
        let page = Page::new(found.data.documents, next);
        match status.sort_vector {
            Some(vector) => page.with_sort_vector(vector),
            None => page,
        }
    }
}

#[async_trait]
impl<T> PageFetcher<T> for FindFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch(&mut self, page_state: Option<String>) -> Result<Page<T>> {
        let command = self.command(page_state);
        let found = self.collection.scope().dispatcher.data(command).await?;
        Ok(Self::page(found))
    }

    fn fetch_blocking(&mut self, page_state: Option<String>) -> Result<Page<T>> {
        let command = self.command(page_state);
        let found = self.collection.scope().dispatcher.data_blocking(command)?;
        Ok(Self::page(found))
    }
}
