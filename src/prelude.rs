//! Convenient re-exports for everyday client code.
pub use crate::{
    cursor::Cursor,
    error::{DataApiError, Result},
    model::{FindOptions, InsertManyOptions, UpdateOptions},
    options::{CommandOptions, Environment, TimeoutOptions},
    schema::{ColumnType, SortOrder, TableDefinition, TableSchema},
    CancellationToken, Collection, DataApiClient, Database, Table,
};
