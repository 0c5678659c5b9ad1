#![forbid(unsafe_code)]

//! # astra-data-api
//!
//! Client for the DataStax Astra Data API (documents, tables, vector search)
//! and the Astra DevOps API (databases, keyspaces), with an async and a
//! blocking form of every call.
//!
//! ## Features
//!
//! - **Layered options**: client, database, collection and per-call
//!   [`CommandOptions`] merged field by field, most specific last
//! - **One dispatcher** for all commands, with three response shapes and a
//!   typed error for every failure class
//! - **Cursors** that page lazily and flatten into a `Stream` or an `Iterator`
//! - **Batched inserts** with bounded concurrency and partial-failure reports
//! - **Polling** for admin operations that complete asynchronously
//! - **Pluggable transport**: `reqwest` by default, any tower `Service` on request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use astra_data_api::{DataApiClient, FindOptions};
//! use futures::StreamExt;
//! use serde_json::{json, Value};
//!
//! #[tokio::main]
//! async fn main() -> astra_data_api::Result<()> {
//!     let client = DataApiClient::new("AstraCS:...");
//!     let db = client.database("https://<id>-<region>.apps.astra.datastax.com");
//!     let users = db.collection::<Value>("users");
//!
//!     users.insert_one(&json!({"name": "ada"}), None).await?;
//!
//!     let cursor = users.find(FindOptions::new().filter(json!({"name": "ada"})), None);
//!     let mut found = Box::pin(cursor.into_stream());
//!     while let Some(doc) = found.next().await {
//!         println!("{}", doc?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod batch;
pub mod client;
pub mod clock;
pub mod collection;
pub mod command;
pub mod cursor;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod operations;
pub mod options;
pub mod polling;
pub mod prelude;
pub mod schema;
pub mod sleeper;
pub mod table;
pub mod transport;
pub mod url;

// Re-exports
pub use admin::{AstraAdmin, DatabaseAdmin};
pub use batch::{BatchOutcome, BatchPlan, BatchedConcurrentWriter};
pub use client::DataApiClient;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use collection::Collection;
pub use command::Command;
pub use cursor::{Cursor, CursorIter, CursorState, Page, PageFetcher};
pub use database::Database;
pub use dispatcher::{CommandDispatcher, DataAndStatus};
pub use error::{ApiErrorDetail, ChunkFailure, DataApiError, Result, TransportError};
pub use model::{
    CloudProvider, CollectionDefinition, CollectionInfo, DatabaseCreationOptions, DatabaseInfo,
    DatabaseStatus, DeleteResult, DocumentCount, EmbeddingProviderInfo, FindOptions,
    InsertManyOptions, InsertManyResult, InsertOneResult, SimilarityMetric, UpdateOptions,
    UpdateResult,
};
pub use operations::{Envelope, Operation};
pub use options::{
    ApiVersion, CommandOptions, Destination, EffectiveConfig, Environment, TimeoutKind,
    TimeoutOptions, Timeouts, ValueConverter,
};
pub use polling::PollingWaiter;
pub use schema::{ColumnType, SortOrder, TableDefinition, TableSchema};
pub use sleeper::{Sleeper, TokioSleeper, TrackingSleeper};
pub use table::Table;
pub use transport::{
    AsyncTransport, BlockingTransport, HttpRequest, HttpResponse, ReqwestBlockingTransport,
    ReqwestTransport, ResponseMeta, ServiceTransport,
};
pub use url::{UrlFamily, UrlTarget};
pub use tokio_util::sync::CancellationToken;
