//! Catalog of the operations this client issues.
//!
//! The request envelope is part of the remote service's contract, so each
//! operation carries it as data: data-plane commands wrap their payload as
//! `{"<name>": payload}`, DevOps API calls send the payload as the whole body
//! or no body at all.

use crate::options::TimeoutKind;
use http::Method;

/// How a payload is placed in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{"<operation name>": payload}`
    Named,
    /// The payload is the body.
    Bare,
    /// No body is sent.
    Empty,
}

/// Static description of one remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub method: Method,
    pub envelope: Envelope,
    pub timeout: TimeoutKind,
}

impl Operation {
    /// A data-plane command: `POST` with a named envelope.
    pub const fn command(name: &'static str, timeout: TimeoutKind) -> Self {
        Self { name, method: Method::POST, envelope: Envelope::Named, timeout }
    }

    pub const fn http(
        name: &'static str,
        method: Method,
        envelope: Envelope,
        timeout: TimeoutKind,
    ) -> Self {
        Self { name, method, envelope, timeout }
    }
}

// Database scope.
pub const CREATE_COLLECTION: Operation =
    Operation::command("createCollection", TimeoutKind::KeyspaceAdmin);
pub const FIND_COLLECTIONS: Operation = Operation::command("findCollections", TimeoutKind::Request);
pub const DELETE_COLLECTION: Operation =
    Operation::command("deleteCollection", TimeoutKind::KeyspaceAdmin);
pub const CREATE_TABLE: Operation = Operation::command("createTable", TimeoutKind::KeyspaceAdmin);
pub const LIST_TABLES: Operation = Operation::command("listTables", TimeoutKind::Request);
pub const DROP_TABLE: Operation = Operation::command("dropTable", TimeoutKind::KeyspaceAdmin);
pub const FIND_EMBEDDING_PROVIDERS: Operation =
    Operation::command("findEmbeddingProviders", TimeoutKind::Request);

// Collection and table scope.
pub const INSERT_ONE: Operation = Operation::command("insertOne", TimeoutKind::Request);
pub const INSERT_MANY: Operation = Operation::command("insertMany", TimeoutKind::BulkOperation);
pub const FIND_ONE: Operation = Operation::command("findOne", TimeoutKind::Request);
pub const FIND: Operation = Operation::command("find", TimeoutKind::Request);
pub const UPDATE_ONE: Operation = Operation::command("updateOne", TimeoutKind::Request);
pub const UPDATE_MANY: Operation = Operation::command("updateMany", TimeoutKind::BulkOperation);
pub const DELETE_ONE: Operation = Operation::command("deleteOne", TimeoutKind::Request);
pub const DELETE_MANY: Operation = Operation::command("deleteMany", TimeoutKind::BulkOperation);
pub const COUNT_DOCUMENTS: Operation = Operation::command("countDocuments", TimeoutKind::Request);
pub const ESTIMATED_DOCUMENT_COUNT: Operation =
    Operation::command("estimatedDocumentCount", TimeoutKind::Request);

// DevOps API.
pub const LIST_DATABASES: Operation =
    Operation::http("listDatabases", Method::GET, Envelope::Empty, TimeoutKind::Request);
pub const GET_DATABASE: Operation =
    Operation::http("getDatabase", Method::GET, Envelope::Empty, TimeoutKind::Request);
pub const CREATE_DATABASE: Operation =
    Operation::http("createDatabase", Method::POST, Envelope::Bare, TimeoutKind::DatabaseAdmin);
pub const TERMINATE_DATABASE: Operation =
    Operation::http("terminateDatabase", Method::POST, Envelope::Empty, TimeoutKind::DatabaseAdmin);
pub const CREATE_KEYSPACE: Operation =
    Operation::http("createKeyspace", Method::POST, Envelope::Empty, TimeoutKind::KeyspaceAdmin);
pub const DROP_KEYSPACE: Operation =
    Operation::http("dropKeyspace", Method::DELETE, Envelope::Empty, TimeoutKind::KeyspaceAdmin);
