//! Request options and result types exchanged with the Data API and the
//! DevOps API. Wire names are camelCase.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Result of `insertOne`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Value,
}

/// Result of a batched `insertMany`, ids in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InsertedIds {
    #[serde(default)]
    pub inserted_ids: Vec<Value>,
}

/// Result of `updateOne` and `updateMany`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    #[serde(default)]
    pub matched_count: u64,
    #[serde(default)]
    pub modified_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upserted_id: Option<Value>,
    #[serde(default, skip_serializing)]
    pub(crate) next_page_state: Option<String>,
}

impl UpdateResult {
    pub(crate) fn absorb(&mut self, page: UpdateResult) {
        self.matched_count += page.matched_count;
        self.modified_count += page.modified_count;
        if page.upserted_id.is_some() {
            self.upserted_id = page.upserted_id;
        }
    }
}

/// Result of `deleteOne` and `deleteMany`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    #[serde(default)]
    pub deleted_count: i64,
    #[serde(default, skip_serializing)]
    pub(crate) more_data: bool,
}

/// Result of `countDocuments`. `more_data` is set when the count stopped at
/// the server-side limit rather than at the end of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCount {
    pub count: u64,
    #[serde(default)]
    pub more_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
    DotProduct,
    Euclidean,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<SimilarityMetric>,
    /// Server-side embedding (vectorize) service settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Value>,
}

/// Collection settings sent as `createCollection.options`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<VectorOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_id: Option<Value>,
}

impl CollectionDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector(mut self, dimension: u32, metric: SimilarityMetric) -> Self {
        self.vector =
            Some(VectorOptions { dimension: Some(dimension), metric: Some(metric), service: None });
        self
    }

    pub fn indexing(mut self, indexing: Value) -> Self {
        self.indexing = Some(indexing);
        self
    }

    /// Default `_id` type, e.g. `"uuid"` or `"objectId"`.
    pub fn default_id(mut self, kind: &str) -> Self {
        self.default_id = Some(json!({ "type": kind }));
        self
    }
}

/// One entry of `findCollections` with `explain: true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub name: String,
    #[serde(default)]
    pub options: CollectionDefinition,
}

/// Filter, sort, projection and paging options for `find` and `findOne`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindOptions {
    pub filter: Option<Value>,
    pub sort: Option<Value>,
    pub projection: Option<Value>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub include_similarity: bool,
    pub include_sort_vector: bool,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sort by similarity to `vector`.
    pub fn vector_sort(self, vector: &[f32]) -> Self {
        self.sort(json!({ "$vector": vector }))
    }

    /// Sort by similarity to server-side embedded `text`.
    pub fn vectorize_sort(self, text: &str) -> Self {
        self.sort(json!({ "$vectorize": text }))
    }

    pub fn projection(mut self, projection: Value) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn include_similarity(mut self, include: bool) -> Self {
        self.include_similarity = include;
        self
    }

    pub fn include_sort_vector(mut self, include: bool) -> Self {
        self.include_sort_vector = include;
        self
    }

    /// `find` payload for one page.
    pub(crate) fn find_payload(&self, page_state: Option<&str>) -> Value {
        let mut options = Map::new();
        if let Some(limit) = self.limit {
            options.insert("limit".into(), json!(limit));
        }
        if let Some(skip) = self.skip {
            options.insert("skip".into(), json!(skip));
        }
        if self.include_similarity {
            options.insert("includeSimilarity".into(), json!(true));
        }
        if self.include_sort_vector {
            options.insert("includeSortVector".into(), json!(true));
        }
        if let Some(state) = page_state {
            options.insert("pageState".into(), json!(state));
        }
        let mut payload = self.selection();
        if !options.is_empty() {
            payload.insert("options".into(), Value::Object(options));
        }
        Value::Object(payload)
    }

    /// `findOne` payload; paging options do not apply.
    pub(crate) fn find_one_payload(&self) -> Value {
        let mut payload = self.selection();
        if self.include_similarity {
            payload.insert("options".into(), json!({ "includeSimilarity": true }));
        }
        Value::Object(payload)
    }

    fn selection(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("filter".into(), self.filter.clone().unwrap_or_else(|| json!({})));
        if let Some(sort) = &self.sort {
            payload.insert("sort".into(), sort.clone());
        }
        if let Some(projection) = &self.projection {
            payload.insert("projection".into(), projection.clone());
        }
        payload
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound = "T: serde::de::DeserializeOwned")]
pub(crate) struct FindPage<T> {
    #[serde(default = "Vec::new")]
    pub documents: Vec<T>,
    #[serde(default)]
    pub next_page_state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FindStatus {
    #[serde(default)]
    pub sort_vector: Option<Vec<f32>>,
    #[serde(default)]
    pub next_page_state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: serde::de::DeserializeOwned")]
pub(crate) struct FindOneData<T> {
    #[serde(default = "Option::default")]
    pub document: Option<T>,
}

/// Options for `insertMany`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertManyOptions {
    pub ordered: bool,
    pub chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
}

impl InsertManyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}

/// Options for `updateOne` and `updateMany`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateOptions {
    pub upsert: bool,
    pub sort: Option<Value>,
}

impl UpdateOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudProvider {
    Aws,
    Gcp,
    Azure,
}

/// Lifecycle state reported by the DevOps API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatabaseStatus {
    Active,
    Pending,
    Preparing,
    Prepared,
    Initializing,
    Maintenance,
    Hibernating,
    Hibernated,
    Resuming,
    Parked,
    Unparking,
    Terminating,
    Terminated,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyspace: Option<String>,
    #[serde(default)]
    pub keyspaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<CloudProvider>,
}

/// A database as described by `GET /databases/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub id: String,
    pub status: DatabaseStatus,
    #[serde(default)]
    pub info: DatabaseDetails,
}

impl DatabaseInfo {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// All keyspaces, with the default keyspace first.
    pub fn keyspaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.info.keyspace.iter().cloned().collect();
        for name in &self.info.keyspaces {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Body of `POST /databases`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseCreationOptions {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyspace: Option<String>,
    pub cloud_provider: CloudProvider,
    pub region: String,
    pub tier: String,
    pub capacity_units: u32,
    pub db_type: String,
}

impl DatabaseCreationOptions {
    /// Serverless vector database in `region`.
    pub fn new(
        name: impl Into<String>,
        cloud_provider: CloudProvider,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            keyspace: None,
            cloud_provider,
            region: region.into(),
            tier: "serverless".to_string(),
            capacity_units: 1,
            db_type: "vector".to_string(),
        }
    }

    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_dimension: Option<u32>,
}

/// One provider from `findEmbeddingProviders`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingProviderInfo {
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub supported_authentication: Map<String, Value>,
    #[serde(default)]
    pub models: Vec<EmbeddingModel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmbeddingProvidersStatus {
    #[serde(default)]
    pub embedding_providers: BTreeMap<String, EmbeddingProviderInfo>,
}
