//! Declarative table schemas.
//!
//! A [`TableDefinition`] lists columns in order, each with a wire type and a
//! role in the primary key. Row types describe themselves by implementing
//! [`TableSchema`]; nothing is discovered at runtime.
//!
//! ```rust
//! use astra_data_api::schema::{ColumnType, SortOrder, TableDefinition, TableSchema};
//!
//! struct Reading;
//!
//! impl TableSchema for Reading {
//!     fn table_definition() -> TableDefinition {
//!         TableDefinition::new()
//!             .partition_key("sensor", ColumnType::Text)
//!             .clustering_key("at", ColumnType::Timestamp, SortOrder::Descending)
//!             .column("value", ColumnType::Double)
//!     }
//! }
//!
//! let payload = Reading::table_definition().create_payload("readings", true).unwrap();
//! assert_eq!(payload["definition"]["primaryKey"]["partitionBy"][0], "sensor");
//! ```

use crate::error::{DataApiError, Result};
use serde_json::{json, Map, Value};

/// Column type as named on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Ascii,
    Int,
    BigInt,
    SmallInt,
    TinyInt,
    VarInt,
    Float,
    Double,
    Decimal,
    Boolean,
    Uuid,
    TimeUuid,
    Timestamp,
    Date,
    Time,
    Duration,
    Blob,
    Inet,
    Vector { dimension: u32 },
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
}

impl ColumnType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Ascii => "ascii",
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::SmallInt => "smallint",
            ColumnType::TinyInt => "tinyint",
            ColumnType::VarInt => "varint",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Uuid => "uuid",
            ColumnType::TimeUuid => "timeuuid",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Date => "date",
            ColumnType::Time => "time",
            ColumnType::Duration => "duration",
            ColumnType::Blob => "blob",
            ColumnType::Inet => "inet",
            ColumnType::Vector { .. } => "vector",
            ColumnType::List(_) => "list",
            ColumnType::Set(_) => "set",
            ColumnType::Map(..) => "map",
        }
    }

    fn is_collection(&self) -> bool {
        matches!(self, ColumnType::List(_) | ColumnType::Set(_) | ColumnType::Map(..))
    }

    fn to_wire(&self) -> Value {
        let mut column = Map::new();
        column.insert("type".into(), json!(self.wire_name()));
        match self {
            ColumnType::Vector { dimension } => {
                column.insert("dimension".into(), json!(dimension));
            }
            ColumnType::List(value) | ColumnType::Set(value) => {
                column.insert("valueType".into(), json!(value.wire_name()));
            }
            ColumnType::Map(key, value) => {
                column.insert("keyType".into(), json!(key.wire_name()));
                column.insert("valueType".into(), json!(value.wire_name()));
            }
            _ => {}
        }
        Value::Object(column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    fn wire(self) -> i8 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Place of a column in the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Regular,
    PartitionKey,
    ClusteringKey(SortOrder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub role: ColumnRole,
}

/// Ordered column list plus primary key layout. Key order follows the order
/// in which key columns were added.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableDefinition {
    columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.with_role(name, column_type, ColumnRole::Regular)
    }

    pub fn partition_key(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.with_role(name, column_type, ColumnRole::PartitionKey)
    }

    pub fn clustering_key(
        self,
        name: impl Into<String>,
        column_type: ColumnType,
        order: SortOrder,
    ) -> Self {
        self.with_role(name, column_type, ColumnRole::ClusteringKey(order))
    }

    pub fn with_role(
        mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        role: ColumnRole,
    ) -> Self {
        self.columns.push(ColumnDefinition { name: name.into(), column_type, role });
        self
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn partition_by(&self) -> Vec<&str> {
        self.keys(|role| matches!(role, ColumnRole::PartitionKey))
            .map(|c| c.name.as_str())
            .collect()
    }

    fn keys(&self, pick: fn(ColumnRole) -> bool) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(move |c| pick(c.role))
    }

    pub fn validate(&self) -> Result<()> {
        if self.partition_by().is_empty() {
            return Err(DataApiError::usage("table definition needs at least one partition key"));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(DataApiError::usage("column names must not be empty"));
            }
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DataApiError::usage(format!("duplicate column '{}'", column.name)));
            }
            if column.role != ColumnRole::Regular && column.column_type.is_collection() {
                return Err(DataApiError::usage(format!(
                    "collection column '{}' cannot be part of the primary key",
                    column.name
                )));
            }
        }
        Ok(())
    }

    /// `{"columns": .., "primaryKey": {"partitionBy": .., "partitionSort": ..}}`
    pub fn to_wire(&self) -> Result<Value> {
        self.validate()?;
        let columns: Map<String, Value> =
            self.columns.iter().map(|c| (c.name.clone(), c.column_type.to_wire())).collect();
        let partition_sort: Map<String, Value> = self
            .columns
            .iter()
            .filter_map(|c| match c.role {
                ColumnRole::ClusteringKey(order) => Some((c.name.clone(), json!(order.wire()))),
                _ => None,
            })
            .collect();
        Ok(json!({
            "columns": columns,
            "primaryKey": {
                "partitionBy": self.partition_by(),
                "partitionSort": partition_sort,
            }
        }))
    }

    /// Full `createTable` payload.
    pub fn create_payload(&self, name: &str, if_not_exists: bool) -> Result<Value> {
        Ok(json!({
            "name": name,
            "definition": self.to_wire()?,
            "options": { "ifNotExists": if_not_exists },
        }))
    }
}

/// Row types that know their own table layout.
pub trait TableSchema {
    fn table_definition() -> TableDefinition;
}
