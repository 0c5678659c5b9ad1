//! Layered command options.
//!
//! Options are set at several scopes: the client, a database or admin handle, a
//! collection or table, and a single call. Each scope contributes one
//! [`CommandOptions`] layer in which every field is optional. [`CommandOptions::merge`]
//! resolves an ordered list of layers ("most specific last") into an
//! [`EffectiveConfig`]:
//!
//! - the built-in defaults are prepended to the list;
//! - for every scalar field the last layer that sets it wins;
//! - the timeout bundle merges per sub-field, so a later layer that only sets
//!   `request` keeps an earlier layer's `connection`.
//!
//! Merging borrows its inputs and never mutates them, so one layer can back
//! any number of calls.
//!
//! ```rust
//! use std::time::Duration;
//! use astra_data_api::{CommandOptions, TimeoutOptions};
//!
//! let client = CommandOptions::new()
//!     .keyspace("app")
//!     .timeouts(TimeoutOptions::new().connection(Duration::from_secs(2)));
//! let call = CommandOptions::new()
//!     .timeouts(TimeoutOptions::new().request(Duration::from_secs(1)));
//!
//! let config = CommandOptions::merge([&client, &call]);
//! assert_eq!(config.keyspace, "app");
//! assert_eq!(config.timeouts.connection, Duration::from_secs(2));
//! assert_eq!(config.timeouts.request, Duration::from_secs(1));
//! ```

use crate::error::{DataApiError, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_KEYSPACE: &str = "default_keyspace";
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BULK_OPERATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_KEYSPACE_ADMIN_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_DATABASE_ADMIN_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Kind of backend the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Destination {
    #[default]
    Astra,
    Dse,
    Hcd,
    Cassandra,
    Other,
}

/// Astra control-plane environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    #[default]
    Production,
    Dev,
    Test,
}

impl Environment {
    /// DevOps API base URL for this environment.
    pub fn admin_base_url(self) -> &'static str {
        match self {
            Environment::Production => "https://api.astra.datastax.com/v2",
            Environment::Dev => "https://api.dev.cloud.datastax.com/v2",
            Environment::Test => "https://api.test.cloud.datastax.com/v2",
        }
    }
}

impl FromStr for Environment {
    type Err = DataApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Environment::Production),
            "dev" | "development" => Ok(Environment::Dev),
            "test" => Ok(Environment::Test),
            other => Err(DataApiError::usage(format!("unknown environment '{other}'"))),
        }
    }
}

/// Data API version segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApiVersion {
    #[default]
    V1,
}

impl ApiVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which timeout bucket a command draws its request timeout from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutKind {
    Request,
    BulkOperation,
    KeyspaceAdmin,
    DatabaseAdmin,
}

/// Converts JSON values at the serialization boundary.
///
/// An output converter rewrites payloads before they are sent; an input
/// converter rewrites response bodies before typed decoding.
pub trait ValueConverter: Send + Sync + fmt::Debug {
    fn convert(&self, value: Value) -> Value;
}

/// Partially populated timeout settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutOptions {
    pub connection: Option<Duration>,
    pub request: Option<Duration>,
    pub bulk_operation: Option<Duration>,
    pub keyspace_admin: Option<Duration>,
    pub database_admin: Option<Duration>,
}

impl TimeoutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(mut self, timeout: Duration) -> Self {
        self.connection = Some(timeout);
        self
    }

    pub fn request(mut self, timeout: Duration) -> Self {
        self.request = Some(timeout);
        self
    }

    pub fn bulk_operation(mut self, timeout: Duration) -> Self {
        self.bulk_operation = Some(timeout);
        self
    }

    pub fn keyspace_admin(mut self, timeout: Duration) -> Self {
        self.keyspace_admin = Some(timeout);
        self
    }

    pub fn database_admin(mut self, timeout: Duration) -> Self {
        self.database_admin = Some(timeout);
        self
    }

    fn overlay(&mut self, later: &TimeoutOptions) {
        self.connection = later.connection.or(self.connection);
        self.request = later.request.or(self.request);
        self.bulk_operation = later.bulk_operation.or(self.bulk_operation);
        self.keyspace_admin = later.keyspace_admin.or(self.keyspace_admin);
        self.database_admin = later.database_admin.or(self.database_admin);
    }
}

/// Fully resolved timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connection: Duration,
    pub request: Duration,
    pub bulk_operation: Duration,
    pub keyspace_admin: Duration,
    pub database_admin: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connection: DEFAULT_CONNECTION_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
            bulk_operation: DEFAULT_BULK_OPERATION_TIMEOUT,
            keyspace_admin: DEFAULT_KEYSPACE_ADMIN_TIMEOUT,
            database_admin: DEFAULT_DATABASE_ADMIN_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn for_kind(&self, kind: TimeoutKind) -> Duration {
        match kind {
            TimeoutKind::Request => self.request,
            TimeoutKind::BulkOperation => self.bulk_operation,
            TimeoutKind::KeyspaceAdmin => self.keyspace_admin,
            TimeoutKind::DatabaseAdmin => self.database_admin,
        }
    }
}

/// One layer of optional settings.
#[derive(Clone, Default)]
pub struct CommandOptions {
    pub destination: Option<Destination>,
    pub environment: Option<Environment>,
    pub api_version: Option<ApiVersion>,
    pub keyspace: Option<String>,
    pub include_keyspace_in_url: Option<bool>,
    pub token: Option<String>,
    pub timeouts: TimeoutOptions,
    pub cancellation: Option<CancellationToken>,
    pub input_converter: Option<Arc<dyn ValueConverter>>,
    pub output_converter: Option<Arc<dyn ValueConverter>>,
}

impl fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOptions")
            .field("destination", &self.destination)
            .field("environment", &self.environment)
            .field("api_version", &self.api_version)
            .field("keyspace", &self.keyspace)
            .field("include_keyspace_in_url", &self.include_keyspace_in_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeouts", &self.timeouts)
            .field("cancellation", &self.cancellation.is_some())
            .field("input_converter", &self.input_converter)
            .field("output_converter", &self.output_converter)
            .finish()
    }
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client layer populated from `ASTRA_DB_APPLICATION_TOKEN`,
    /// `ASTRA_DB_KEYSPACE` and `ASTRA_DB_ENVIRONMENT`. Unset variables stay unset.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::new();
        options.token = std::env::var("ASTRA_DB_APPLICATION_TOKEN").ok();
        options.keyspace = std::env::var("ASTRA_DB_KEYSPACE").ok();
        if let Ok(env) = std::env::var("ASTRA_DB_ENVIRONMENT") {
            options.environment = Some(env.parse()?);
        }
        Ok(options)
    }

    pub fn destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn include_keyspace_in_url(mut self, include: bool) -> Self {
        self.include_keyspace_in_url = Some(include);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutOptions) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn input_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.input_converter = Some(converter);
        self
    }

    pub fn output_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.output_converter = Some(converter);
        self
    }

    /// Resolve an ordered list of layers, most specific last, against the defaults.
    pub fn merge<'a, I>(layers: I) -> EffectiveConfig
    where
        I: IntoIterator<Item = &'a CommandOptions>,
    {
        let mut acc = EffectiveConfig::default().to_options();
        for layer in layers {
            acc.overlay(layer);
        }
        EffectiveConfig::from_complete(acc)
    }

    fn overlay(&mut self, later: &CommandOptions) {
        if later.destination.is_some() {
            self.destination = later.destination;
        }
        if later.environment.is_some() {
            self.environment = later.environment;
        }
        if later.api_version.is_some() {
            self.api_version = later.api_version;
        }
        if later.keyspace.is_some() {
            self.keyspace.clone_from(&later.keyspace);
        }
        if later.include_keyspace_in_url.is_some() {
            self.include_keyspace_in_url = later.include_keyspace_in_url;
        }
        if later.token.is_some() {
            self.token.clone_from(&later.token);
        }
        self.timeouts.overlay(&later.timeouts);
        if later.cancellation.is_some() {
            self.cancellation.clone_from(&later.cancellation);
        }
        if later.input_converter.is_some() {
            self.input_converter.clone_from(&later.input_converter);
        }
        if later.output_converter.is_some() {
            self.output_converter.clone_from(&later.output_converter);
        }
    }
}

/// Resolved configuration for one command.
#[derive(Clone)]
pub struct EffectiveConfig {
    pub destination: Destination,
    pub environment: Environment,
    pub api_version: ApiVersion,
    pub keyspace: String,
    pub include_keyspace_in_url: bool,
    pub token: Option<String>,
    pub timeouts: Timeouts,
    pub cancellation: Option<CancellationToken>,
    pub input_converter: Option<Arc<dyn ValueConverter>>,
    pub output_converter: Option<Arc<dyn ValueConverter>>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            destination: Destination::default(),
            environment: Environment::default(),
            api_version: ApiVersion::default(),
            keyspace: DEFAULT_KEYSPACE.to_string(),
            include_keyspace_in_url: true,
            token: None,
            timeouts: Timeouts::default(),
            cancellation: None,
            input_converter: None,
            output_converter: None,
        }
    }
}

impl fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("destination", &self.destination)
            .field("environment", &self.environment)
            .field("api_version", &self.api_version)
            .field("keyspace", &self.keyspace)
            .field("include_keyspace_in_url", &self.include_keyspace_in_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeouts", &self.timeouts)
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Converters compare by identity; cancellation tokens compare by presence.
impl PartialEq for EffectiveConfig {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: &Option<Arc<dyn ValueConverter>>, b: &Option<Arc<dyn ValueConverter>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        self.destination == other.destination
            && self.environment == other.environment
            && self.api_version == other.api_version
            && self.keyspace == other.keyspace
            && self.include_keyspace_in_url == other.include_keyspace_in_url
            && self.token == other.token
            && self.timeouts == other.timeouts
            && self.cancellation.is_some() == other.cancellation.is_some()
            && same(&self.input_converter, &other.input_converter)
            && same(&self.output_converter, &other.output_converter)
    }
}

impl EffectiveConfig {
    /// Request timeout for a command class.
    pub fn request_timeout(&self, kind: TimeoutKind) -> Duration {
        self.timeouts.for_kind(kind)
    }

    /// Lift the resolved config back into a layer with every field set.
    pub fn to_options(&self) -> CommandOptions {
        CommandOptions {
            destination: Some(self.destination),
            environment: Some(self.environment),
            api_version: Some(self.api_version),
            keyspace: Some(self.keyspace.clone()),
            include_keyspace_in_url: Some(self.include_keyspace_in_url),
            token: self.token.clone(),
            timeouts: TimeoutOptions {
                connection: Some(self.timeouts.connection),
                request: Some(self.timeouts.request),
                bulk_operation: Some(self.timeouts.bulk_operation),
                keyspace_admin: Some(self.timeouts.keyspace_admin),
                database_admin: Some(self.timeouts.database_admin),
            },
            cancellation: self.cancellation.clone(),
            input_converter: self.input_converter.clone(),
            output_converter: self.output_converter.clone(),
        }
    }

    /// True once the configured cancellation token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    // Callers only pass layers produced by `to_options` on a full config, so
    // every non-token field is populated.
    fn from_complete(options: CommandOptions) -> Self {
        let defaults = Self::default();
        let t = options.timeouts;
        Self {
            destination: options.destination.unwrap_or(defaults.destination),
            environment: options.environment.unwrap_or(defaults.environment),
            api_version: options.api_version.unwrap_or(defaults.api_version),
            keyspace: options.keyspace.unwrap_or(defaults.keyspace),
            include_keyspace_in_url: options
                .include_keyspace_in_url
                .unwrap_or(defaults.include_keyspace_in_url),
            token: options.token,
            timeouts: Timeouts {
                connection: t.connection.unwrap_or(defaults.timeouts.connection),
                request: t.request.unwrap_or(defaults.timeouts.request),
                bulk_operation: t.bulk_operation.unwrap_or(defaults.timeouts.bulk_operation),
                keyspace_admin: t.keyspace_admin.unwrap_or(defaults.timeouts.keyspace_admin),
                database_admin: t.database_admin.unwrap_or(defaults.timeouts.database_admin),
            },
            cancellation: options.cancellation,
            input_converter: options.input_converter,
            output_converter: options.output_converter,
        }
    }
}
