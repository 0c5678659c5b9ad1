//! Command dispatch.
//!
//! Every command follows the same sequence: merge option layers, build the
//! URL, serialize the payload (through the output converter when one is
//! configured), send, hand status and headers to the inspector, interpret the
//! body, and decode one of three response shapes:
//!
//! - raw: the body is the result;
//! - status-wrapped: `{"status": T}`;
//! - data + status: `{"data": T, "status": S}`, used by paginated reads.
//!
//! The async path (`raw`, `status`, `data`) and the blocking path
//! (`raw_blocking`, `status_blocking`, `data_blocking`) share request
//! preparation and response interpretation but perform I/O independently.
//! Nothing here retries; failures surface as [`DataApiError`] variants.

use crate::command::{Command, ResponseInspector};
use crate::error::{ApiErrorDetail, DataApiError, Result, TransportError};
use crate::operations::Envelope;
use crate::options::{CommandOptions, EffectiveConfig};
use crate::transport::{
    AsyncTransport, BlockingTransport, HttpRequest, HttpResponse, ReqwestBlockingTransport,
    ReqwestTransport,
};
use crate::url::UrlFamily;
use http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const TOKEN_HEADER: HeaderName = HeaderName::from_static("token");
const CLIENT_USER_AGENT: &str = concat!("astra-data-api-rust/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 512;

/// Result of a data + status response.
#[derive(Debug, Clone, PartialEq)]
pub struct DataAndStatus<T, S> {
    pub data: T,
    pub status: Option<S>,
}

/// A command resolved into a concrete HTTP request.
struct Prepared {
    name: &'static str,
    request: HttpRequest,
    config: EffectiveConfig,
    inspector: Option<ResponseInspector>,
}

#[derive(Clone)]
pub struct CommandDispatcher {
    async_transport: Arc<dyn AsyncTransport>,
    blocking_transport: Arc<dyn BlockingTransport>,
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("async_transport", &self.async_transport)
            .field("blocking_transport", &self.blocking_transport)
            .finish()
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher {
    /// Dispatcher backed by `reqwest` for both call modes.
    pub fn new() -> Self {
        Self::with_transports(
            Arc::new(ReqwestTransport::new()),
            Arc::new(ReqwestBlockingTransport::new()),
        )
    }

    pub fn with_transports(
        async_transport: Arc<dyn AsyncTransport>,
        blocking_transport: Arc<dyn BlockingTransport>,
    ) -> Self {
        Self { async_transport, blocking_transport }
    }

    /// Resolve the effective config a command would run with.
    pub fn resolve(command: &Command) -> EffectiveConfig {
        CommandOptions::merge(command.layers.iter().map(Arc::as_ref))
    }

    /// Send a command and return its interpreted body (async).
    pub async fn execute(&self, command: Command) -> Result<Value> {
        let prepared = prepare(command)?;
        let response = self.send(&prepared).await?;
        interpret(&prepared, response)
    }

    /// Send a command and return its interpreted body (blocking).
    pub fn execute_blocking(&self, command: Command) -> Result<Value> {
        let prepared = prepare(command)?;
        let response = self.send_blocking(&prepared)?;
        interpret(&prepared, response)
    }

    pub async fn raw<T: DeserializeOwned>(&self, command: Command) -> Result<T> {
        decode_raw(self.execute(command).await?)
    }

    pub async fn status<T: DeserializeOwned>(&self, command: Command) -> Result<T> {
        decode_status(self.execute(command).await?)
    }

    pub async fn data<T, S>(&self, command: Command) -> Result<DataAndStatus<T, S>>
    where
        T: DeserializeOwned,
        S: DeserializeOwned,
    {
        decode_data(self.execute(command).await?)
    }

    pub fn raw_blocking<T: DeserializeOwned>(&self, command: Command) -> Result<T> {
        decode_raw(self.execute_blocking(command)?)
    }

    pub fn status_blocking<T: DeserializeOwned>(&self, command: Command) -> Result<T> {
        decode_status(self.execute_blocking(command)?)
    }

    pub fn data_blocking<T, S>(&self, command: Command) -> Result<DataAndStatus<T, S>>
    where
        T: DeserializeOwned,
        S: DeserializeOwned,
    {
        decode_data(self.execute_blocking(command)?)
    }

    async fn send(&self, prepared: &Prepared) -> Result<HttpResponse> {
        let request = prepared.request.clone();
        let limit = request.timeout;
        let started = Instant::now();
        let io = tokio::time::timeout(limit, self.async_transport.send(request));
        let outcome = match &prepared.config.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(DataApiError::Cancelled),
                    outcome = io => outcome,
                }
            }
            None => io.await,
        };
        let response = match outcome {
            Ok(response) => response?,
            Err(_) => {
                return Err(TransportError::timed_out(format!(
                    "{} timed out after {:?}",
                    prepared.name, limit
                ))
                .into())
            }
        };
        log_response(prepared, &response, started);
        Ok(response)
    }

    fn send_blocking(&self, prepared: &Prepared) -> Result<HttpResponse> {
        let started = Instant::now();
        let response = self.blocking_transport.send(prepared.request.clone())?;
        // The blocking client cannot be interrupted mid-flight; a token that
        // fired while waiting still wins over the response.
        if prepared.config.is_cancelled() {
            return Err(DataApiError::Cancelled);
        }
        log_response(prepared, &response, started);
        Ok(response)
    }
}

fn log_response(prepared: &Prepared, response: &HttpResponse, started: Instant) {
    debug!(
        target: "astra_data_api::dispatch",
        operation = prepared.name,
        status = response.status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "response received"
    );
}

fn prepare(command: Command) -> Result<Prepared> {
    let config = CommandDispatcher::resolve(&command);
    if config.is_cancelled() {
        return Err(DataApiError::Cancelled);
    }
    let Command { operation, target, payload, inspector, .. } = command;
    let url = target.build(&config)?;

    let payload = match &config.output_converter {
        Some(converter) => converter.convert(payload),
        None => payload,
    };
    let body = match operation.envelope {
        Envelope::Named => {
            let mut envelope = Map::new();
            envelope.insert(operation.name.to_string(), payload);
            Some(Value::Object(envelope))
        }
        Envelope::Bare => Some(payload),
        Envelope::Empty => None,
    };
    let body = body
        .map(|value| serde_json::to_vec(&value).map_err(DataApiError::Serialize))
        .transpose()?;

    let headers = headers_for(target.family(), &config)?;
    debug!(
        target: "astra_data_api::dispatch",
        operation = operation.name,
        method = %operation.method,
        url = %url,
        "dispatching command"
    );
    let request = HttpRequest {
        method: operation.method.clone(),
        url,
        headers,
        body,
        timeout: config.request_timeout(operation.timeout),
        connect_timeout: config.timeouts.connection,
    };
    Ok(Prepared { name: operation.name, request, config, inspector })
}

fn headers_for(family: UrlFamily, config: &EffectiveConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    if let Some(token) = &config.token {
        let (name, value) = match family {
            UrlFamily::Admin => (AUTHORIZATION, format!("Bearer {token}")),
            UrlFamily::Data | UrlFamily::Embedding => (TOKEN_HEADER, token.clone()),
        };
        let mut value = HeaderValue::from_str(&value)
            .map_err(|_| DataApiError::usage("token contains characters not allowed in a header"))?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }
    Ok(headers)
}

fn interpret(prepared: &Prepared, response: HttpResponse) -> Result<Value> {
    if let Some(inspect) = &prepared.inspector {
        inspect(&response.meta());
    }
    let status = response.status;
    let body = if response.body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&response.body) {
            Ok(value) => value,
            Err(err) if status.is_success() => {
                return Err(DataApiError::decode(
                    format!("{} returned malformed JSON", prepared.name),
                    Some(err),
                ))
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&response.body);
                let detail = ApiErrorDetail {
                    message: truncate(&text, MAX_ERROR_BODY),
                    ..Default::default()
                };
                return Err(DataApiError::service(status.as_u16(), vec![detail], vec![], None));
            }
        }
    };

    let errors = structured_errors(&body);
    let warnings = collect_warnings(&body);
    for warning in &warnings {
        warn!(
            target: "astra_data_api::dispatch",
            operation = prepared.name,
            warning = %warning,
            "service warning"
        );
    }

    if !errors.is_empty() || !status.is_success() {
        let errors = if errors.is_empty() {
            vec![ApiErrorDetail {
                message: status.canonical_reason().unwrap_or("request failed").to_string(),
                ..Default::default()
            }]
        } else {
            errors
        };
        let partial = partial_payload(&body);
        return Err(DataApiError::service(status.as_u16(), errors, warnings, partial));
    }

    Ok(match &prepared.config.input_converter {
        Some(converter) => converter.convert(body),
        None => body,
    })
}

fn structured_errors(body: &Value) -> Vec<ApiErrorDetail> {
    let Some(Value::Array(entries)) = body.get("errors") else {
        return Vec::new();
    };
    entries
        .iter()
        .map(|entry| match entry {
            Value::String(message) => {
                ApiErrorDetail { message: message.clone(), ..Default::default() }
            }
            other => serde_json::from_value(other.clone()).unwrap_or_else(|_| ApiErrorDetail {
                message: other.to_string(),
                ..Default::default()
            }),
        })
        .collect()
}

fn collect_warnings(body: &Value) -> Vec<Value> {
    let top = body.get("warnings");
    let nested = body.get("status").and_then(|s| s.get("warnings"));
    [top, nested]
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flat_map(|items| items.iter().cloned())
        .collect()
}

fn partial_payload(body: &Value) -> Option<Value> {
    let mut partial = Map::new();
    for key in ["status", "data"] {
        if let Some(value) = body.get(key) {
            partial.insert(key.to_string(), value.clone());
        }
    }
    (!partial.is_empty()).then_some(Value::Object(partial))
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn take_field(body: Value, field: &str) -> Option<Value> {
    match body {
        Value::Object(mut map) => map.remove(field),
        _ => None,
    }
}

fn from_value<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| DataApiError::decode(format!("unexpected {what} shape: {err}"), Some(err)))
}

pub(crate) fn decode_raw<T: DeserializeOwned>(body: Value) -> Result<T> {
    from_value(body, "response")
}

pub(crate) fn decode_status<T: DeserializeOwned>(body: Value) -> Result<T> {
    let status = take_field(body, "status")
        .ok_or_else(|| DataApiError::decode("response has no `status` field", None))?;
    from_value(status, "status")
}

pub(crate) fn decode_data<T, S>(body: Value) -> Result<DataAndStatus<T, S>>
where
    T: DeserializeOwned,
    S: DeserializeOwned,
{
    let Value::Object(mut map) = body else {
        return Err(DataApiError::decode("response is not a JSON object", None));
    };
    let data = map
        .remove("data")
        .ok_or_else(|| DataApiError::decode("response has no `data` field", None))?;
    let data = from_value(data, "data")?;
    let status = match map.remove("status") {
        Some(Value::Null) | None => None,
        Some(status) => Some(from_value(status, "status")?),
    };
    Ok(DataAndStatus { data, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_decoding_requires_status_field() {
        let err = decode_status::<Value>(json!({"data": {}})).unwrap_err();
        assert!(err.is_decode());
        let ok: Value = decode_status(json!({"status": {"ok": 1}})).unwrap();
        assert_eq!(ok, json!({"ok": 1}));
    }

    #[test]
    fn data_decoding_treats_status_as_optional() {
        let parsed: DataAndStatus<Value, Value> = decode_data(json!({"data": [1, 2]})).unwrap();
        assert_eq!(parsed.data, json!([1, 2]));
        assert!(parsed.status.is_none());
        assert!(decode_data::<Value, Value>(json!([1])).unwrap_err().is_decode());
    }

    #[test]
    fn structured_errors_accept_strings_and_objects() {
        let errors = structured_errors(&json!({
            "errors": ["plain", {"message": "typed", "errorCode": "X"}]
        }));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "plain");
        assert_eq!(errors[1].error_code.as_deref(), Some("X"));
    }

    #[test]
    fn warnings_are_collected_from_both_locations() {
        let warnings = collect_warnings(&json!({
            "warnings": ["top"],
            "status": {"warnings": [{"message": "nested"}]}
        }));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn admin_headers_use_bearer_token() {
        let config = CommandOptions::merge([&CommandOptions::new().token("AstraCS:x")]);
        let headers = headers_for(UrlFamily::Admin, &config).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer AstraCS:x");
        let headers = headers_for(UrlFamily::Data, &config).unwrap();
        assert_eq!(headers.get("token").unwrap(), "AstraCS:x");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn invalid_token_is_a_usage_error() {
        let config = CommandOptions::merge([&CommandOptions::new().token("bad\ntoken")]);
        assert!(headers_for(UrlFamily::Data, &config).unwrap_err().is_usage());
    }
}
