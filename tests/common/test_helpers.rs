//! Scripted in-memory transport shared by the integration tests.
#![allow(dead_code)]

use astra_data_api::{
    AsyncTransport, BlockingTransport, CommandDispatcher, CommandOptions, DataApiClient,
    HttpRequest, HttpResponse, TransportError,
};
use async_trait::async_trait;
use http::StatusCode;
use rand::{rng, Rng};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = Arc<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

#[derive(Default)]
struct State {
    scripted: VecDeque<Result<HttpResponse, TransportError>>,
    requests: Vec<HttpRequest>,
}

/// Answers from a queue of scripted responses, or from a handler when one is
/// set. Every request is recorded.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
    handler: Option<Handler>,
    delay: Option<(u64, u64)>,
}

impl fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeTransport").field("delay", &self.delay).finish()
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self { handler: Some(Arc::new(handler)), ..Self::default() }
    }

    /// Delay every response by a random number of milliseconds in `[min, max]`.
    pub fn with_random_delay(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.delay = Some((min_ms, max_ms));
        self
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        self.state.lock().unwrap().scripted.push_back(Ok(response));
        self
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(HttpResponse::json(StatusCode::from_u16(status).unwrap(), &body))
    }

    pub fn push_error(&self, error: TransportError) -> &Self {
        self.state.lock().unwrap().scripted.push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Parsed JSON bodies of the recorded requests; `Null` when no body was sent.
    pub fn bodies(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .map(|r| r.body.as_ref().map(|b| serde_json::from_slice(b).unwrap()).unwrap_or(Value::Null))
            .collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::with_transports(Arc::new(self.clone()), Arc::new(self.clone()))
    }

    pub fn client(&self, options: CommandOptions) -> DataApiClient {
        DataApiClient::with_options(options).with_dispatcher(self.dispatcher())
    }

    fn pick_delay(&self) -> Option<Duration> {
        self.delay.map(|(min, max)| Duration::from_millis(rng().random_range(min..=max)))
    }

    fn respond(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = match &self.handler {
            Some(handler) => handler(&request),
            None => self
                .state
                .lock()
                .unwrap()
                .scripted
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::new("no scripted response left"))),
        };
        self.state.lock().unwrap().requests.push(request);
        reply
    }
}

#[async_trait]
impl AsyncTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(delay) = self.pick_delay() {
            tokio::time::sleep(delay).await;
        }
        self.respond(request)
    }
}

impl BlockingTransport for FakeTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(delay) = self.pick_delay() {
            std::thread::sleep(delay);
        }
        self.respond(request)
    }
}

pub const ENDPOINT: &str =
    "https://01234567-89ab-cdef-0123-456789abcdef-us-east1.apps.astra.datastax.com";

pub fn options() -> CommandOptions {
    CommandOptions::new().token("AstraCS:test").keyspace("app")
}
