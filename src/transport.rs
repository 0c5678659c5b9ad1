//! HTTP transports.
//!
//! The dispatcher talks to the network through two independent seams:
//! [`AsyncTransport`] for the suspending path and [`BlockingTransport`] for the
//! blocking path. The blocking implementation performs synchronous I/O itself
//! and never parks on an asynchronous future, so it is safe on hosts without
//! a spare executor thread.
//!
//! Any tower `Service<HttpRequest>` can be used as an async transport through
//! [`ServiceTransport`], which lets callers wrap the HTTP layer in middleware.

use crate::error::TransportError;
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use tower_service::Service;

/// One outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

/// One HTTP response, body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn meta(&self) -> ResponseMeta {
        ResponseMeta { status: self.status, headers: self.headers.clone() }
    }
}

/// Response metadata handed to inspectors before the body is decoded.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseMeta {
    /// Value of the `Location` header, if present and valid UTF-8.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(http::header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

#[async_trait]
pub trait AsyncTransport: Send + Sync + fmt::Debug {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub trait BlockingTransport: Send + Sync + fmt::Debug {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: AsyncTransport + ?Sized> AsyncTransport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

impl<T: BlockingTransport + ?Sized> BlockingTransport for Arc<T> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Async transport backed by `reqwest`.
///
/// Connect timeouts are a client-level setting in `reqwest`, so one client is
/// kept per distinct connect timeout.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<Duration, reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, connect_timeout: Duration) -> Result<reqwest::Client, TransportError> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| TransportError::new("reqwest client cache poisoned"))?;
        if let Some(client) = clients.get(&connect_timeout) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;
        clients.insert(connect_timeout, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl AsyncTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client(request.connect_timeout)?;
        let mut builder = client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, headers, body })
    }
}

/// Blocking transport backed by `reqwest::blocking`.
///
/// Clients are built on first use. Build and drop them outside of an async
/// runtime context; `reqwest` refuses to run its blocking client there.
#[derive(Debug, Default)]
pub struct ReqwestBlockingTransport {
    clients: Mutex<HashMap<Duration, reqwest::blocking::Client>>,
}

impl ReqwestBlockingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(
        &self,
        connect_timeout: Duration,
    ) -> Result<reqwest::blocking::Client, TransportError> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| TransportError::new("reqwest client cache poisoned"))?;
        if let Some(client) = clients.get(&connect_timeout) {
            return Ok(client.clone());
        }
        let client =
            reqwest::blocking::Client::builder().connect_timeout(connect_timeout).build()?;
        clients.insert(connect_timeout, client.clone());
        Ok(client)
    }
}

impl BlockingTransport for ReqwestBlockingTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client(request.connect_timeout)?;
        let mut builder = client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();
        Ok(HttpResponse { status, headers, body })
    }
}

/// Adapts a tower service into an [`AsyncTransport`].
#[derive(Clone)]
pub struct ServiceTransport<S> {
    inner: S,
}

impl<S> ServiceTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> fmt::Debug for ServiceTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTransport").field("inner", &"<service>").finish()
    }
}

#[async_trait]
impl<S> AsyncTransport for ServiceTransport<S>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = TransportError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
{
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.inner.clone().oneshot(request).await
    }
}
