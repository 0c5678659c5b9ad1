//! One logical request, built per call and consumed once by the dispatcher.

use crate::error::{DataApiError, Result};
use crate::operations::Operation;
use crate::options::CommandOptions;
use crate::transport::ResponseMeta;
use crate::url::UrlTarget;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with the raw status and headers before body decoding.
pub type ResponseInspector = Arc<dyn Fn(&ResponseMeta) + Send + Sync>;

pub struct Command {
    pub(crate) operation: Operation,
    pub(crate) target: UrlTarget,
    pub(crate) layers: Vec<Arc<CommandOptions>>,
    pub(crate) payload: Value,
    pub(crate) inspector: Option<ResponseInspector>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("operation", &self.operation.name)
            .field("target", &self.target)
            .field("layers", &self.layers.len())
            .field("payload", &self.payload)
            .field("inspector", &self.inspector.as_ref().map(|_| "<inspector>"))
            .finish()
    }
}

impl Command {
    pub fn new(operation: Operation, target: UrlTarget) -> Self {
        Self {
            operation,
            target,
            layers: Vec::new(),
            payload: Value::Object(Default::default()),
            inspector: None,
        }
    }

    /// Serialize `payload` as the command body.
    pub fn payload<P: Serialize + ?Sized>(mut self, payload: &P) -> Result<Self> {
        self.payload = serde_json::to_value(payload).map_err(DataApiError::Serialize)?;
        Ok(self)
    }

    /// Use an already built JSON payload.
    pub fn json(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Append one option layer; later layers take precedence.
    pub fn layer(mut self, layer: Arc<CommandOptions>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Append option layers in order.
    pub fn layers<I>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = Arc<CommandOptions>>,
    {
        self.layers.extend(layers);
        self
    }

    /// Append a per-call layer, skipping it when absent.
    pub fn call_options(self, options: Option<CommandOptions>) -> Self {
        match options {
            Some(options) => self.layer(Arc::new(options)),
            None => self,
        }
    }

    pub fn inspect<F>(mut self, inspector: F) -> Self
    where
        F: Fn(&ResponseMeta) + Send + Sync + 'static,
    {
        self.inspector = Some(Arc::new(inspector));
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn target(&self) -> &UrlTarget {
        &self.target
    }

    pub fn payload_value(&self) -> &Value {
        &self.payload
    }
}
