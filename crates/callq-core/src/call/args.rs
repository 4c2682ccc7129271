//! Arguments describing one call, as accepted by `Service::call` and batch files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key/value payload sent with a call.
pub type Payload = BTreeMap<String, serde_json::Value>;

fn default_method() -> String {
    "GET".to_string()
}

/// Everything the caller says about a call before it is admitted.
///
/// Field names follow snake_case; the camelCase spellings (`readOnly`,
/// `pipeName`, `sync`) are accepted as aliases when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub data: Payload,
    /// True when the call has no side effects. Read-only calls pass the
    /// service's read-only gate and do not make the service unclean.
    #[serde(default, alias = "readOnly")]
    pub read_only: bool,
    /// Name of the pipe this call is serialized on; empty means unordered.
    #[serde(default, alias = "pipeName", alias = "pipe")]
    pub pipe_name: String,
    /// Jump every waiting member of the pipe (never the dispatched head).
    #[serde(default)]
    pub prioritize: bool,
    /// Block the dispatching thread until the transport responds. Discouraged.
    #[serde(default, alias = "sync")]
    pub synchronous: bool,
}

impl CallArgs {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            data: Payload::new(),
            read_only: false,
            pipe_name: String::new(),
            prioritize: false,
            synchronous: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn with_data(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_pipe(mut self, name: impl Into<String>) -> Self {
        self.pipe_name = name.into();
        self
    }

    pub fn with_priority(mut self, prioritize: bool) -> Self {
        self.prioritize = prioritize;
        self
    }

    pub fn with_sync(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// The pipe name, or `None` for an unordered call.
    pub fn pipe(&self) -> Option<&str> {
        if self.pipe_name.is_empty() {
            None
        } else {
            Some(&self.pipe_name)
        }
    }

    /// Upper-case and trim the method so matching and dispatch agree.
    pub(crate) fn normalized(mut self) -> Self {
        self.method = self.method.trim().to_ascii_uppercase();
        if self.method.is_empty() {
            self.method = default_method();
        }
        self
    }
}
