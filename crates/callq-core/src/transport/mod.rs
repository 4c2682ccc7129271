//! Transport boundary: how an admitted call reaches the network.
//!
//! The service hands each dispatched call to a `Transport` together with a
//! `Completion`. The transport reports exactly one outcome by consuming the
//! completion with `success` or `error`; dropping it unused rejects the call.

mod form;
mod http;
mod manual;
mod parse;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::call::{Call, CallId, Payload};
use crate::error::CallError;

pub use http::CurlTransport;
pub use manual::{InFlight, ManualTransport};

/// What the transport needs to issue one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub data: Payload,
    /// Perform the request on the dispatching thread.
    pub synchronous: bool,
}

/// A response the transport considered successful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u32,
    /// Header lines of the final response, in order.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn new(status: u32, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// Issues requests. Implementations may complete synchronously inside `send`
/// or later from any thread.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request, completion: Completion);
}

/// One-shot outcome reporter for a dispatched call.
pub struct Completion {
    call: Option<Arc<Call>>,
}

impl Completion {
    pub(crate) fn new(call: Arc<Call>) -> Self {
        Self { call: Some(call) }
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.call.as_ref().map(|c| c.id())
    }

    /// True once the caller has abandoned the call; the transport may skip work.
    pub fn is_abandoned(&self) -> bool {
        self.call.as_ref().map_or(true, |c| c.is_abandoned())
    }

    /// Fulfil the call with `response`.
    pub fn success(mut self, response: Response) {
        if let Some(call) = self.call.take() {
            call.complete(Ok(response));
        }
    }

    /// Reject the call; the error displays as `"<status>: <body>"`.
    pub fn error(mut self, status: impl Into<String>, body: impl Into<String>) {
        if let Some(call) = self.call.take() {
            call.complete(Err(CallError::transport(status, body)));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(call) = self.call.take() {
            if !call.is_abandoned() {
                tracing::warn!(
                    call = %call.id(),
                    "transport dropped completion without an outcome"
                );
            }
            call.complete(Err(CallError::Dropped));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("call", &self.call_id())
            .finish()
    }
}
