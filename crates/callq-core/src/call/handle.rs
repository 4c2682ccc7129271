//! Caller-facing handle for a call: await it, inspect it, or abandon it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::CallError;
use crate::promise::CallFuture;
use crate::transport::Response;

use super::{Call, CallArgs, CallId};

/// Returned by `Service::call`. Resolves with the transport's response or the
/// rejection reason. An abandoned call's handle never resolves.
pub struct CallHandle {
    call: Arc<Call>,
    future: CallFuture<Response>,
}

impl CallHandle {
    pub(crate) fn new(call: Arc<Call>, future: CallFuture<Response>) -> Self {
        Self { call, future }
    }

    pub fn id(&self) -> CallId {
        self.call.id()
    }

    pub fn method(&self) -> &str {
        &self.call.args().method
    }

    pub fn url(&self) -> &str {
        &self.call.args().url
    }

    pub fn args(&self) -> &CallArgs {
        self.call.args()
    }

    /// Stop tracking this call. Any response that arrives later is ignored and
    /// the handle never resolves. Returns false if the call had already
    /// settled or been abandoned.
    pub fn abandon(&self) -> bool {
        self.call.abandon()
    }

    pub fn is_abandoned(&self) -> bool {
        self.call.is_abandoned()
    }

    /// True once an outcome has been accepted. Stays true after the outcome
    /// is taken. While the service is still deregistering the call (a brief
    /// window inside the settling thread) this is already true but
    /// `try_result` returns `None`.
    pub fn is_settled(&self) -> bool {
        self.future.is_settled()
    }

    /// Take the outcome without awaiting. `None` while the call is pending,
    /// while its deregistration is still running, and after the outcome has
    /// been taken once (by this method or by awaiting).
    pub fn try_result(&self) -> Option<Result<Response, CallError>> {
        self.future.try_take()
    }
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle").field("call", &self.call).finish()
    }
}

impl Future for CallHandle {
    type Output = Result<Response, CallError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.future).poll(cx)
    }
}
