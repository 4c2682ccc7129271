//! One tracked call: identity, disposition, lifecycle and owned promise.
//!
//! A call leaves the pending state exactly once, either by settling (the
//! transport reported an outcome) or by being abandoned. The two transitions
//! are guarded by the same lock so a response racing an abandonment can never
//! both settle the promise and deregister the call twice.

mod args;
mod handle;

use std::fmt;
use std::sync::{Mutex, Weak};

use crate::error::CallError;
use crate::lock::lock;
use crate::promise::Promise;
use crate::service::Shared;
use crate::transport::{Request, Response};

pub use args::{CallArgs, Payload};
pub use handle::CallHandle;

/// Identifier of a call, unique within one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub(crate) u64);

impl CallId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Pending,
    Settled,
    Abandoned,
}

pub(crate) struct Call {
    id: CallId,
    args: CallArgs,
    lifecycle: Mutex<Lifecycle>,
    promise: Promise<Response>,
    unload_check: Mutex<Option<String>>,
    service: Weak<Shared>,
}

impl Call {
    pub(crate) fn new(
        id: CallId,
        args: CallArgs,
        promise: Promise<Response>,
        service: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            args: args.normalized(),
            lifecycle: Mutex::new(Lifecycle::Pending),
            promise,
            unload_check: Mutex::new(None),
            service,
        }
    }

    pub(crate) fn id(&self) -> CallId {
        self.id
    }

    pub(crate) fn args(&self) -> &CallArgs {
        &self.args
    }

    pub(crate) fn pipe(&self) -> Option<&str> {
        self.args.pipe()
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.args.read_only
    }

    pub(crate) fn matches(&self, method: &str, url: &str) -> bool {
        self.args.method.eq_ignore_ascii_case(method.trim()) && self.args.url == url
    }

    pub(crate) fn request(&self) -> Request {
        Request {
            method: self.args.method.clone(),
            url: self.args.url.clone(),
            data: self.args.data.clone(),
            synchronous: self.args.synchronous,
        }
    }

    /// Text of the unload check registered while this call is pending.
    pub(crate) fn pending_message(&self) -> String {
        format!("a call to {} {} is still pending", self.args.method, self.args.url)
    }

    pub(crate) fn set_unload_check(&self, name: String) {
        *lock(&self.unload_check) = Some(name);
    }

    pub(crate) fn take_unload_check(&self) -> Option<String> {
        lock(&self.unload_check).take()
    }

    pub(crate) fn on_settled<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.promise.on_settled(callback);
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        *lock(&self.lifecycle) == Lifecycle::Abandoned
    }

    /// Neither settled nor abandoned. A call abandoned after this check is
    /// treated like one abandoned while in flight.
    pub(crate) fn is_pending(&self) -> bool {
        *lock(&self.lifecycle) == Lifecycle::Pending
    }

    /// Settle the promise with a transport outcome (or a local rejection).
    /// Outcomes for abandoned calls are dropped without touching bookkeeping.
    pub(crate) fn complete(&self, result: Result<Response, CallError>) {
        {
            let mut state = lock(&self.lifecycle);
            match *state {
                Lifecycle::Pending => *state = Lifecycle::Settled,
                Lifecycle::Abandoned => {
                    tracing::debug!(call = %self.id, "ignoring outcome of abandoned call");
                    return;
                }
                Lifecycle::Settled => {
                    tracing::warn!(call = %self.id, "call completed twice; ignoring");
                    return;
                }
            }
        }
        if let Err(ref e) = result {
            tracing::debug!(call = %self.id, error = %e, "call rejected");
        }
        self.promise.settle(result);
    }

    /// Mark the call abandoned and deregister it without settling its promise.
    /// Returns false if the call had already settled or been abandoned.
    pub(crate) fn abandon(&self) -> bool {
        if !self.mark_abandoned() {
            return false;
        }
        self.deregister_abandoned();
        true
    }

    /// First half of `abandon`: from here on outcomes are ignored and the call
    /// is never handed to the transport.
    pub(crate) fn mark_abandoned(&self) -> bool {
        {
            let mut state = lock(&self.lifecycle);
            if *state != Lifecycle::Pending {
                return false;
            }
            *state = Lifecycle::Abandoned;
        }
        tracing::debug!(
            call = %self.id,
            method = %self.args.method,
            url = %self.args.url,
            "abandoning call"
        );
        true
    }

    /// Second half of `abandon`: leave the pending set and the pipe.
    pub(crate) fn deregister_abandoned(&self) {
        if let Some(shared) = self.service.upgrade() {
            shared.deregister_abandoned(self.id);
        }
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id)
            .field("method", &self.args.method)
            .field("url", &self.args.url)
            .field("pipe", &self.args.pipe())
            .field("lifecycle", &*lock(&self.lifecycle))
            .finish()
    }
}
