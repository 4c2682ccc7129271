//! The admission service: tracks every outgoing call, serializes calls that
//! share a pipe name, and reconciles abandonment with in-flight responses.
//!
//! Flow of one call:
//! gate check → pending set + unload check + pipe → dispatch now (`Proceed`)
//! or wait for the pipe (`Delay`) → transport outcome settles the promise →
//! deregistration removes the call and dispatches the pipe's next head.
//!
//! All bookkeeping runs under one lock. Transports and promise callbacks are
//! always invoked with that lock released, so a transport may complete a call
//! from inside `send`. Dispatches triggered while a thread is already inside
//! `send` are queued and sent by the outermost dispatch on that thread, so a
//! pipe of inline-completing calls advances in a loop rather than recursively.

mod pending;
mod pipe;


use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::call::{Call, CallArgs, CallHandle, CallId};
use crate::error::{CallError, ServiceError};
use crate::lock::lock;
use crate::promise;
use crate::transport::{Completion, Transport};
use crate::unload::UnloadChecks;

use pending::PendingSet;
use pipe::{Keyed, PipeTable, Removal};

/// Options fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Start with the read-only gate closed.
    pub read_only: bool,
}

/// Outcome of registering a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Dispatch to the transport now.
    Proceed,
    /// Wait until the call reaches the head of its pipe.
    Delay,
}

/// Snapshot of one pending call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSummary {
    pub id: CallId,
    pub method: String,
    pub url: String,
    pub pipe: Option<String>,
    pub read_only: bool,
}

impl Keyed for Arc<Call> {
    fn key(&self) -> CallId {
        self.id()
    }
}

type DispatchJob = (Arc<dyn Transport>, Arc<Call>);

thread_local! {
    /// Calls waiting to be sent by the outermost `dispatch` on this thread.
    /// `None` when no dispatch is running.
    static DISPATCH_QUEUE: RefCell<Option<VecDeque<DispatchJob>>> = const { RefCell::new(None) };
}

/// Clears this thread's dispatch queue when the draining frame exits, even by
/// unwinding out of a transport.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DISPATCH_QUEUE.with(|q| *q.borrow_mut() = None);
    }
}

/// Queue `job`. Returns true when the caller is the outermost dispatch and
/// must drain the queue.
fn push_dispatch(job: DispatchJob) -> bool {
    DISPATCH_QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        let outermost = q.is_none();
        q.get_or_insert_with(VecDeque::new).push_back(job);
        outermost
    })
}

fn pop_dispatch() -> Option<DispatchJob> {
    DISPATCH_QUEUE.with(|q| q.borrow_mut().as_mut().and_then(VecDeque::pop_front))
}

#[derive(Default)]
struct State {
    pending: PendingSet<Arc<Call>>,
    pipes: PipeTable<Arc<Call>>,
    read_only: bool,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    transport: Arc<dyn Transport>,
    unload: UnloadChecks,
    next_id: AtomicU64,
}

impl Shared {
    /// Gate check and registration, atomically. On success the call is
    /// tracked and will deregister itself when its promise settles.
    fn admit(self: &Arc<Self>, call: &Arc<Call>) -> Result<Admission, CallError> {
        let mut state = lock(&self.state);
        if state.read_only && !call.is_read_only() {
            tracing::warn!(
                call = %call.id(),
                method = %call.args().method,
                url = %call.args().url,
                "rejected by read-only gate"
            );
            return Err(CallError::ReadOnly);
        }

        state
            .pending
            .insert(call.id(), Arc::clone(call))
            .map_err(|e| CallError::Registration(e.to_string()))?;

        let message = call.pending_message();
        let check = self.unload.set_check(None, move || Some(message.clone()));
        call.set_unload_check(check);

        let admission = match call.pipe() {
            Some(name) => {
                let len = state
                    .pipes
                    .enqueue(name, Arc::clone(call), call.args().prioritize);
                if len > 1 {
                    tracing::debug!(
                        call = %call.id(),
                        pipe = %name,
                        position = len,
                        "delayed behind pipe head"
                    );
                    Admission::Delay
                } else {
                    Admission::Proceed
                }
            }
            None => Admission::Proceed,
        };

        // Attached under the lock: nobody can dispatch (and so settle) the
        // call before this callback is in place.
        let weak = Arc::downgrade(self);
        let id = call.id();
        call.on_settled(move || {
            if let Some(shared) = weak.upgrade() {
                shared.deregister_settled(id);
            }
        });

        Ok(admission)
    }

    /// Hand `call` to the transport, or queue it if this thread is already
    /// dispatching. The outermost frame sends queued calls in order.
    fn dispatch(&self, call: &Arc<Call>) {
        if !push_dispatch((Arc::clone(&self.transport), Arc::clone(call))) {
            tracing::trace!(call = %call.id(), "dispatch queued behind running send");
            return;
        }
        let _guard = DrainGuard;
        while let Some((transport, call)) = pop_dispatch() {
            // An abandonment that won the race has already advanced the pipe.
            if !call.is_pending() {
                tracing::debug!(call = %call.id(), "skipping dispatch of abandoned call");
                continue;
            }
            tracing::debug!(
                call = %call.id(),
                method = %call.args().method,
                url = %call.args().url,
                "dispatching"
            );
            transport.send(call.request(), Completion::new(call));
        }
    }

    /// Remove a call from all bookkeeping. Returns the pipe member that became
    /// head and must now be dispatched, if any. On error nothing is changed.
    pub(crate) fn deregister(
        &self,
        id: CallId,
        removal: Removal,
    ) -> Result<Option<Arc<Call>>, ServiceError> {
        let mut state = lock(&self.state);
        let call = state
            .pending
            .get(id)
            .cloned()
            .ok_or(ServiceError::NotPending(id))?;

        let advanced = match call.pipe() {
            Some(name) => state.pipes.remove(name, id, removal)?,
            None => None,
        };
        state.pending.remove(id);
        if let Some(check) = call.take_unload_check() {
            self.unload.remove_check(&check);
        }
        Ok(advanced)
    }

    fn deregister_settled(&self, id: CallId) {
        self.deregister_and_advance(id, Removal::Settled);
    }

    pub(crate) fn deregister_abandoned(&self, id: CallId) {
        self.deregister_and_advance(id, Removal::Abandoned);
    }

    fn deregister_and_advance(&self, id: CallId, removal: Removal) {
        match self.deregister(id, removal) {
            Ok(Some(next)) => {
                tracing::debug!(call = %id, next = %next.id(), "pipe advanced");
                self.dispatch(&next);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    call = %id,
                    ?removal,
                    error = %e,
                    "scheduler bookkeeping is inconsistent"
                );
            }
        }
    }
}

/// Coordinates outgoing calls for one session. Independent services share no
/// state unless they are given the same `UnloadChecks`.
pub struct Service {
    shared: Arc<Shared>,
}

impl Service {
    pub fn new(
        transport: Arc<dyn Transport>,
        unload: UnloadChecks,
        options: ServiceOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    read_only: options.read_only,
                    ..State::default()
                }),
                transport,
                unload,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start a call. Non-read-only calls on a read-only service come back
    /// already rejected; everything else is tracked until it settles or is
    /// abandoned.
    pub fn call(&self, args: CallArgs) -> CallHandle {
        let id = CallId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (promise, future) = promise::pair();
        let call = Arc::new(Call::new(id, args, promise, Arc::downgrade(&self.shared)));

        match self.shared.admit(&call) {
            Ok(Admission::Proceed) => self.shared.dispatch(&call),
            Ok(Admission::Delay) => {}
            Err(e) => call.complete(Err(e)),
        }
        CallHandle::new(call, future)
    }

    /// True when every pending call is read-only (vacuously true when idle).
    pub fn is_clean(&self) -> bool {
        lock(&self.shared.state)
            .pending
            .iter()
            .all(|call| call.is_read_only())
    }

    /// Length of a pipe that has been used at least once.
    pub fn pipe_length(&self, name: &str) -> Result<usize, ServiceError> {
        lock(&self.shared.state).pipes.len(name)
    }

    /// Abandon every pending call with this method and URL. Returns how many
    /// were abandoned; no match is not an error.
    ///
    /// All matches are marked before any is deregistered, so a matching pipe
    /// member that becomes head during the sweep is not sent.
    pub fn abandon(&self, method: &str, url: &str) -> usize {
        let matches: Vec<Arc<Call>> = lock(&self.shared.state)
            .pending
            .iter()
            .filter(|call| call.matches(method, url))
            .cloned()
            .collect();
        let marked: Vec<Arc<Call>> = matches
            .into_iter()
            .filter(|call| call.mark_abandoned())
            .collect();
        for call in &marked {
            call.deregister_abandoned();
        }
        marked.len()
    }

    pub fn set_read_only(&self, read_only: bool) {
        tracing::info!(read_only, "read-only gate changed");
        lock(&self.shared.state).read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        lock(&self.shared.state).read_only
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.shared.state).pending.len()
    }

    /// Pending calls in admission order.
    pub fn pending_calls(&self) -> Vec<CallSummary> {
        lock(&self.shared.state)
            .pending
            .iter()
            .map(|call| CallSummary {
                id: call.id(),
                method: call.args().method.clone(),
                url: call.args().url.clone(),
                pipe: call.pipe().map(str::to_string),
                read_only: call.is_read_only(),
            })
            .collect()
    }

    pub fn unload_checks(&self) -> &UnloadChecks {
        &self.shared.unload
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("pending", &self.pending_len())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}
