//! In-memory transport: records requests and lets the owner complete them.
//!
//! Useful for tests and for embedding the scheduler in front of a transport
//! that is driven from elsewhere (an event loop, a message bus).

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{Completion, Request, Transport};
use crate::lock::lock;

/// A dispatched call waiting for its outcome.
#[derive(Debug)]
pub struct InFlight {
    pub request: Request,
    pub completion: Completion,
}

#[derive(Default)]
struct ManualState {
    sent: Vec<Request>,
    in_flight: VecDeque<InFlight>,
}

/// `Transport` that never touches the network.
#[derive(Default)]
pub struct ManualTransport {
    state: Mutex<ManualState>,
}

impl ManualTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request ever sent, in dispatch order.
    pub fn sent(&self) -> Vec<Request> {
        lock(&self.state).sent.clone()
    }

    pub fn sent_urls(&self) -> Vec<String> {
        lock(&self.state).sent.iter().map(|r| r.url.clone()).collect()
    }

    /// URLs of requests sent but not yet taken, oldest first.
    pub fn in_flight_urls(&self) -> Vec<String> {
        lock(&self.state)
            .in_flight
            .iter()
            .map(|f| f.request.url.clone())
            .collect()
    }

    pub fn in_flight_len(&self) -> usize {
        lock(&self.state).in_flight.len()
    }

    /// Take the oldest in-flight request for `url`. Complete it after this
    /// returns; the transport's lock is not held by then.
    pub fn take(&self, url: &str) -> Option<InFlight> {
        let mut state = lock(&self.state);
        let pos = state.in_flight.iter().position(|f| f.request.url == url)?;
        state.in_flight.remove(pos)
    }

    /// Take the oldest in-flight request.
    pub fn take_next(&self) -> Option<InFlight> {
        lock(&self.state).in_flight.pop_front()
    }
}

impl Transport for ManualTransport {
    fn send(&self, request: Request, completion: Completion) {
        tracing::trace!(method = %request.method, url = %request.url, "manual transport send");
        let mut state = lock(&self.state);
        state.sent.push(request.clone());
        state.in_flight.push_back(InFlight {
            request,
            completion,
        });
    }
}
