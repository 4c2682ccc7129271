//! Single-settlement promise and the future that observes it.
//!
//! A `Promise` is the producer side: it is fulfilled or rejected exactly once,
//! and runs its settlement callbacks before the value is published. The
//! paired `CallFuture` resolves with that value. A promise that is never settled
//! leaves its future pending forever, which is how abandoned calls behave.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::error::CallError;
use crate::lock::lock;

type SettledCallback = Box<dyn FnOnce() + Send>;

struct Core<T> {
    result: Option<Result<T, CallError>>,
    settled: bool,
    waker: Option<Waker>,
    callbacks: Vec<SettledCallback>,
}

/// Producer side of a single-settlement result.
pub struct Promise<T> {
    core: Arc<Mutex<Core<T>>>,
}

/// Consumer side of a `Promise`; resolves once the promise settles.
pub struct CallFuture<T> {
    core: Arc<Mutex<Core<T>>>,
}

/// Create a connected promise/future pair.
pub fn pair<T>() -> (Promise<T>, CallFuture<T>) {
    let core = Arc::new(Mutex::new(Core {
        result: None,
        settled: false,
        waker: None,
        callbacks: Vec::new(),
    }));
    (
        Promise {
            core: Arc::clone(&core),
        },
        CallFuture { core },
    )
}

impl<T> Promise<T> {
    /// Settle with a value. Returns false if the promise had already settled.
    pub fn fulfill(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with an error. Returns false if the promise had already settled.
    pub fn reject(&self, err: CallError) -> bool {
        self.settle(Err(err))
    }

    /// Mark the promise settled unless it already is, run the settlement
    /// callbacks with the internal lock released, then publish `result` and
    /// wake the future. Callbacks have finished by the time an awaiting
    /// caller observes the value.
    pub fn settle(&self, result: Result<T, CallError>) -> bool {
        let callbacks = {
            let mut core = lock(&self.core);
            if core.settled {
                return false;
            }
            core.settled = true;
            std::mem::take(&mut core.callbacks)
        };
        for callback in callbacks {
            callback();
        }
        let waker = {
            let mut core = lock(&self.core);
            core.result = Some(result);
            core.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        lock(&self.core).settled
    }

    /// Run `callback` once the promise settles, or immediately if it already has.
    pub fn on_settled<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut core = lock(&self.core);
        if core.settled {
            drop(core);
            callback();
            return;
        }
        core.callbacks.push(Box::new(callback));
    }
}

impl<T> CallFuture<T> {
    /// True from the moment the promise accepts an outcome, including while
    /// its callbacks run and before `try_take` can see the value.
    pub fn is_settled(&self) -> bool {
        lock(&self.core).settled
    }

    /// Take the settled result without awaiting. Returns `None` while pending
    /// and after the result has already been taken.
    pub fn try_take(&self) -> Option<Result<T, CallError>> {
        lock(&self.core).result.take()
    }
}

impl<T> Future for CallFuture<T> {
    type Output = Result<T, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut core = lock(&self.core);
        match core.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                core.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
