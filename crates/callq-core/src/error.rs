//! Error types for calls and for scheduler bookkeeping.

use crate::call::CallId;

/// Reason a call's promise was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The service's read-only gate is closed and the call has side effects.
    #[error("All non read-only requests have been disabled!")]
    ReadOnly,
    /// The transport reported a failure (non-2xx status or network error).
    #[error("{status}: {body}")]
    Transport { status: String, body: String },
    /// The transport discarded the completion without reporting an outcome.
    #[error("transport dropped the call without completing it")]
    Dropped,
    /// The call could not be registered with the scheduler.
    #[error("call could not be registered: {0}")]
    Registration(String),
}

impl CallError {
    /// Build a transport error from a status text and response body.
    pub fn transport(status: impl Into<String>, body: impl Into<String>) -> Self {
        CallError::Transport {
            status: status.into(),
            body: body.into(),
        }
    }
}

/// Scheduler-level errors. Apart from `PipeNotFound` (a caller mistake), these
/// indicate a broken bookkeeping invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Pipe not found: {0}")]
    PipeNotFound(String),
    #[error("call {0} is already pending")]
    AlreadyPending(CallId),
    #[error("call {0} is not pending")]
    NotPending(CallId),
    #[error("call {call} is not queued in pipe {pipe}")]
    NotInPipe { call: CallId, pipe: String },
    #[error("call {call} settled while not at the head of pipe {pipe}")]
    NotPipeHead { call: CallId, pipe: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_formats_status_and_body() {
        let e = CallError::transport("500", "internal error");
        assert_eq!(e.to_string(), "500: internal error");
    }

    #[test]
    fn read_only_message() {
        assert_eq!(
            CallError::ReadOnly.to_string(),
            "All non read-only requests have been disabled!"
        );
    }

    #[test]
    fn pipe_not_found_names_the_pipe() {
        let e = ServiceError::PipeNotFound("orders".to_string());
        assert_eq!(e.to_string(), "Pipe not found: orders");
    }
}
