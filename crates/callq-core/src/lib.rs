pub mod config;
pub mod logging;

pub mod batch;
pub mod call;
pub mod error;
pub mod promise;
pub mod service;
pub mod transport;
pub mod unload;

mod lock;

pub use call::{CallArgs, CallHandle, CallId, Payload};
pub use error::{CallError, ServiceError};
pub use service::{Admission, CallSummary, Service, ServiceOptions};
pub use transport::{Completion, CurlTransport, ManualTransport, Request, Response, Transport};
pub use unload::UnloadChecks;
