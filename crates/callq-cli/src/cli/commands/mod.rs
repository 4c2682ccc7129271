//! CLI command handlers.

mod batch;
mod call;
mod wait;

pub use batch::run_batch;
pub use call::run_call;
