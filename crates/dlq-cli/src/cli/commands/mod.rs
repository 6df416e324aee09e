//! CLI command handlers, one file per command.

mod cancel;
mod clear;
mod get;
mod pause;
mod resume;
mod retry;
mod run;
mod status;

pub use cancel::run_cancel;
pub use clear::{run_clear, ClearTarget};
pub use get::{run_get, GetArgs};
#[cfg(test)]
pub use get::parse_header;
pub use pause::run_pause;
pub use resume::run_resume;
pub use retry::run_retry;
pub use run::run_queue;
pub use status::run_status;
