//! Transcode job scheduling.
//!
//! [`TranscodeManager`] creates jobs, hands them to a bounded worker
//! pool, drives each job through its per-format encode loop and honors
//! cancellation. The pool is an unbounded in-process queue drained by
//! a dispatcher that holds one of W semaphore permits per running job,
//! so at most W jobs are in progress at any instant.

pub mod error;
pub mod manager;
mod worker;

pub use error::{ManagerError, ManagerResult};
pub use manager::TranscodeManager;
