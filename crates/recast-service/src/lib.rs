//! Transport-free service layer.
//!
//! The three request surfaces of the transcoding core — upload,
//! transcode and status — as plain async facades over the storage,
//! scheduling and registry crates. Any streaming RPC framework maps
//! its calls onto these one-to-one; nothing here knows about wire
//! framing.
//!
//! [`App`] is the composition root: it builds the storage roots
//! (fatal on failure), the session table, the registry and the worker
//! pool, before the first request is accepted.

pub mod app;
pub mod config;
pub mod error;
pub mod status;
pub mod transcode;
pub mod upload;

pub use app::App;
pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use status::StatusService;
pub use transcode::TranscodeService;
pub use upload::UploadService;
