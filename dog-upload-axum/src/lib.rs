//! dog-upload-axum: Axum adapter for dog-upload.
//!
//! Parses multipart bodies into [`dog_upload::UploadRequest`]s without
//! buffering files in memory, mounts upload and probe routes, and renders
//! upload errors as Feathers-style JSON.

pub mod app;
mod error;
pub mod multipart;
pub mod rest;
pub mod state;

pub use app::UploadApp;
pub use error::UploadHttpError;
pub use multipart::{read_upload_request, MultipartConfig, SESSION_COOKIE, SESSION_HEADER};
pub use state::UploadState;
