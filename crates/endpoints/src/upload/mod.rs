//! Progress-tracked file uploads.
//!
//! An [`Uploader`] owns a queue of in-flight uploads, deduplicated by the
//! identity of the uploaded resource. Each [`UploadInfo`] exposes its state
//! as an ordered stream of transitions ending in exactly one terminal state;
//! terminal entries are pruned from the queue automatically.

mod info;
mod state;
mod uploader;

pub use info::{UploadId, UploadInfo, UploadProgress, UploadState, Uploadable};
pub use state::UploadStateStream;
pub use uploader::Uploader;
