//! Per-upload state machine and transfer handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use http::HeaderMap;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;
use url::Url;

use super::state::{StateCell, UploadStateStream};
use crate::endpoint::Method;
use crate::error::UploadError;

/// Chunk size for streaming upload bodies (64 KiB).
const CHUNK_SIZE: usize = 64 * 1024;

/// Unique identifier for an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UploadId(u64);

impl UploadId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A resource eligible for upload.
///
/// Resources are compared by equality when submitted to an
/// [`Uploader`](super::Uploader), so submitting the same resource twice
/// returns the same in-flight upload.
pub trait Uploadable: Send + Sync + 'static {
    /// The file backing this resource.
    fn file_path(&self) -> &Path;
}

impl Uploadable for PathBuf {
    fn file_path(&self) -> &Path {
        self
    }
}

/// A point-in-time progress snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadProgress {
    /// Fraction of the body transferred, from 0.0 to 1.0.
    pub fraction_completed: f64,
    /// Bytes handed to the transport so far.
    pub bytes_sent: u64,
    /// Total bytes in the body.
    pub total_bytes: u64,
}

/// The state of one upload.
///
/// States move strictly forward: `Idle` → `Waiting` → `InProgress` (any
/// number of times, non-decreasing) → one terminal state. Terminal states
/// are `Completed`, `Cancelled`, and `Failed`.
#[derive(Clone, Debug)]
pub enum UploadState {
    /// Created but not yet started.
    Idle,
    /// Started, no bytes transferred yet.
    Waiting,
    /// Actively transferring.
    InProgress(UploadProgress),
    /// The server accepted the upload.
    Completed,
    /// Cancelled before completion.
    Cancelled,
    /// The transfer failed.
    Failed(UploadError),
}

impl UploadState {
    /// Whether this state ends the upload's state stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed(_))
    }
}

/// Everything needed to issue the transfer, captured at enqueue time.
pub(crate) struct PreparedTransfer {
    pub(crate) transport: reqwest::Client,
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) path: PathBuf,
}

enum TaskSlot {
    /// Not yet started; holds the prepared request.
    Prepared(PreparedTransfer),
    /// Transfer task running; holds its cancellation channel.
    Running(oneshot::Sender<()>),
    /// Started and finished, or cancelled.
    Finished,
}

/// One queued upload: the wrapped resource, its identifier, and its state.
///
/// Obtained from [`Uploader::upload`](super::Uploader::upload). The state is
/// observable either as a snapshot ([`UploadInfo::state`]) or as an ordered
/// stream of transitions ([`UploadInfo::state_stream`]).
pub struct UploadInfo<T: Uploadable> {
    id: UploadId,
    object: T,
    state: Arc<StateCell>,
    task: Arc<Mutex<TaskSlot>>,
}

impl<T: Uploadable> UploadInfo<T> {
    pub(crate) fn new(object: T, prepared: PreparedTransfer) -> Self {
        Self {
            id: UploadId::new(),
            object,
            state: Arc::new(StateCell::new()),
            task: Arc::new(Mutex::new(TaskSlot::Prepared(prepared))),
        }
    }

    /// The unique identifier of this upload.
    pub fn id(&self) -> UploadId {
        self.id
    }

    /// The uploaded resource.
    pub fn object(&self) -> &T {
        &self.object
    }

    /// The current state snapshot.
    pub fn state(&self) -> UploadState {
        self.state.current()
    }

    /// Subscribe to this upload's state transitions.
    ///
    /// Transitions arrive in order; the stream ends after the terminal state.
    pub fn state_stream(&self) -> UploadStateStream {
        self.state.subscribe()
    }

    /// Start the transfer.
    ///
    /// Moves the state to `Waiting` and spawns the transport task. A no-op
    /// unless the upload is still `Idle`.
    pub fn upload(&self) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let prepared = {
            let mut slot = self.task.lock();
            match std::mem::replace(&mut *slot, TaskSlot::Finished) {
                TaskSlot::Prepared(prepared) => {
                    *slot = TaskSlot::Running(cancel_tx);
                    prepared
                }
                other => {
                    *slot = other;
                    return;
                }
            }
        };
        self.state.emit(UploadState::Waiting);

        let state = Arc::clone(&self.state);
        let task = Arc::clone(&self.task);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                result = transfer(Arc::clone(&state), prepared) => Some(result),
                _ = cancel_rx => None,
            };
            if let Some(result) = outcome {
                let terminal = match result {
                    Ok(()) => UploadState::Completed,
                    Err(error) => UploadState::Failed(error),
                };
                state.emit(terminal);
            }
            *task.lock() = TaskSlot::Finished;
        });
    }

    /// Cancel the upload.
    ///
    /// Aborts the transport task and moves any non-terminal state to
    /// `Cancelled`. A no-op once a terminal state has been reached.
    pub fn cancel(&self) {
        let slot = {
            let mut guard = self.task.lock();
            std::mem::replace(&mut *guard, TaskSlot::Finished)
        };
        if let TaskSlot::Running(cancel_tx) = slot {
            let _ = cancel_tx.send(());
        }
        self.state.emit(UploadState::Cancelled);
    }
}

impl<T: Uploadable> std::fmt::Debug for UploadInfo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadInfo")
            .field("id", &self.id)
            .field("state", &self.state.current())
            .finish()
    }
}

/// Stream the file to the server, emitting progress along the way.
async fn transfer(state: Arc<StateCell>, prepared: PreparedTransfer) -> Result<(), UploadError> {
    let file = tokio::fs::File::open(&prepared.path)
        .await
        .map_err(|e| UploadError::Io(e.to_string()))?;
    let total_bytes = file
        .metadata()
        .await
        .map_err(|e| UploadError::Io(e.to_string()))?
        .len();

    let progress_state = Arc::clone(&state);
    let body_stream = futures_util::stream::unfold((file, 0u64), move |(mut file, sent)| {
        let state = Arc::clone(&progress_state);
        async move {
            let mut buffer = vec![0u8; CHUNK_SIZE];
            match file.read(&mut buffer).await {
                Ok(0) => None,
                Ok(read) => {
                    buffer.truncate(read);
                    let sent = sent + read as u64;
                    let fraction = (sent as f64 / total_bytes as f64).min(1.0);
                    if fraction > 0.0 {
                        state.emit(UploadState::InProgress(UploadProgress {
                            fraction_completed: fraction,
                            bytes_sent: sent,
                            total_bytes,
                        }));
                    }
                    Some((Ok::<Bytes, std::io::Error>(Bytes::from(buffer)), (file, sent)))
                }
                Err(error) => Some((Err(error), (file, sent))),
            }
        }
    });

    let response = prepared
        .transport
        .request(prepared.method.to_reqwest(), prepared.url.clone())
        .headers(prepared.headers.clone())
        .body(reqwest::Body::wrap_stream(body_stream))
        .send()
        .await
        .map_err(|e| UploadError::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() || status.is_redirection() {
        Ok(())
    } else {
        let body = response.bytes().await.unwrap_or_default();
        Err(UploadError::Server {
            status: status.as_u16(),
            body,
        })
    }
}
