//! Upload queue management.

use std::sync::Arc;

use http::HeaderMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use url::Url;

use super::info::{PreparedTransfer, UploadId, UploadInfo, Uploadable};
use crate::api::request::HttpRequest;
use crate::api::{RequestAdapter, SessionConfig, Transport};
use crate::endpoint::Method;
use crate::error::Result;

struct UploaderInner<T: Uploadable + PartialEq> {
    transport: Transport,
    adapter: RwLock<Option<Arc<dyn RequestAdapter>>>,
    /// The live queue. All mutation happens under this lock so the
    /// deduplication check and the append are atomic.
    queue: Mutex<Vec<Arc<UploadInfo<T>>>>,
    snapshot_tx: watch::Sender<Vec<Arc<UploadInfo<T>>>>,
}

/// Manages a queue of in-flight file uploads.
///
/// Submissions are deduplicated by the equality of the wrapped resource:
/// submitting a resource equal to one already in the queue returns the
/// existing [`UploadInfo`] instead of starting a second transfer. Entries
/// are pruned automatically when they reach a terminal state.
///
/// # Example
///
/// ```ignore
/// use endpoints::{Method, Uploader};
///
/// let uploader: Uploader<std::path::PathBuf> = Uploader::new();
/// let info = uploader.upload(
///     "/tmp/photo.jpg".into(),
///     "https://api.example.com/photos".parse()?,
///     Method::Post,
///     None,
///     true,
/// )?;
///
/// let mut states = info.state_stream();
/// while let Some(state) = states.next().await {
///     println!("{state:?}");
/// }
/// ```
pub struct Uploader<T: Uploadable + PartialEq> {
    inner: Arc<UploaderInner<T>>,
}

impl<T: Uploadable + PartialEq> Clone for Uploader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Uploadable + PartialEq> Default for Uploader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Uploadable + PartialEq> Uploader<T> {
    /// Create an uploader with default session configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default(), Vec::new())
            .expect("Failed to create uploader with default configuration")
    }

    /// Create an uploader with a custom session configuration and an optional
    /// allow-list of domains exempt from trust evaluation.
    pub fn with_config(mut config: SessionConfig, trusted_domains: Vec<String>) -> Result<Self> {
        // Upload sessions keep more pooled connections per host.
        config.pool_max_idle_per_host.get_or_insert(10);
        let transport = Transport::new(&config, trusted_domains)?;
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Ok(Self {
            inner: Arc::new(UploaderInner {
                transport,
                adapter: RwLock::new(None),
                queue: Mutex::new(Vec::new()),
                snapshot_tx,
            }),
        })
    }

    /// Install a request adapter applied to upload requests before they are
    /// issued, replacing any previous one.
    pub fn set_request_adapter(&self, adapter: impl RequestAdapter + 'static) {
        *self.inner.adapter.write() = Some(Arc::new(adapter));
    }

    /// Remove the installed request adapter.
    pub fn clear_request_adapter(&self) {
        *self.inner.adapter.write() = None;
    }

    /// Submit a resource for upload.
    ///
    /// If the queue already holds an upload for an equal resource, that entry
    /// is returned unchanged and no new transfer is started. Otherwise the
    /// resource is enqueued and, unless `start_immediately` is `false`, its
    /// transfer begins at once.
    pub fn upload(
        &self,
        object: T,
        url: Url,
        method: Method,
        headers: Option<HeaderMap>,
        start_immediately: bool,
    ) -> Result<Arc<UploadInfo<T>>> {
        let mut queue = self.inner.queue.lock();
        if let Some(existing) = queue.iter().find(|info| info.object() == &object) {
            return Ok(Arc::clone(existing));
        }

        let mut request = HttpRequest::new(method, url, headers.unwrap_or_default());
        let adapter = self.inner.adapter.read().clone();
        if let Some(adapter) = adapter {
            request = adapter.adapt(request)?;
        }
        let prepared = PreparedTransfer {
            transport: self.inner.transport.client_for(&request.url).clone(),
            method: request.method,
            url: request.url,
            headers: request.headers,
            path: object.file_path().to_path_buf(),
        };

        let info = Arc::new(UploadInfo::new(object, prepared));
        queue.push(Arc::clone(&info));
        self.publish(&queue);
        drop(queue);

        // Terminal states prune the entry without an explicit sweep.
        let uploader = self.clone();
        let id = info.id();
        let mut states = info.state_stream();
        tokio::spawn(async move {
            while let Some(state) = states.next().await {
                if state.is_terminal() {
                    uploader.remove(id);
                    break;
                }
            }
        });

        if start_immediately {
            info.upload();
        }
        Ok(info)
    }

    /// The current queue contents.
    pub fn snapshot(&self) -> Vec<Arc<UploadInfo<T>>> {
        self.inner.queue.lock().clone()
    }

    /// Observe the queue: the current snapshot and every future mutation.
    pub fn active_uploads(&self) -> watch::Receiver<Vec<Arc<UploadInfo<T>>>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Remove every entry that has reached a terminal state.
    pub fn clean_queue(&self) {
        let mut queue = self.inner.queue.lock();
        queue.retain(|info| !info.state().is_terminal());
        self.publish(&queue);
    }

    /// Cancel every non-terminal entry, then prune the queue.
    pub fn cancel_all(&self) {
        let entries = self.snapshot();
        for info in &entries {
            info.cancel();
        }
        self.clean_queue();
    }

    fn remove(&self, id: UploadId) {
        let mut queue = self.inner.queue.lock();
        queue.retain(|info| info.id() != id);
        self.publish(&queue);
    }

    fn publish(&self, queue: &[Arc<UploadInfo<T>>]) {
        self.inner.snapshot_tx.send_replace(queue.to_vec());
    }
}

impl<T: Uploadable + PartialEq> std::fmt::Debug for Uploader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("queued", &self.inner.queue.lock().len())
            .finish()
    }
}
