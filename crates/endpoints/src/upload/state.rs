//! Upload state broadcasting.
//!
//! Each upload owns one [`StateCell`]: the single writer for its state
//! machine. Subscribers receive every transition in order through their own
//! channel; a terminal state is delivered exactly once and closes every
//! stream. Emissions after a terminal state, and progress updates that would
//! move backwards, are ignored.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::info::UploadState;

struct StateCellInner {
    current: UploadState,
    terminal: bool,
    subscribers: Vec<mpsc::UnboundedSender<UploadState>>,
}

pub(crate) struct StateCell {
    inner: Mutex<StateCellInner>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(StateCellInner {
                current: UploadState::Idle,
                terminal: false,
                subscribers: Vec::new(),
            }),
        }
    }

    /// The current state snapshot.
    pub(crate) fn current(&self) -> UploadState {
        self.inner.lock().current.clone()
    }

    /// Subscribe to state transitions.
    ///
    /// The current state is replayed to the new subscriber unless it is the
    /// uninformative initial `Idle`. A subscriber arriving after a terminal
    /// state receives that terminal state and then the end of the stream.
    pub(crate) fn subscribe(&self) -> UploadStateStream {
        let mut inner = self.inner.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        if !matches!(inner.current, UploadState::Idle) {
            let _ = tx.send(inner.current.clone());
        }
        if !inner.terminal {
            inner.subscribers.push(tx);
        }
        UploadStateStream { receiver: rx }
    }

    /// Move the state machine forward.
    ///
    /// Returns `false` when the transition is ignored: the machine is already
    /// terminal, or the progress snapshot would decrease.
    pub(crate) fn emit(&self, next: UploadState) -> bool {
        let mut inner = self.inner.lock();
        if inner.terminal {
            return false;
        }
        if let (UploadState::InProgress(next_progress), UploadState::InProgress(previous)) =
            (&next, &inner.current)
            && next_progress.fraction_completed < previous.fraction_completed
        {
            return false;
        }

        let is_terminal = next.is_terminal();
        inner.current = next.clone();
        inner
            .subscribers
            .retain(|tx| tx.send(next.clone()).is_ok());
        if is_terminal {
            inner.terminal = true;
            // Dropping the senders ends every subscriber stream.
            inner.subscribers.clear();
        }
        true
    }
}

/// An ordered stream of [`UploadState`] transitions for one upload.
///
/// The stream ends after a terminal state (completed, cancelled, or failed)
/// has been delivered.
pub struct UploadStateStream {
    receiver: mpsc::UnboundedReceiver<UploadState>,
}

impl UploadStateStream {
    /// Receive the next state transition.
    ///
    /// Returns `None` once the terminal state has been delivered.
    pub async fn next(&mut self) -> Option<UploadState> {
        self.receiver.recv().await
    }
}

impl futures_util::Stream for UploadStateStream {
    type Item = UploadState;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
