//! Bounded frame queue between the producer and its consumers
//!
//! The producer side is a plain `tokio::sync::mpsc::Sender<Frame>`: `send`
//! waits while the queue is full, so a slow consumer slows the producer down
//! instead of losing frames. The consumer side is [`FrameReceiver`], which can
//! be cloned and handed to several readers (renderer, detector); each frame is
//! delivered to exactly one of them.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::types::Frame;

/// Create a bounded frame queue
pub fn frame_queue(capacity: usize) -> (mpsc::Sender<Frame>, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, FrameReceiver { inner: Arc::new(Mutex::new(rx)) })
}

/// Pull side of the frame queue
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    inner: Arc<Mutex<mpsc::Receiver<Frame>>>,
}

impl FrameReceiver {
    /// Wait for the next frame
    ///
    /// Returns `None` once the producer of the current source has ended and
    /// the queue is drained.
    pub async fn next_frame(&self) -> Option<Frame> {
        self.inner.lock().await.recv().await
    }

    /// Blocking variant for consumers running on plain threads
    ///
    /// Panics if called from within an async runtime.
    pub fn blocking_next_frame(&self) -> Option<Frame> {
        self.inner.blocking_lock().blocking_recv()
    }

    /// Take a frame if one is queued right now
    pub fn try_next_frame(&self) -> Option<Frame> {
        self.inner.try_lock().ok()?.try_recv().ok()
    }

    /// Frames currently queued
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the queue is empty right now
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Point every clone of this receiver at a new queue
    pub(crate) async fn replace(&self, rx: mpsc::Receiver<Frame>) {
        *self.inner.lock().await = rx;
    }
}
