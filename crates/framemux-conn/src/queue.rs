use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::{ConnError, Result};

/// Single-consumer async FIFO that decouples frame arrival from the rate at
/// which the application drains payloads.
///
/// Pushing never blocks and the buffer is unbounded; "backpressure" is purely
/// local. Once closed, pending and future receives resolve to `None` after
/// any buffered items have been handed out.
#[derive(Debug)]
pub struct BackpressureQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    receiving: bool,
}

impl<T> Default for BackpressureQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BackpressureQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
                receiving: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append an item, waking the pending receiver if there is one.
    pub fn push(&self, item: T) -> Result<()> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(ConnError::QueueClosed);
            }
            state.items.push_back(item);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Wait for the next item.
    ///
    /// Returns `Ok(None)` once the queue is closed and drained. Only one
    /// receive may be outstanding at a time; a second concurrent call fails
    /// with [`ConnError::ConcurrentReceive`]. Dropping a pending receive
    /// releases the slot without losing any item.
    pub async fn receive(&self) -> Result<Option<T>> {
        let _slot = self.claim_receiver()?;
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Ok(Some(item));
                }
                if state.closed {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    /// Mark the queue closed. Idempotent.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered, not yet received items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn claim_receiver(&self) -> Result<ReceiverSlot<'_, T>> {
        let mut state = self.lock();
        if state.receiving {
            return Err(ConnError::ConcurrentReceive);
        }
        state.receiving = true;
        Ok(ReceiverSlot { queue: self })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the single receiver slot when a receive completes or is dropped.
struct ReceiverSlot<'a, T> {
    queue: &'a BackpressureQueue<T>,
}

impl<T> Drop for ReceiverSlot<'_, T> {
    fn drop(&mut self) {
        self.queue.lock().receiving = false;
    }
}
