//! Bounded FIFO queue.
//!
//! Every queue in the runtime has a fixed capacity. A producer that finds the
//! queue full suspends until a consumer frees a slot; that suspension is the
//! backpressure boundary between the application and the connection.
//!
//! The queue owns both ends of a `flume` bounded channel, so the channel can
//! never observe disconnection while the queue is alive.

use flume::{Receiver, Sender};
use std::fmt;
use std::time::Duration;

/// Bounded multi-producer multi-consumer FIFO queue.
///
/// Cloning yields another handle to the same queue.
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = flume::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Enqueue an item, suspending while the queue is full.
    pub async fn push(&self, item: T) {
        // rx is held by self, so the channel is never disconnected
        let _ = self.tx.send_async(item).await;
    }

    /// Enqueue an item, giving up after `timeout`.
    ///
    /// Returns `false` if the queue stayed full for the whole interval; the
    /// item is dropped in that case.
    pub async fn push_timeout(&self, item: T, timeout: Duration) -> bool {
        matches!(
            compio::time::timeout(timeout, self.tx.send_async(item)).await,
            Ok(Ok(()))
        )
    }

    /// Enqueue without waiting. Hands the item back if the queue is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| e.into_inner())
    }

    /// Dequeue the next item, suspending while the queue is empty.
    pub async fn pop(&self) -> T {
        match self.rx.recv_async().await {
            Ok(item) => item,
            Err(_) => unreachable!("queue holds its own sender"),
        }
    }

    /// Dequeue the next item, giving up after `timeout`.
    ///
    /// `None` is the timeout sentinel.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match compio::time::timeout(timeout, self.rx.recv_async()).await {
            Ok(Ok(item)) => Some(item),
            _ => None,
        }
    }

    /// Dequeue without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Number of items currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    /// Fixed capacity chosen at creation.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: 'static> BoundedQueue<T> {
    /// Enqueue without making the caller wait.
    ///
    /// If the queue is full, a detached task finishes the push once a slot
    /// frees up, so the item is still delivered in order behind everything
    /// already queued. Returns `true` if the item was queued immediately.
    ///
    /// Must be called from inside a compio runtime.
    pub fn push_detached(&self, item: T) -> bool {
        match self.try_push(item) {
            Ok(()) => true,
            Err(item) => {
                let queue = self.clone();
                compio::runtime::spawn(async move { queue.push(item).await }).detach();
                false
            }
        }
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[compio::test]
    async fn test_fifo_order() {
        let queue = BoundedQueue::new(4);
        for i in 0..4 {
            queue.push(i).await;
        }
        for i in 0..4 {
            assert_eq!(queue.pop().await, i);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.try_push(1).is_ok());
        assert_eq!(queue.try_push(2), Err(2));
    }

    #[compio::test]
    async fn test_pop_timeout_returns_sentinel() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(1);
        assert_eq!(queue.pop_timeout(Duration::from_millis(20)).await, None);
    }

    #[compio::test]
    async fn test_push_detached_delivers_once_drained() {
        let queue = BoundedQueue::new(1);
        assert!(queue.push_detached(1));
        assert!(!queue.push_detached(2));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop().await, 1);
        assert_eq!(queue.pop_timeout(Duration::from_millis(200)).await, Some(2));
    }

    #[compio::test]
    async fn test_push_timeout_on_full_queue() {
        let queue = BoundedQueue::new(1);
        queue.push(1).await;
        assert!(!queue.push_timeout(2, Duration::from_millis(20)).await);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().await, 1);
    }

    #[compio::test]
    async fn test_full_queue_blocks_producer_until_drained() {
        let queue = BoundedQueue::new(2);
        queue.push(1).await;
        queue.push(2).await;

        let done = Rc::new(Cell::new(false));
        let producer = {
            let queue = queue.clone();
            let done = done.clone();
            compio::runtime::spawn(async move {
                queue.push(3).await;
                done.set(true);
            })
        };

        compio::time::sleep(Duration::from_millis(30)).await;
        assert!(!done.get(), "producer must wait for a free slot");

        assert_eq!(queue.pop().await, 1);
        let _ = producer.await;
        assert!(done.get());
        assert_eq!(queue.pop().await, 2);
        assert_eq!(queue.pop().await, 3);
    }
}
