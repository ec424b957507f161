//! Deferred reclamation of native handles.
//!
//! Dropping a wrapper may happen on any thread, at any time, including while
//! another thread is inside a native call on the same store. Native deletes
//! are not safe in that position, so a dropped wrapper only *enqueues* its
//! handle here. The store drains the queue on its own thread right before
//! the next operation that uses its native pointer.

use parking_lot::Mutex;
use tracing::trace;

/// A native resource that can be released exactly once.
pub(crate) trait Reclaim: Send + PartialEq {
    /// Issue the native delete for this handle.
    fn reclaim(self);
}

/// Queue of handles waiting for a safe point to be deleted.
pub(crate) struct FreeList<H: Reclaim> {
    pending: Mutex<Vec<H>>,
}

impl<H: Reclaim> FreeList<H> {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue `handle` for deletion. Never calls into the native engine.
    pub(crate) fn enqueue(&self, handle: H) {
        let mut pending = self.pending.lock();
        debug_assert!(
            !pending.contains(&handle),
            "native handle enqueued for reclamation twice"
        );
        pending.push(handle);
    }

    /// Delete every queued handle in enqueue order and return how many
    /// were deleted.
    ///
    /// The lock is only held to swap the queue out; deletes run after it
    /// is released so that an enqueue from another thread never waits on a
    /// native call.
    pub(crate) fn drain(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.lock());
        let count = batch.len();
        for handle in batch {
            handle.reclaim();
        }
        if count > 0 {
            trace!(count, "reclaimed native handles");
        }
        count
    }

    /// Number of handles waiting for the next drain.
    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Deletes whatever is still queued.
///
/// The queue lives as long as any handle of its store, so once the `Store`
/// itself is gone this runs on the thread that drops the last handle
/// wrapper, and the remaining native deletes run there too. No store call
/// can be in flight at that point.
impl<H: Reclaim> Drop for FreeList<H> {
    fn drop(&mut self) {
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    struct MockHandle {
        id: u32,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl PartialEq for MockHandle {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Reclaim for MockHandle {
        fn reclaim(self) {
            self.log.lock().push(self.id);
        }
    }

    fn handle(id: u32, log: &Arc<Mutex<Vec<u32>>>) -> MockHandle {
        MockHandle {
            id,
            log: Arc::clone(log),
        }
    }

    #[test]
    fn test_enqueue_does_not_reclaim() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let freelist = FreeList::new();

        freelist.enqueue(handle(1, &log));
        freelist.enqueue(handle(2, &log));

        assert!(log.lock().is_empty());
        assert_eq!(freelist.len(), 2);
    }

    #[test]
    fn test_drain_in_enqueue_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let freelist = FreeList::new();
        for id in [3, 1, 2] {
            freelist.enqueue(handle(id, &log));
        }

        assert_eq!(freelist.drain(), 3);
        assert_eq!(*log.lock(), vec![3, 1, 2]);
        assert_eq!(freelist.len(), 0);
    }

    #[test]
    fn test_reclaimed_exactly_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let freelist = FreeList::new();
        freelist.enqueue(handle(7, &log));

        assert_eq!(freelist.drain(), 1);
        assert_eq!(freelist.drain(), 0);
        assert_eq!(freelist.drain(), 0);
        assert_eq!(*log.lock(), vec![7]);
    }

    #[test]
    fn test_drop_drains_pending() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let freelist = FreeList::new();
            freelist.enqueue(handle(1, &log));
        }
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn test_enqueue_from_other_threads() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let freelist = Arc::new(FreeList::new());

        let workers: Vec<_> = (0..4)
            .map(|t| {
                let freelist = Arc::clone(&freelist);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..25 {
                        freelist.enqueue(handle(t * 100 + i, &log));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(freelist.drain(), 100);
        let mut seen = log.lock().clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn test_reclaim_may_enqueue_more() {
        // A reclaim that drops the last reference to another wrapper pushes
        // onto the same queue; the lock is not held while reclaiming.
        struct Chained {
            id: u32,
            next: Option<u32>,
            queue: Arc<FreeList<Chained>>,
            log: Arc<Mutex<Vec<u32>>>,
        }

        impl PartialEq for Chained {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Reclaim for Chained {
            fn reclaim(self) {
                self.log.lock().push(self.id);
                if let Some(next) = self.next {
                    self.queue.enqueue(Chained {
                        id: next,
                        next: None,
                        queue: Arc::clone(&self.queue),
                        log: Arc::clone(&self.log),
                    });
                }
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(FreeList::new());
        queue.enqueue(Chained {
            id: 1,
            next: Some(2),
            queue: Arc::clone(&queue),
            log: Arc::clone(&log),
        });

        assert_eq!(queue.drain(), 1);
        assert_eq!(queue.drain(), 1);
        assert_eq!(*log.lock(), vec![1, 2]);
    }
}
