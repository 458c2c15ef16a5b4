//! Fixed-size async page pool
//!
//! The pool holds a fixed set of browser page handles. Acquiring blocks until
//! a handle is free; dropping the lease returns the handle to the pool. The
//! semaphore provides the waiting, the slot deque the actual handles, so the
//! return path in `Drop` never needs to be async.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct PoolInner<P> {
    semaphore: Arc<Semaphore>,
    slots: Mutex<VecDeque<P>>,
}

/// A pool of reusable page handles
pub struct PagePool<P> {
    inner: Arc<PoolInner<P>>,
}

impl<P> Clone for PagePool<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> PagePool<P> {
    /// Creates a pool owning the given handles
    pub fn new(pages: Vec<P>) -> Self {
        let capacity = pages.len();
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                slots: Mutex::new(pages.into()),
            }),
        }
    }

    /// Number of handles currently idle in the pool
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Waits for a free handle and leases it out
    pub async fn acquire(&self) -> PageLease<P> {
        // The semaphore was created with one permit per slot and is never
        // closed, so acquisition cannot fail and a slot is always present
        // once a permit is held.
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .expect("page pool semaphore closed");

        let page = self
            .inner
            .slots
            .lock()
            .unwrap()
            .pop_front()
            .expect("permit held but no page slot free");

        PageLease {
            page: Some(page),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        }
    }
}

/// An exclusive lease on one pooled page handle
pub struct PageLease<P> {
    page: Option<P>,
    inner: Arc<PoolInner<P>>,
    _permit: OwnedSemaphorePermit,
}

impl<P> Deref for PageLease<P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.page.as_ref().expect("lease already released")
    }
}

impl<P> DerefMut for PageLease<P> {
    fn deref_mut(&mut self) -> &mut P {
        self.page.as_mut().expect("lease already released")
    }
}

impl<P> Drop for PageLease<P> {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            self.inner.slots.lock().unwrap().push_back(page);
        }
        // The permit is released after the slot is restored, so a waiter
        // woken by the permit always finds a page.
    }
}
