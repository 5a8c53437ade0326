//! Observer list shared by the refresh bus and the balance store.
//!
//! Membership has set semantics keyed on handler identity: subscribing the
//! same `Arc` twice keeps a single entry. Notification walks a snapshot of
//! the list taken before the first handler runs and no lock is held while
//! handlers execute, so a handler may subscribe, unsubscribe or publish
//! again without deadlocking or disturbing its siblings.
//!
//! Unsubscribe contract: once a [`Subscription`] is released (dropped or
//! [`Subscription::unsubscribe`]d), its handler is not part of any
//! notification that starts afterwards. A notification already in progress
//! still reaches every handler it snapshotted.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

pub struct Observers<H: ?Sized> {
    handlers: Arc<Mutex<Vec<Arc<H>>>>,
}

fn same_handler<H: ?Sized>(a: &Arc<H>, b: &Arc<H>) -> bool {
    // Compare data addresses only; vtable pointers are not unique.
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

fn lock<H: ?Sized>(list: &Mutex<Vec<Arc<H>>>) -> MutexGuard<'_, Vec<Arc<H>>> {
    list.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<H: ?Sized + Send + Sync + 'static> Observers<H> {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self, handler: Arc<H>) -> Subscription {
        {
            let mut handlers = lock(&self.handlers);
            if !handlers.iter().any(|h| same_handler(h, &handler)) {
                handlers.push(Arc::clone(&handler));
            }
        }

        let list: Weak<Mutex<Vec<Arc<H>>>> = Arc::downgrade(&self.handlers);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(list) = list.upgrade() {
                    lock(&list).retain(|h| !same_handler(h, &handler));
                }
            })),
        }
    }

    /// Handlers in subscription order, detached from the live list.
    pub fn snapshot(&self) -> Vec<Arc<H>> {
        lock(&self.handlers).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.handlers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: ?Sized + Send + Sync + 'static> Default for Observers<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a handler subscribed for as long as it is alive.
#[must_use = "dropping a Subscription unsubscribes its handler immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Handler = dyn Fn() + Send + Sync;

    #[test]
    fn test_duplicate_subscription_collapses() {
        let observers = Observers::<Handler>::new();
        let handler: Arc<Handler> = Arc::new(|| {});

        let first = observers.subscribe(Arc::clone(&handler));
        let second = observers.subscribe(Arc::clone(&handler));
        assert_eq!(observers.len(), 1);

        // Releasing either guard removes the shared membership.
        first.unsubscribe();
        assert!(observers.is_empty());
        drop(second);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_drop_releases_handler() {
        let observers = Observers::<Handler>::new();
        {
            let _sub = observers.subscribe(Arc::new(|| {}));
            assert_eq!(observers.len(), 1);
        }
        assert!(observers.is_empty());
    }

    #[test]
    fn test_subscription_outliving_observers_is_harmless() {
        let observers = Observers::<Handler>::new();
        let sub = observers.subscribe(Arc::new(|| {}));
        drop(observers);
        sub.unsubscribe();
    }
}
