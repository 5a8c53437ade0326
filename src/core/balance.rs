//! Shared, observable balance value

use super::observer::{Observers, Subscription};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type BalanceHandler = dyn Fn(Option<&str>) + Send + Sync;

/// Single-value cache for the formatted wallet balance. Last write wins;
/// every subscriber sees each write synchronously.
#[derive(Default)]
pub struct BalanceStore {
    value: Mutex<Option<String>>,
    observers: Observers<BalanceHandler>,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: Option<String>) {
        {
            let mut current = self.value.lock().unwrap_or_else(|p| p.into_inner());
            current.clone_from(&value);
        }
        debug!(balance = ?value, "Balance updated");

        for handler in self.observers.snapshot() {
            handler(value.as_deref());
        }
    }

    pub fn get(&self) -> Option<String> {
        self.value.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn subscribe(&self, handler: Arc<BalanceHandler>) -> Subscription {
        self.observers.subscribe(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(seen: &Arc<Mutex<Vec<Option<String>>>>) -> Arc<BalanceHandler> {
        let seen = Arc::clone(seen);
        Arc::new(move |value: Option<&str>| seen.lock().unwrap().push(value.map(str::to_string)))
    }

    #[test]
    fn test_starts_empty() {
        assert_eq!(BalanceStore::new().get(), None);
    }

    #[test]
    fn test_set_then_get_and_notify() {
        let store = BalanceStore::new();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let _a = store.subscribe(collector(&seen_a));
        let _b = store.subscribe(collector(&seen_b));

        store.set(Some("12.3456 QUAI".to_string()));
        assert_eq!(store.get().as_deref(), Some("12.3456 QUAI"));

        store.set(None);
        assert_eq!(store.get(), None);

        let expected = vec![Some("12.3456 QUAI".to_string()), None];
        assert_eq!(*seen_a.lock().unwrap(), expected);
        assert_eq!(*seen_b.lock().unwrap(), expected);
    }

    #[test]
    fn test_released_subscriber_not_notified() {
        let store = BalanceStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = store.subscribe(collector(&seen));

        store.set(Some("1.0000 QUAI".to_string()));
        drop(sub);
        store.set(Some("2.0000 QUAI".to_string()));

        assert_eq!(*seen.lock().unwrap(), vec![Some("1.0000 QUAI".to_string())]);
        assert_eq!(store.get().as_deref(), Some("2.0000 QUAI"));
    }

    #[test]
    fn test_handler_can_read_store_during_notification() {
        let store = Arc::new(BalanceStore::new());
        let seen = Arc::new(Mutex::new(None));
        let inner_store = Arc::clone(&store);
        let inner_seen = Arc::clone(&seen);
        let _sub = store.subscribe(Arc::new(move |_: Option<&str>| {
            *inner_seen.lock().unwrap() = inner_store.get();
        }));

        store.set(Some("3.0000 QUAI".to_string()));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("3.0000 QUAI"));
    }
}
