//! Observable value store and the notification feed built on it.
//!
//! A [`Store`] owns one value. Writes go through [`Store::set`] or [`Store::update`], and every
//! write notifies the current subscribers with the new value. Subscribing returns a
//! [`Subscription`]; the listener is removed when the subscription is dropped or unsubscribed.
//!
//! Listeners are called after the store's locks are released, so a listener may read the store or
//! unsubscribe without deadlocking.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: Mutex<T>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_listener_id: AtomicU64,
}

/// Shared, observable value. Clones refer to the same value.
pub struct Store<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

fn lock<U>(mutex: &Mutex<U>) -> MutexGuard<'_, U> {
    // A listener that panicked cannot leave the value half-written: writes complete before
    // listeners run.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(value),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        lock(&self.inner.value).clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        let snapshot = {
            let mut current = lock(&self.inner.value);
            *current = value;
            current.clone()
        };
        self.notify(&snapshot);
    }

    /// Modify the value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let snapshot = {
            let mut current = lock(&self.inner.value);
            f(&mut current);
            current.clone()
        };
        self.notify(&snapshot);
    }

    /// Register `listener` for every later write.
    ///
    /// The listener stays registered as long as the returned [`Subscription`] is alive.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    fn notify(&self, value: &T) {
        let listeners: Vec<Listener<T>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

/// Handle returned by [`Store::subscribe`]. Dropping it removes the listener.
#[must_use = "the listener is removed when the subscription is dropped"]
pub struct Subscription<T> {
    store: Weak<Inner<T>>,
    id: u64,
}

impl<T> Subscription<T> {
    /// Remove the listener now. A no-op if the store is gone.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// How long a notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub kind: NotificationKind,
    #[serde(skip)]
    pub created_at: Instant,
}

/// Transient user-facing messages. Expired entries are pruned on every push and by
/// [`Notifications::active`], so the feed stays bounded even when nobody reads it.
#[derive(Clone, Default)]
pub struct Notifications {
    store: Store<Vec<Notification>>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, message: impl Into<String>) -> String {
        self.push(NotificationKind::Success, message.into(), Instant::now())
    }

    pub fn error(&self, message: impl Into<String>) -> String {
        self.push(NotificationKind::Error, message.into(), Instant::now())
    }

    pub fn info(&self, message: impl Into<String>) -> String {
        self.push(NotificationKind::Info, message.into(), Instant::now())
    }

    /// Add a notification created at `at` and return its id. Entries expired at `at` are dropped.
    pub fn push(&self, kind: NotificationKind, message: String, at: Instant) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let notification = Notification {
            id: id.clone(),
            message,
            kind,
            created_at: at,
        };
        self.store.update(|list| {
            list.retain(|n| !is_expired(n, at));
            list.push(notification);
        });
        id
    }

    pub fn len(&self) -> usize {
        self.store.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dismiss(&self, id: &str) {
        self.store.update(|list| list.retain(|n| n.id != id));
    }

    /// Notifications still visible at `now`, oldest first. Expired ones are removed.
    pub fn active(&self, now: Instant) -> Vec<Notification> {
        if self.store.get().iter().any(|n| is_expired(n, now)) {
            self.store.update(|list| list.retain(|n| !is_expired(n, now)));
        }
        self.store.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&Vec<Notification>) + Send + Sync + 'static,
    ) -> Subscription<Vec<Notification>> {
        self.store.subscribe(listener)
    }
}

fn is_expired(notification: &Notification, now: Instant) -> bool {
    now.saturating_duration_since(notification.created_at) >= NOTIFICATION_TTL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_every_write() {
        let store = Store::new(0_u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(move |v| sink.lock().unwrap().push(*v));

        store.set(1);
        store.update(|v| *v += 10);

        assert_eq!(*seen.lock().unwrap(), vec![1, 11]);
        assert_eq!(store.get(), 11);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = Store::new(String::new());
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let subscription = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(store.subscriber_count(), 1);

        store.set("a".into());
        subscription.unsubscribe();
        store.set("b".into());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn dropping_the_subscription_removes_the_listener() {
        let store = Store::new(0_u8);
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        {
            let _subscription = store.subscribe(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            store.set(1);
        }
        store.set(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn listeners_may_read_the_store() {
        let store = Store::new(1_i32);
        let reader = store.clone();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(move |_| {
            *sink.lock().unwrap() = Some(reader.get());
        });

        store.set(5);
        assert_eq!(*seen.lock().unwrap(), Some(5));
    }

    #[test]
    fn notifications_expire_after_ttl() {
        let feed = Notifications::new();
        let start = Instant::now();
        feed.push(NotificationKind::Success, "Cas d'école créé".into(), start);
        let later = start + Duration::from_secs(2);
        let id = feed.push(NotificationKind::Error, "Erreur".into(), later);

        assert_eq!(feed.active(start + Duration::from_secs(1)).len(), 2);

        let remaining = feed.active(start + NOTIFICATION_TTL);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, id);
        assert_eq!(remaining[0].kind, NotificationKind::Error);
    }

    #[test]
    fn push_prunes_expired_entries_without_a_reader() {
        let feed = Notifications::new();
        let start = Instant::now();
        for i in 0..5 {
            feed.push(NotificationKind::Success, format!("Cas validé {i}"), start);
        }
        assert_eq!(feed.len(), 5);

        let id = feed.push(NotificationKind::Info, "Cas rejeté".into(), start + NOTIFICATION_TTL);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.active(start + NOTIFICATION_TTL)[0].id, id);
    }

    #[test]
    fn dismiss_removes_by_id() {
        let feed = Notifications::new();
        let id = feed.info("Chargement");
        feed.success("OK");

        feed.dismiss(&id);
        let active = feed.active(Instant::now());
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "OK");
    }
}
