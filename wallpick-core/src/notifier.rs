//! Publish/subscribe point for "a wallpaper was committed" events.
//!
//! One `ChangeNotifier` is created by whoever composes the application and
//! cloned into the places that publish or listen; clones share subscribers.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::crop::CropRectangle;
use crate::destination::Destination;

/// Payload delivered to subscribers after a full successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct WallpaperChanged {
    /// Physical destinations now showing the wallpaper.
    pub destinations: Vec<Destination>,
    pub crop: CropRectangle,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&WallpaperChanged, SubscriptionId) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`. It receives its own id so it can unsubscribe from inside.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&WallpaperChanged, SubscriptionId) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.lock().iter().any(|(sub, _)| *sub == id)
    }

    /// Delivers `event` to everyone subscribed right now, in registration order.
    ///
    /// Callbacks run without the subscriber lock held, so they may subscribe
    /// or unsubscribe freely. Anyone unsubscribed before their turn is skipped;
    /// anyone subscribed during delivery only sees later events.
    pub fn publish(&self, event: &WallpaperChanged) -> usize {
        let snapshot: Vec<(SubscriptionId, Callback)> = self.inner.subscribers.lock().clone();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            if !self.is_subscribed(id) {
                continue;
            }
            callback(event, id);
            delivered += 1;
        }
        log::debug!("wallpaper change delivered to {} subscriber(s)", delivered);
        delivered
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
