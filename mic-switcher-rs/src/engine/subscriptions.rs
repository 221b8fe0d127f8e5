//! Endpoint notification subscriptions.
//!
//! Keeps at most one mute/volume listener per configured headset id.

use crate::audio::{ListenerRegistration, MuteEventSink, VolumeNotifier};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Attaches and detaches per-device listeners that forward to one sink.
///
/// Notifications are passed to the sink as delivered; no ordering or
/// buffering is added here.
pub struct SubscriptionManager {
    notifier: Arc<dyn VolumeNotifier>,
    sink: Arc<dyn MuteEventSink>,
    live: Mutex<HashMap<String, Box<dyn ListenerRegistration>>>,
}

impl SubscriptionManager {
    pub fn new(notifier: Arc<dyn VolumeNotifier>, sink: Arc<dyn MuteEventSink>) -> Self {
        Self {
            notifier,
            sink,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a listener to each id.
    ///
    /// An id that already has a listener is detached first. Ids that fail to
    /// resolve or attach are logged and skipped.
    pub fn subscribe(&self, ids: &[String]) {
        let mut live = self.live.lock();
        for id in ids {
            if let Some(previous) = live.remove(id) {
                if let Err(e) = previous.detach() {
                    warn!(device_id = %id, error = %e, "stale listener detach failed");
                }
            }

            match self.notifier.attach(id, self.sink.clone()) {
                Ok(registration) => {
                    info!(device_id = %id, "volume listener registered");
                    live.insert(id.clone(), registration);
                }
                Err(e) => {
                    warn!(device_id = %id, error = %e, "volume listener not registered, device skipped");
                }
            }
        }
    }

    /// Detach the listeners for each id.
    ///
    /// Ids without a listener are ignored; detach failures (usually an
    /// unplugged device) are logged and the listener is forgotten anyway.
    pub fn unsubscribe(&self, ids: &[String]) {
        let mut live = self.live.lock();
        for id in ids {
            let Some(registration) = live.remove(id) else {
                continue;
            };
            let device_id = registration.device_id().to_string();
            match registration.detach() {
                Ok(()) => info!(device_id = %device_id, "volume listener removed"),
                Err(e) => {
                    warn!(device_id = %device_id, error = %e, "volume listener detach failed (unplugged?)")
                }
            }
        }
    }

    /// Detach every live listener.
    pub fn unsubscribe_all(&self) {
        let ids: Vec<String> = self.live.lock().keys().cloned().collect();
        self.unsubscribe(&ids);
    }

    pub fn is_subscribed(&self, id: &str) -> bool {
        self.live.lock().contains_key(id)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VolumeNotification;
    use crate::engine::fakes::FakeNotifier;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<VolumeNotification>>,
    }

    impl MuteEventSink for Collector {
        fn on_volume_notification(&self, notification: VolumeNotification) {
            self.seen.lock().push(notification);
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn manager() -> (SubscriptionManager, FakeNotifier, Arc<Collector>) {
        let notifier = FakeNotifier::default();
        let sink = Arc::new(Collector::default());
        let manager = SubscriptionManager::new(Arc::new(notifier.clone()), sink.clone());
        (manager, notifier, sink)
    }

    #[test]
    fn test_subscribe_twice_keeps_one_listener_per_device() {
        let (manager, notifier, sink) = manager();
        manager.subscribe(&ids(&["a", "b"]));
        manager.subscribe(&ids(&["a", "b"]));

        assert_eq!(notifier.live_count("a"), 1);
        assert_eq!(notifier.live_count("b"), 1);
        assert_eq!(manager.live_count(), 2);

        assert_eq!(notifier.deliver("a", true), 1);
        assert_eq!(sink.seen.lock().len(), 1);
    }

    #[test]
    fn test_notifications_are_forwarded_verbatim() {
        let (manager, notifier, sink) = manager();
        manager.subscribe(&ids(&["a"]));
        notifier.deliver("a", false);

        assert_eq!(
            *sink.seen.lock(),
            vec![VolumeNotification {
                device_id: "a".into(),
                is_muted: false,
                volume_level: 0.5,
            }]
        );
    }

    #[test]
    fn test_absent_device_is_skipped_not_fatal() {
        let (manager, notifier, _sink) = manager();
        notifier.unplug("a");
        manager.subscribe(&ids(&["a", "b"]));

        assert!(!manager.is_subscribed("a"));
        assert!(manager.is_subscribed("b"));
        assert_eq!(notifier.attach_calls(), ids(&["a", "b"]));
    }

    #[test]
    fn test_unsubscribe_unknown_id_is_noop() {
        let (manager, notifier, _sink) = manager();
        manager.unsubscribe(&ids(&["never"]));
        manager.unsubscribe(&ids(&["never"]));
        assert_eq!(notifier.total_live(), 0);
    }

    #[test]
    fn test_unsubscribe_unplugged_device_then_resubscribe() {
        let (manager, notifier, sink) = manager();
        manager.subscribe(&ids(&["a", "b"]));

        notifier.unplug("a");
        manager.unsubscribe(&ids(&["a", "b"]));
        assert_eq!(manager.live_count(), 0);
        assert_eq!(notifier.total_live(), 0);

        notifier.replug("a");
        manager.subscribe(&ids(&["a"]));
        assert_eq!(notifier.live_count("a"), 1);
        assert_eq!(notifier.deliver("a", true), 1);
        assert_eq!(sink.seen.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_all_and_drop_leave_nothing_live() {
        let (manager, notifier, _sink) = manager();
        manager.subscribe(&ids(&["a", "b", "c"]));
        manager.unsubscribe_all();
        assert_eq!(notifier.total_live(), 0);

        manager.subscribe(&ids(&["a"]));
        drop(manager);
        assert_eq!(notifier.total_live(), 0);
    }
}
