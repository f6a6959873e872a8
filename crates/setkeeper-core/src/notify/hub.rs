use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{NewNotification, Notification, NotificationConfig, NotificationId};
use crate::observe::{Observable, Subscription};
use crate::timing::{Clock, Throttle};
use crate::{Error, Result};

#[derive(Default)]
struct HubState {
    /// Insertion order
    entries: Vec<Notification>,
    /// One throttle per visible dedupe key
    throttles: HashMap<String, Throttle>,
    /// Bumped on every change to `entries`
    version: u64,
}

impl HubState {
    fn ordered(&self) -> Vec<Notification> {
        let mut ordered = self.entries.clone();
        ordered.sort_by_key(|entry| (std::cmp::Reverse(entry.priority), entry.created_at));
        ordered
    }
}

#[derive(Clone, Default)]
struct Published {
    version: u64,
    entries: Vec<Notification>,
}

/// Priority-ordered, bounded collection of visible notifications.
pub struct NotificationHub {
    config: NotificationConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<HubState>,
    published: Observable<Published>,
}

impl NotificationHub {
    pub fn new(config: NotificationConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            state: Mutex::new(HubState::default()),
            published: Observable::new(Published::default()),
        })
    }

    /// Publish a notification.
    ///
    /// An identical notification (kind, title and message) that is still
    /// visible and was pushed within the de-duplication window is reused and
    /// its id returned instead.
    pub fn push(&self, notification: NewNotification) -> NotificationId {
        let now = self.clock.now();
        let key = notification.dedupe_key();
        let id = {
            let mut state = self.state.lock();
            let duplicate = state
                .entries
                .iter()
                .find(|entry| entry.dedupe_key == key)
                .map(|entry| entry.id);
            let throttle = state
                .throttles
                .entry(key.clone())
                .or_insert_with(|| Throttle::new(self.config.dedupe_window()));
            if let (Some(existing), false) = (duplicate, throttle.try_acquire(now)) {
                tracing::debug!(kind = %notification.kind, title = %notification.title, "Collapsed duplicate notification");
                return existing;
            }

            let lifetime = match notification.duration {
                Some(Duration::ZERO) => None,
                Some(duration) => Some(duration),
                None => self.config.lifetime(notification.kind),
            };
            let entry = Notification {
                id: NotificationId::new(),
                kind: notification.kind,
                title: notification.title,
                message: notification.message,
                priority: notification.priority,
                lifetime,
                actions: notification.actions,
                created_at: now,
                dedupe_key: key,
            };
            let id = entry.id;
            tracing::debug!(%id, kind = %entry.kind, title = %entry.title, "Notification shown");
            state.entries.push(entry);
            self.evict_overflow(&mut state, id);
            id
        };
        self.publish();
        id
    }

    pub fn dismiss(&self, id: NotificationId) -> Result<()> {
        {
            let mut state = self.state.lock();
            let index = state
                .entries
                .iter()
                .position(|entry| entry.id == id)
                .ok_or_else(|| Error::NotificationNotFound(id.to_string()))?;
            state.entries.remove(index);
            prune_throttles(&mut state);
        }
        self.publish();
        Ok(())
    }

    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.entries.clear();
            state.throttles.clear();
        }
        self.publish();
    }

    /// Drop notifications whose lifetime has elapsed. Returns how many went.
    pub fn expire(&self) -> usize {
        let now = self.clock.now();
        let removed = {
            let mut state = self.state.lock();
            let before = state.entries.len();
            state
                .entries
                .retain(|entry| entry.expires_at().map_or(true, |at| at > now));
            prune_throttles(&mut state);
            before - state.entries.len()
        };
        if removed > 0 {
            self.publish();
        }
        removed
    }

    /// Earliest auto-dismiss deadline among visible notifications.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.state
            .lock()
            .entries
            .iter()
            .filter_map(Notification::expires_at)
            .min()
    }

    /// Run an action. Success dismisses the notification; failure publishes
    /// a follow-up error notification and keeps the original.
    pub fn invoke_action(&self, id: NotificationId, label: &str) -> Result<()> {
        let action = {
            let state = self.state.lock();
            let entry = state
                .entries
                .iter()
                .find(|entry| entry.id == id)
                .ok_or_else(|| Error::NotificationNotFound(id.to_string()))?;
            entry
                .actions
                .iter()
                .find(|action| action.label == label)
                .cloned()
                .ok_or_else(|| Error::NotificationNotFound(format!("{id} action '{label}'")))?
        };

        match action.invoke() {
            Ok(()) => self.dismiss(id),
            Err(message) => {
                tracing::warn!(%id, action = label, error = %message, "Notification action failed");
                self.push(NewNotification::error(format!("{label} failed"), message));
                Ok(())
            }
        }
    }

    /// Visible notifications, most urgent first, oldest first within a priority.
    pub fn visible(&self) -> Vec<Notification> {
        self.state.lock().ordered()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive the visible list now and after every change.
    pub fn subscribe(&self, listener: impl Fn(&Vec<Notification>) + Send + Sync + 'static) -> Subscription {
        self.published.subscribe(move |published| listener(&published.entries))
    }

    /// Evict until within `max_visible`: transient before persistent, then
    /// lowest priority, then oldest. The notification just pushed is kept.
    fn evict_overflow(&self, state: &mut HubState, keep: NotificationId) {
        while state.entries.len() > self.config.max_visible {
            let victim = state
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.id != keep)
                .min_by_key(|(_, entry)| (entry.is_persistent(), entry.priority, entry.created_at))
                .map(|(index, _)| index);
            let Some(index) = victim else {
                break;
            };
            let evicted = state.entries.remove(index);
            tracing::debug!(id = %evicted.id, title = %evicted.title, "Evicted notification");
        }
        prune_throttles(state);
    }

    /// Publish the current list. A publish that lost the race to a newer
    /// one is dropped so subscribers end on the latest state.
    fn publish(&self) {
        let next = {
            let mut state = self.state.lock();
            state.version += 1;
            Published {
                version: state.version,
                entries: state.ordered(),
            }
        };
        self.published
            .set_if(next, |current, next| next.version > current.version);
    }
}

fn prune_throttles(state: &mut HubState) {
    let HubState { entries, throttles, .. } = state;
    throttles.retain(|key, _| entries.iter().any(|entry| &entry.dedupe_key == key));
}
