//! Latest-snapshot store with synchronous subscriber fan-out.
//!
//! The current snapshot sits behind an `Arc` and is replaced whole on every
//! publish, so a reader holding the previous `Arc` never sees a torn value.
//! Subscribers run on the publishing task, after the state lock is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Notify;

use crimsonwatch_domain::{ErrorKind, FallbackProfile, SecuritySnapshot};

/// What a subscriber receives: the snapshot plus loading/error metadata.
#[derive(Debug, Clone)]
pub struct StoreUpdate {
    pub snapshot: Arc<SecuritySnapshot>,
    pub loading: bool,
    pub last_error: Option<ErrorKind>,
    /// Increments once per publish; 0 until the first cycle completes.
    pub generation: u64,
}

type Callback = Arc<dyn Fn(&StoreUpdate) + Send + Sync>;

struct Inner {
    state: RwLock<StoreUpdate>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_subscriber: AtomicU64,
    refresh: Notify,
    fallback_profile: RwLock<Option<FallbackProfile>>,
}

#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<Inner>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::with_profile(None)
    }

    pub fn with_profile(profile: Option<FallbackProfile>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(StoreUpdate {
                    snapshot: Arc::new(SecuritySnapshot::empty(Utc::now())),
                    loading: false,
                    last_error: None,
                    generation: 0,
                }),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                refresh: Notify::new(),
                fallback_profile: RwLock::new(profile),
            }),
        }
    }

    /// Last published snapshot, or the empty placeholder before the first.
    pub fn get_current(&self) -> Arc<SecuritySnapshot> {
        self.read_state().snapshot.clone()
    }

    pub fn state(&self) -> StoreUpdate {
        self.read_state().clone()
    }

    /// Replace the current snapshot and notify every subscriber. Returns the
    /// new generation.
    pub fn publish(&self, snapshot: SecuritySnapshot) -> u64 {
        let last_error = if snapshot.is_live() {
            None
        } else {
            Some(ErrorKind::AllSourcesFailed)
        };
        let update = {
            let mut state = self.write_state();
            state.snapshot = Arc::new(snapshot);
            state.loading = false;
            state.last_error = last_error;
            state.generation += 1;
            state.clone()
        };
        self.notify(&update);
        update.generation
    }

    /// Flip the loading flag. Subscribers hear about it only when it changes.
    pub fn set_loading(&self, loading: bool) {
        let update = {
            let mut state = self.write_state();
            if state.loading == loading {
                return;
            }
            state.loading = loading;
            state.clone()
        };
        self.notify(&update);
    }

    /// Drops the loading flag without a broadcast. Used when a cycle ends
    /// without publishing after teardown.
    pub(crate) fn clear_loading(&self) {
        self.write_state().loading = false;
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StoreUpdate) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Ask the scheduler for an out-of-band cycle. Returns `false` when a
    /// cycle is already in flight; the request is then dropped.
    pub fn manual_refresh(&self) -> bool {
        if self.read_state().loading {
            tracing::debug!("refresh ignored, cycle in flight");
            return false;
        }
        self.inner.refresh.notify_one();
        true
    }

    /// Resolves once a manual refresh has been requested.
    pub async fn refresh_requested(&self) {
        self.inner.refresh.notified().await;
    }

    /// Select the static dataset served when live sources are down, and ask
    /// for a refresh so consumers see it.
    pub fn select_fallback_profile(&self, name: &str) -> Result<FallbackProfile> {
        let profile: FallbackProfile = name
            .parse()
            .with_context(|| format!("cannot select fallback profile {name:?}"))?;
        self.set_fallback_profile(Some(profile));
        self.manual_refresh();
        Ok(profile)
    }

    pub fn set_fallback_profile(&self, profile: Option<FallbackProfile>) {
        *self
            .inner
            .fallback_profile
            .write()
            .unwrap_or_else(PoisonError::into_inner) = profile;
    }

    pub fn fallback_profile(&self) -> Option<FallbackProfile> {
        *self
            .inner
            .fallback_profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, update: &StoreUpdate) {
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(update);
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, StoreUpdate> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, StoreUpdate> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    /// Keep the callback registered for the life of the store.
    pub fn detach(mut self) {
        self.store = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}
