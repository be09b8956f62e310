//! Store change-log fallback
//!
//! When contexts share a store but no hub, changes are observed on the store
//! itself: every [`WatchedStore`] appends successful writes to a shared
//! [`ChangeLog`], and a [`StoreWatchNotifier`] turns changes of the record
//! key made by other contexts into session events.

use crate::hub::{spawn_listener, ContextId};
use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    notify::{
        synthesize_from_change, CrossContextNotifier, EventCallback, NotifierTransport,
        SessionEvent, StoredValueDecoder, Subscription,
    },
    storage::{PersistentStore, StoreKind},
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace, warn};

/// A single successful mutation of a watched store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
    pub origin: ContextId,
}

/// Change feed shared by the [`WatchedStore`]s of one underlying store.
#[derive(Clone)]
pub struct ChangeLog {
    sender: broadcast::Sender<StoreChange>,
}

impl ChangeLog {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    fn record(&self, change: StoreChange) {
        // Nobody watching is fine.
        let _ = self.sender.send(change);
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Store decorator that reports its writes on a [`ChangeLog`].
///
/// Only actual changes are reported: rewriting the same value or removing an
/// absent key is silent, the way browser `storage` events behave. Each
/// execution context wraps the shared store in its own `WatchedStore`
/// so changes carry the writer's [`ContextId`].
pub struct WatchedStore {
    inner: Arc<dyn PersistentStore>,
    log: ChangeLog,
    context: ContextId,
}

impl WatchedStore {
    pub fn new(inner: Arc<dyn PersistentStore>, log: ChangeLog) -> Self {
        Self {
            inner,
            log,
            context: ContextId::new(),
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.context
    }

    pub fn change_log(&self) -> &ChangeLog {
        &self.log
    }

    // `None` when the previous value cannot be read.
    async fn current(&self, key: &str) -> Option<Option<String>> {
        self.inner.get(key).await.ok()
    }

    /// Notifier watching `record_key` for changes made by other contexts.
    pub fn notifier(
        &self,
        record_key: impl Into<String>,
        decoder: StoredValueDecoder,
    ) -> StoreWatchNotifier {
        StoreWatchNotifier {
            log: self.log.clone(),
            context: self.context,
            record_key: record_key.into(),
            decoder,
        }
    }
}

#[async_trait]
impl PersistentStore for WatchedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if matches!(self.current(key).await, Some(Some(previous)) if previous == value) {
            trace!(key = key, "Value unchanged, nothing to report");
            return Ok(());
        }

        self.inner.set(key, value).await?;
        self.log.record(StoreChange {
            key: key.to_string(),
            new_value: Some(value.to_string()),
            origin: self.context,
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let was_present = !matches!(self.current(key).await, Some(None));

        self.inner.remove(key).await?;
        if !was_present {
            return Ok(());
        }

        self.log.record(StoreChange {
            key: key.to_string(),
            new_value: None,
            origin: self.context,
        });
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }
}

/// Fallback notifier driven by store changes.
///
/// Publishing is a no-op: the store write already is the signal.
pub struct StoreWatchNotifier {
    log: ChangeLog,
    context: ContextId,
    record_key: String,
    decoder: StoredValueDecoder,
}

impl CrossContextNotifier for StoreWatchNotifier {
    fn publish(&self, event: &SessionEvent) {
        trace!(
            event = event.kind(),
            key = %self.record_key,
            "Store change carries the event"
        );
    }

    fn subscribe(&self, callback: EventCallback) -> Subscription {
        let mut receiver = self.log.subscribe();
        let own = self.context;
        let record_key = self.record_key.clone();
        let decoder = Arc::clone(&self.decoder);

        spawn_listener("store_change_log", async move {
            loop {
                match receiver.recv().await {
                    Ok(change) if change.origin == own || change.key != record_key => continue,
                    Ok(change) => {
                        match synthesize_from_change(change.new_value.as_deref(), &decoder) {
                            Some(event) => {
                                debug!(key = %record_key, event = event.kind(), "Synthesised session event");
                                callback(event);
                            }
                            None => warn!(key = %record_key, "Ignoring undecodable record change"),
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change log subscriber lagged; changes dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn transport(&self) -> NotifierTransport {
        NotifierTransport::StoreChangeLog
    }
}
