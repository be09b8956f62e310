//! In-process context hub
//!
//! Native counterpart of a browser `BroadcastChannel`: every execution
//! context of the process takes a [`HubNotifier`] from the same
//! [`ContextHub`]; an event published through one notifier reaches the
//! subscribers of every other notifier, never its own.

use bridge_traits::notify::{
    CrossContextNotifier, EventCallback, NotifierTransport, SessionEvent, Subscription,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Default capacity of a hub's broadcast buffer.
pub const DEFAULT_HUB_CAPACITY: usize = 64;

/// Identity of one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
struct HubMessage {
    origin: ContextId,
    event: SessionEvent,
}

/// Named broadcast channel shared by the contexts of one process.
#[derive(Clone)]
pub struct ContextHub {
    name: Arc<str>,
    sender: broadcast::Sender<HubMessage>,
}

impl ContextHub {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_HUB_CAPACITY)
    }

    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            name: Arc::from(name.into()),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Notifier for a new execution context.
    pub fn notifier(&self) -> HubNotifier {
        HubNotifier {
            hub_name: Arc::clone(&self.name),
            context: ContextId::new(),
            sender: self.sender.clone(),
        }
    }

    /// Number of live subscriptions across all contexts.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for ContextHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHub")
            .field("name", &self.name)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

/// One context's handle on a [`ContextHub`].
pub struct HubNotifier {
    hub_name: Arc<str>,
    context: ContextId,
    sender: broadcast::Sender<HubMessage>,
}

impl HubNotifier {
    pub fn context_id(&self) -> ContextId {
        self.context
    }
}

impl CrossContextNotifier for HubNotifier {
    fn publish(&self, event: &SessionEvent) {
        let message = HubMessage {
            origin: self.context,
            event: event.clone(),
        };

        match self.sender.send(message) {
            Ok(receivers) => trace!(
                hub = %self.hub_name,
                event = event.kind(),
                receivers,
                "Published session event"
            ),
            // No subscriber anywhere; nothing to deliver.
            Err(_) => trace!(hub = %self.hub_name, event = event.kind(), "No listeners on hub"),
        }
    }

    fn subscribe(&self, callback: EventCallback) -> Subscription {
        let mut receiver = self.sender.subscribe();
        let own = self.context;
        let hub = Arc::clone(&self.hub_name);

        spawn_listener("hub", async move {
            loop {
                match receiver.recv().await {
                    Ok(message) if message.origin == own => continue,
                    Ok(message) => {
                        debug!(hub = %hub, event = message.event.kind(), "Received session event");
                        callback(message.event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(hub = %hub, skipped, "Hub subscriber lagged; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn transport(&self) -> NotifierTransport {
        NotifierTransport::InProcess
    }
}

/// Run `listener` on the current Tokio runtime, tied to the returned
/// subscription. Without a runtime the subscription is inert.
pub(crate) fn spawn_listener<F>(transport: &'static str, listener: F) -> Subscription
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            let task = handle.spawn(listener);
            Subscription::new(Box::new(move || task.abort()))
        }
        Err(_) => {
            warn!(
                transport,
                "No Tokio runtime; cross-context events will not be delivered"
            );
            Subscription::inert()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn collecting() -> (EventCallback, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: EventCallback = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        (callback, rx)
    }

    fn token_event(token: &str) -> SessionEvent {
        SessionEvent::TokenUpdated {
            token: token.to_string(),
            user_data: None,
            refresh_token: None,
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn test_event_reaches_other_context_only() {
        let hub = ContextHub::new("session");
        let a = hub.notifier();
        let b = hub.notifier();

        let (on_a, mut rx_a) = collecting();
        let (on_b, mut rx_b) = collecting();
        let _sub_a = a.subscribe(on_a);
        let _sub_b = b.subscribe(on_b);

        a.publish(&token_event("newtok"));

        let received = tokio::time::timeout(Duration::from_secs(1), rx_b.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, SessionEvent::TokenUpdated { ref token, .. } if token == "newtok"));

        // The publisher never hears itself
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let hub = ContextHub::new("session");
        let a = hub.notifier();
        let b = hub.notifier();
        let (on_b, mut rx_b) = collecting();
        let _sub = b.subscribe(on_b);

        a.publish(&token_event("one"));
        a.publish(&SessionEvent::Logout);

        let first = rx_b.recv().await.unwrap();
        let second = rx_b.recv().await.unwrap();
        assert_eq!(first.kind(), "TOKEN_UPDATED");
        assert_eq!(second, SessionEvent::Logout);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let hub = ContextHub::new("session");
        let a = hub.notifier();
        let b = hub.notifier();
        let (on_b, mut rx_b) = collecting();

        let subscription = b.subscribe(on_b);
        assert_eq!(hub.subscriber_count(), 1);
        subscription.unsubscribe();
        subscription.unsubscribe();

        a.publish(&SessionEvent::Logout);

        // The aborted task drops the callback, closing the channel
        let next = tokio::time::timeout(Duration::from_secs(1), rx_b.recv())
            .await
            .unwrap();
        assert_eq!(next, None);
    }

    #[test]
    fn test_publish_without_listeners_is_silent() {
        let hub = ContextHub::new("session");
        hub.notifier().publish(&SessionEvent::Logout);
        assert_eq!(hub.notifier().transport(), NotifierTransport::InProcess);
    }

    #[test]
    fn test_subscribe_outside_runtime_is_inert() {
        let hub = ContextHub::new("session");
        let subscription = hub.notifier().subscribe(Arc::new(|_| {}));
        assert!(!subscription.is_active());
    }

    #[test]
    fn test_context_ids_are_distinct() {
        let hub = ContextHub::new("session");
        assert_ne!(hub.notifier().context_id(), hub.notifier().context_id());
    }
}
