//! Browser cross-tab notifiers.
//!
//! [`BroadcastChannelNotifier`] is preferred: it carries the publisher's
//! intent and reaches every other tab of the origin. Browsers without
//! `BroadcastChannel` fall back to [`StorageEventNotifier`], which observes
//! `storage` events for the session record key and synthesises events from
//! the new value.

use crate::error::{WasmError, WasmResult};
use bridge_traits::notify::{
    synthesize_from_change, CrossContextNotifier, EventCallback, NotifierTransport, SessionEvent,
    StoredValueDecoder, Subscription,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{BroadcastChannel, MessageEvent, StorageEvent};

/// Message posted on the channel: the event plus the posting instance.
#[derive(Serialize, Deserialize)]
struct ChannelMessage {
    #[serde(flatten)]
    event: SessionEvent,
    #[serde(rename = "senderId", default, skip_serializing_if = "Option::is_none")]
    sender_id: Option<String>,
}

fn message_text(data: &JsValue) -> Option<String> {
    if let Some(text) = data.as_string() {
        return Some(text);
    }
    js_sys::JSON::stringify(data)
        .ok()
        .and_then(|text| text.as_string())
}

/// Notifier over a named `BroadcastChannel`.
///
/// Messages are JSON `SessionEvent`s with an extra `senderId`; messages
/// without one (posted by other clients of the channel) are accepted too.
pub struct BroadcastChannelNotifier {
    channel: BroadcastChannel,
    name: String,
    instance_id: String,
}

impl BroadcastChannelNotifier {
    /// Open the channel `name`.
    ///
    /// Fails with [`WasmError::NotAvailable`] when the browser has no
    /// `BroadcastChannel`.
    pub fn new(name: impl Into<String>) -> WasmResult<Self> {
        let name = name.into();
        let channel = BroadcastChannel::new(&name)
            .map_err(|err| WasmError::NotAvailable(format!("BroadcastChannel: {:?}", err)))?;

        Ok(Self {
            channel,
            name,
            instance_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Channel name shared by the tabs.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CrossContextNotifier for BroadcastChannelNotifier {
    fn publish(&self, event: &SessionEvent) {
        let message = ChannelMessage {
            event: event.clone(),
            sender_id: Some(self.instance_id.clone()),
        };

        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode session event");
                return;
            }
        };

        match self.channel.post_message(&JsValue::from_str(&text)) {
            Ok(()) => trace!(channel = %self.name, event = event.kind(), "Posted session event"),
            Err(err) => warn!(
                channel = %self.name,
                error = %WasmError::from(err),
                "Failed to post session event"
            ),
        }
    }

    fn subscribe(&self, callback: EventCallback) -> Subscription {
        let own = self.instance_id.clone();
        let channel_name = self.name.clone();

        let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |message: MessageEvent| {
            let Some(text) = message_text(&message.data()) else {
                return;
            };

            match serde_json::from_str::<ChannelMessage>(&text) {
                Ok(ChannelMessage { sender_id, .. }) if sender_id.as_deref() == Some(own.as_str()) => {}
                Ok(ChannelMessage { event, .. }) => {
                    debug!(channel = %channel_name, event = event.kind(), "Received session event");
                    callback(event);
                }
                Err(e) => debug!(channel = %channel_name, error = %e, "Ignoring foreign message"),
            }
        });

        if let Err(err) = self
            .channel
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
        {
            warn!(error = %WasmError::from(err), "Failed to listen on BroadcastChannel");
            return Subscription::inert();
        }

        let channel = self.channel.clone();
        Subscription::new(Box::new(move || {
            let _ = channel
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
            drop(listener);
        }))
    }

    fn transport(&self) -> NotifierTransport {
        NotifierTransport::BroadcastChannel
    }
}

impl Drop for BroadcastChannelNotifier {
    fn drop(&mut self) {
        self.channel.close();
    }
}

/// Fallback notifier driven by `storage` events.
///
/// Browsers fire `storage` only in the other tabs, so publishing is a no-op:
/// the write to `localStorage` is the signal.
pub struct StorageEventNotifier {
    window: web_sys::Window,
    record_key: String,
    decoder: StoredValueDecoder,
}

impl StorageEventNotifier {
    /// Watch `record_key`, decoding new values with `decoder`.
    pub fn new(record_key: impl Into<String>, decoder: StoredValueDecoder) -> WasmResult<Self> {
        let window =
            web_sys::window().ok_or_else(|| WasmError::NotAvailable("window".to_string()))?;

        Ok(Self {
            window,
            record_key: record_key.into(),
            decoder,
        })
    }
}

impl CrossContextNotifier for StorageEventNotifier {
    fn publish(&self, event: &SessionEvent) {
        trace!(
            event = event.kind(),
            key = %self.record_key,
            "Storage write carries the event"
        );
    }

    fn subscribe(&self, callback: EventCallback) -> Subscription {
        let record_key = self.record_key.clone();
        let decoder = self.decoder.clone();

        let listener = Closure::<dyn FnMut(StorageEvent)>::new(move |change: StorageEvent| {
            // `key` is null when the whole storage area was cleared
            let new_value = match change.key() {
                Some(key) if key == record_key => change.new_value(),
                Some(_) => return,
                None => None,
            };

            match synthesize_from_change(new_value.as_deref(), &decoder) {
                Some(event) => {
                    debug!(key = %record_key, event = event.kind(), "Synthesised session event");
                    callback(event);
                }
                None => warn!(key = %record_key, "Ignoring undecodable record change"),
            }
        });

        if let Err(err) = self
            .window
            .add_event_listener_with_callback("storage", listener.as_ref().unchecked_ref())
        {
            warn!(error = %WasmError::from(err), "Failed to listen for storage events");
            return Subscription::inert();
        }

        let window = self.window.clone();
        Subscription::new(Box::new(move || {
            let _ = window
                .remove_event_listener_with_callback("storage", listener.as_ref().unchecked_ref());
            drop(listener);
        }))
    }

    fn transport(&self) -> NotifierTransport {
        NotifierTransport::StorageEvents
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::StreamExt;
    use std::sync::Arc;
    use wasm_bindgen_test::*;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    fn channel_name() -> String {
        format!("session-test-{}", js_sys::Date::now())
    }

    #[wasm_bindgen_test]
    async fn broadcast_reaches_other_instances_only() {
        let name = channel_name();
        let tab_a = BroadcastChannelNotifier::new(&name).expect("channel a");
        let tab_b = BroadcastChannelNotifier::new(&name).expect("channel b");

        let (tx_a, mut rx_a) = mpsc::unbounded();
        let _sub_a = tab_a.subscribe(Arc::new(move |event| {
            let _ = tx_a.unbounded_send(event);
        }));
        let (tx_b, mut rx_b) = mpsc::unbounded();
        let _sub_b = tab_b.subscribe(Arc::new(move |event| {
            let _ = tx_b.unbounded_send(event);
        }));

        tab_a.publish(&SessionEvent::Logout);

        assert_eq!(rx_b.next().await, Some(SessionEvent::Logout));
        assert!(rx_a.try_next().is_err());
    }

    #[wasm_bindgen_test]
    fn plain_events_are_accepted() {
        let message: ChannelMessage =
            serde_json::from_str(r#"{"type":"TOKEN_UPDATED","token":"t","timestamp":1}"#)
                .expect("plain event");
        assert_eq!(message.sender_id, None);
        assert_eq!(message.event.kind(), "TOKEN_UPDATED");
    }

    #[wasm_bindgen_test]
    fn transports_are_reported() {
        let decoder: StoredValueDecoder = Arc::new(|_: &str| None);
        let storage = StorageEventNotifier::new("ns:session", decoder).expect("window");
        assert_eq!(storage.transport(), NotifierTransport::StorageEvents);

        let channel = BroadcastChannelNotifier::new(channel_name()).expect("channel");
        assert_eq!(channel.transport(), NotifierTransport::BroadcastChannel);
    }
}
