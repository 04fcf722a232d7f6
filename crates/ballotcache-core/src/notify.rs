//! Change notifications between storage writers and readers.
//!
//! Writers publish a [`StorageEvent`] naming the key that changed; readers
//! subscribe and reload when a key they care about shows up. This stands in
//! for the cross-tab storage event of a browser.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Buffered events per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// A key that changed and its new raw value, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
}

impl StorageEvent {
    pub fn new(key: impl Into<String>, new_value: Option<String>) -> Self {
        Self {
            key: key.into(),
            new_value,
        }
    }
}

/// Publish/subscribe channel for storage changes.
pub trait Notifier: Send + Sync {
    /// Deliver an event to every current subscriber.
    fn publish(&self, event: StorageEvent);

    /// Receive every event published from now on.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

pub type NotifierRef = Arc<dyn Notifier>;

/// In-process notifier on a tokio broadcast channel.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<StorageEvent>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, event: StorageEvent) {
        // An error only means nobody is listening right now.
        match self.tx.send(event) {
            Ok(receivers) => debug!(receivers, "Storage event published"),
            Err(broadcast::error::SendError(event)) => {
                debug!(key = %event.key, "Storage event published with no subscribers")
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.tx.subscribe()
    }
}

/// A subscription narrowed to a fixed set of keys.
pub struct KeySubscription {
    rx: broadcast::Receiver<StorageEvent>,
    keys: Vec<String>,
}

impl KeySubscription {
    pub fn new(notifier: &dyn Notifier, keys: &[&str]) -> Self {
        Self {
            rx: notifier.subscribe(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Wait for the next event on one of the watched keys.
    /// Returns `None` once the notifier is gone.
    pub async fn next(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.keys.iter().any(|k| *k == event.key) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed events still mean "something changed"; report one.
                    warn!(skipped, "Storage subscriber lagged");
                    let key = self.keys.first().cloned().unwrap_or_default();
                    return Some(StorageEvent::new(key, None));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Run `handler` for every event on `keys` until the notifier closes.
pub fn on_keys<F, Fut>(notifier: &dyn Notifier, keys: &[&str], mut handler: F) -> JoinHandle<()>
where
    F: FnMut(StorageEvent) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut subscription = KeySubscription::new(notifier, keys);
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            handler(event).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_subscription_filters_by_key() {
        let notifier = BroadcastNotifier::new();
        let mut sub = KeySubscription::new(&notifier, &["wanted"]);

        notifier.publish(StorageEvent::new("other", None));
        notifier.publish(StorageEvent::new("wanted", Some("v".to_string())));

        let event = sub.next().await.unwrap();
        assert_eq!(event.key, "wanted");
        assert_eq!(event.new_value.as_deref(), Some("v"));
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let notifier = BroadcastNotifier::new();
        notifier.publish(StorageEvent::new("nobody", None));
    }

    #[tokio::test]
    async fn test_on_keys_invokes_handler() {
        let notifier = BroadcastNotifier::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = on_keys(&notifier, &["a", "b"], move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.key);
            }
        });

        notifier.publish(StorageEvent::new("a", None));
        notifier.publish(StorageEvent::new("c", None));
        notifier.publish(StorageEvent::new("b", None));

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(first.as_deref(), Some("a"));
        assert_eq!(second.as_deref(), Some("b"));

        handle.abort();
    }
}
