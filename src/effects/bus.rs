//! Fan-out of completed transitions to subscribers.

use crate::core::{EntityKind, HistoryEntry, Metadata, StatusValue};
use crate::enforcement::pipeline::panic_message;
use crate::rules::HandlerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Published after a transition completes successfully.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub transition_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub previous_status: StatusValue,
    pub new_status: StatusValue,
    pub metadata: Metadata,
}

impl From<HistoryEntry> for ChangeEvent {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            transition_id: entry.transition_id,
            timestamp: entry.timestamp,
            entity_kind: entry.entity_kind,
            entity_id: entry.entity_id,
            previous_status: entry.from,
            new_status: entry.to,
            metadata: entry.metadata,
        }
    }
}

/// Receives change events. Errors and panics are logged and contained.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn on_event(&self, event: &ChangeEvent) -> Result<(), HandlerError>;
}

struct FnSubscriber<F>(F);

#[async_trait]
impl<F, Fut> Subscriber for FnSubscriber<F>
where
    F: Fn(ChangeEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn on_event(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        (self.0)(event.clone()).await
    }
}

/// Wrap an async closure as a [`Subscriber`].
pub fn subscriber_fn<F, Fut>(f: F) -> Arc<dyn Subscriber>
where
    F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnSubscriber(f))
}

/// Handle identifying one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    entries: RwLock<Vec<Arc<Entry>>>,
    next_id: AtomicU64,
}

impl Subscribers {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }
}

/// One event queued for one subscriber.
struct Delivery {
    event: Arc<ChangeEvent>,
    done: oneshot::Sender<()>,
}

/// A subscriber and the queue feeding its delivery worker.
///
/// The worker is started on the first publish that finds a runtime, and
/// exits once the entry (and with it the sender) is dropped.
struct Entry {
    id: SubscriptionId,
    subscriber: Arc<dyn Subscriber>,
    queue: Mutex<Option<UnboundedSender<Delivery>>>,
}

impl Entry {
    fn new(id: SubscriptionId, subscriber: Arc<dyn Subscriber>) -> Self {
        Self {
            id,
            subscriber,
            queue: Mutex::new(None),
        }
    }

    /// Queue `delivery` behind everything already sent to this subscriber.
    fn enqueue(&self, runtime: &Handle, delivery: Delivery) -> bool {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);

        // A closed queue means the worker's runtime is gone; start a new one.
        let delivery = match queue.as_ref() {
            Some(sender) => match sender.send(delivery) {
                Ok(()) => return true,
                Err(SendError(delivery)) => delivery,
            },
            None => delivery,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        runtime.spawn(drain(self.id, Arc::clone(&self.subscriber), receiver));
        let sent = sender.send(delivery).is_ok();
        *queue = Some(sender);
        sent
    }
}

/// Returned by [`NotificationBus::subscribe`]; removes the subscriber when
/// [`unsubscribe`](Subscription::unsubscribe) is called.
///
/// Dropping the handle without calling `unsubscribe` keeps the
/// subscription alive for the life of the bus.
pub struct Subscription {
    id: SubscriptionId,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop delivering events to this subscriber.
    ///
    /// Returns `false` if it was already removed or the bus is gone.
    /// Events queued before this call are still delivered.
    pub fn unsubscribe(self) -> bool {
        self.subscribers
            .upgrade()
            .is_some_and(|subscribers| subscribers.remove(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Deliveries queued by one [`NotificationBus::publish`] call.
#[must_use = "deliveries run in the background; await `settled` to wait for them"]
pub struct PublishReceipt {
    pending: Vec<oneshot::Receiver<()>>,
}

impl PublishReceipt {
    fn empty() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Number of subscribers the event was queued for.
    pub fn dispatched(&self) -> usize {
        self.pending.len()
    }

    /// Wait until every delivery has finished, successfully or not.
    pub async fn settled(self) {
        for done in self.pending {
            let _ = done.await;
        }
    }
}

/// Publish/subscribe fan-out of [`ChangeEvent`]s.
///
/// Every subscriber has its own FIFO queue drained by a dedicated task.
/// A subscriber sees events in the order they were published, and a slow,
/// failing or panicking subscriber never delays or affects the others,
/// nor the transition that produced the event.
#[derive(Default)]
pub struct NotificationBus {
    subscribers: Arc<Subscribers>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> Subscription {
        let id = SubscriptionId(self.subscribers.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(Entry::new(id, subscriber)));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Queue `event` for every current subscriber.
    ///
    /// Must be called from within a Tokio runtime; otherwise the event is
    /// dropped with a warning.
    pub fn publish(&self, event: ChangeEvent) -> PublishReceipt {
        let snapshot: Vec<Arc<Entry>> = self
            .subscribers
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if snapshot.is_empty() {
            return PublishReceipt::empty();
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(
                transition_id = %event.transition_id,
                "no async runtime available, change event dropped"
            );
            return PublishReceipt::empty();
        };

        let event = Arc::new(event);
        let pending = snapshot
            .iter()
            .filter_map(|entry| {
                let (done, settled) = oneshot::channel();
                let delivery = Delivery {
                    event: Arc::clone(&event),
                    done,
                };
                entry.enqueue(&runtime, delivery).then_some(settled)
            })
            .collect();

        PublishReceipt { pending }
    }
}

async fn drain(
    id: SubscriptionId,
    subscriber: Arc<dyn Subscriber>,
    mut queue: UnboundedReceiver<Delivery>,
) {
    while let Some(Delivery { event, done }) = queue.recv().await {
        deliver(id, subscriber.as_ref(), &event).await;
        let _ = done.send(());
    }
}

async fn deliver(id: SubscriptionId, subscriber: &dyn Subscriber, event: &ChangeEvent) {
    let outcome = AssertUnwindSafe(subscriber.on_event(event))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(
            subscription = id.0,
            kind = %event.entity_kind,
            entity_id = %event.entity_id,
            error = %e,
            "subscriber failed to handle change event"
        ),
        Err(panic) => tracing::warn!(
            subscription = id.0,
            kind = %event.entity_kind,
            entity_id = %event.entity_id,
            panic = %panic_message(panic.as_ref()),
            "subscriber panicked while handling change event"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransitionContext;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn event(id: &str) -> ChangeEvent {
        let ctx = TransitionContext::new(EntityKind::Task, id, "TODO", "DOING");
        HistoryEntry::from_context(Uuid::new_v4(), &ctx).into()
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn Subscriber>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let subscriber = subscriber_fn(move |_event| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (count, subscriber)
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let bus = NotificationBus::new();
        let (first, a) = counter();
        let (second, b) = counter();
        let _sa = bus.subscribe(a);
        let _sb = bus.subscribe(b);

        let receipt = bus.publish(event("t1"));
        assert_eq!(receipt.dispatched(), 2);
        receipt.settled().await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribed_callback_receives_nothing() {
        let bus = NotificationBus::new();
        let (count, subscriber) = counter();
        let subscription = bus.subscribe(subscriber);

        bus.publish(event("t1")).settled().await;
        assert!(subscription.unsubscribe());
        bus.publish(event("t1")).settled().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_twice_reports_false() {
        let bus = NotificationBus::new();
        let (_count, subscriber) = counter();
        let subscription = bus.subscribe(subscriber);
        let id = subscription.id();

        assert!(bus.unsubscribe(id));
        assert!(!subscription.unsubscribe());
    }

    #[tokio::test]
    async fn failing_subscribers_are_isolated() {
        let bus = NotificationBus::new();
        let _failing = bus.subscribe(subscriber_fn(|_| async {
            Err::<(), HandlerError>("metrics sink down".into())
        }));
        let _panicking = bus.subscribe(subscriber_fn(|_| async {
            if true {
                panic!("subscriber bug");
            }
            Ok(())
        }));
        let (count, healthy) = counter();
        let _healthy = bus.subscribe(healthy);

        bus.publish(event("t1")).settled().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_delay_others() {
        let bus = NotificationBus::new();
        let _slow = bus.subscribe(subscriber_fn(|_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _fast = bus.subscribe(subscriber_fn(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.entity_id);
                Ok(())
            }
        }));

        let _receipt = bus.publish(event("t7"));

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("fast subscriber should not wait on the slow one");
        assert_eq!(received.as_deref(), Some("t7"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn each_subscriber_sees_publish_order() {
        let bus = NotificationBus::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _s = bus.subscribe(subscriber_fn(move |event| {
            let sink = Arc::clone(&sink);
            async move {
                if event.entity_id.ends_with('0') {
                    tokio::task::yield_now().await;
                }
                sink.lock().unwrap().push(event.entity_id);
                Ok(())
            }
        }));

        let mut last = None;
        for n in 0..500 {
            last = Some(bus.publish(event(&n.to_string())));
        }
        last.unwrap().settled().await;

        let expected: Vec<String> = (0..500).map(|n| n.to_string()).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn worker_restarts_on_a_new_runtime() {
        let bus = NotificationBus::new();
        let (count, subscriber) = counter();
        let _s = bus.subscribe(subscriber);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap()
                    .block_on(async { bus.publish(event("t1")).settled().await });
            });
        });
        bus.publish(event("t1")).settled().await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = NotificationBus::new();
        let receipt = bus.publish(event("t1"));
        assert_eq!(receipt.dispatched(), 0);
    }

    #[test]
    fn publish_outside_runtime_drops_event() {
        let bus = NotificationBus::new();
        let (count, subscriber) = counter();
        let _s = bus.subscribe(subscriber);

        let receipt = bus.publish(event("t1"));

        assert_eq!(receipt.dispatched(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
