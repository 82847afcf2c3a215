use crate::ChangeEvent;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

/// Receives every event published after it subscribed, in publish order.
///
/// Observers run on the bus's consumer task, one at a time; a slow observer
/// delays every event behind it. A panic inside `on_change` is caught and
/// logged.
pub trait Observer: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}
impl<F> Observer for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Observers are identified by pointer, so keep hold of the handle that was
/// subscribed in order to unsubscribe it.
pub type ObserverHandle = Arc<dyn Observer>;

enum Message {
    Event(ChangeEvent),
    /// Answered once every message queued before it has been delivered.
    Barrier(oneshot::Sender<()>),
}

/// Handle to the change bus. Cloning is cheap; all clones share one queue and
/// one set of observers, and the consumer task stops once every clone has
/// been dropped.
#[derive(Clone)]
pub struct ChangeBus {
    tx: mpsc::UnboundedSender<Message>,
    observers: Arc<RwLock<Vec<ObserverHandle>>>,
}
impl ChangeBus {
    /// Start the consumer task on the current Tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let observers = Arc::new(RwLock::new(Vec::new()));
        tokio::spawn(Self::run(rx, Arc::clone(&observers)));
        Self { tx, observers }
    }

    async fn run(mut rx: mpsc::UnboundedReceiver<Message>, observers: Arc<RwLock<Vec<ObserverHandle>>>) {
        tracing::debug!("change bus started");
        while let Some(message) = rx.recv().await {
            match message {
                Message::Event(event) => {
                    // Snapshot so observers may (un)subscribe from inside a callback.
                    let current = observers.read().unwrap_or_else(PoisonError::into_inner).clone();
                    tracing::trace!(kind = %event.kind, stories = event.stories.len(), observers = current.len(), "delivering change event");
                    for observer in current {
                        // Only the panicking observer misses this event.
                        if panic::catch_unwind(AssertUnwindSafe(|| observer.on_change(&event))).is_err() {
                            tracing::error!(kind = %event.kind, "change observer panicked");
                        }
                    }
                },
                Message::Barrier(done) => {
                    _ = done.send(());
                },
            }
        }
        tracing::debug!("change bus stopped");
    }

    /// Queue an event for delivery. Never blocks.
    #[instrument(level = "trace", skip(self, event), fields(kind = %event.kind))]
    pub fn publish(&self, event: ChangeEvent) {
        if self.tx.send(Message::Event(event)).is_err() {
            tracing::warn!("change bus consumer has stopped, event dropped");
        }
    }

    /// Returns `false` if the observer was already subscribed.
    pub fn subscribe(&self, observer: ObserverHandle) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        if observers.iter().any(|existing| Arc::ptr_eq(existing, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Returns `false` if the observer was not subscribed.
    pub fn unsubscribe(&self, observer: &ObserverHandle) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|existing| !Arc::ptr_eq(existing, observer));
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Wait until every event published before this call has been handed to
    /// the observers.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Message::Barrier(done)).is_ok() {
            _ = wait.await;
        }
    }
}
impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus").field("observers", &self.observer_count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeKind;
    use fray_extract::StoryPage;
    use fray_extract::fixtures::StoryPageFixture;
    use fray_extract::models::{StoryId, StoryModel};
    use std::sync::Mutex;

    fn story(id: u64) -> StoryModel {
        match fray_extract::parse_story_page(&StoryPageFixture::new(id, 2).html()).unwrap() {
            StoryPage::Found(page) => page.model,
            StoryPage::NotFound => unreachable!(),
        }
    }

    fn recorder() -> (ObserverHandle, Arc<Mutex<Vec<(ChangeKind, StoryId)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: ObserverHandle = Arc::new(move |event: &ChangeEvent| {
            let mut sink = sink.lock().unwrap();
            sink.extend(event.ids().map(|id| (event.kind, id)));
        });
        (observer, seen)
    }

    #[tokio::test]
    async fn test_delivery_in_publish_order() {
        let bus = ChangeBus::spawn();
        let (observer, seen) = recorder();
        assert!(bus.subscribe(observer));

        let producers = (0..4u64)
            .map(|n| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    bus.publish(ChangeEvent::created(story(n)));
                    bus.publish(ChangeEvent::changed(story(n)));
                    bus.publish(ChangeEvent::removed(story(n)));
                })
            })
            .collect::<Vec<_>>();
        for producer in producers {
            producer.await.unwrap();
        }
        bus.flush().await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 12);
        // Per story, the three events arrive in the order they were published.
        for n in 0..4u64 {
            let kinds = seen.iter().filter(|(_, id)| *id == StoryId(n)).map(|(kind, _)| *kind).collect::<Vec<_>>();
            assert_eq!(kinds, vec![ChangeKind::New, ChangeKind::Changed, ChangeKind::Removed]);
        }
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let bus = ChangeBus::spawn();
        let (observer, seen) = recorder();
        assert!(bus.subscribe(Arc::clone(&observer)));
        assert!(!bus.subscribe(Arc::clone(&observer)));
        assert_eq!(bus.observer_count(), 1);

        bus.publish(ChangeEvent::changed(story(1)));
        bus.flush().await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = ChangeBus::spawn();
        let (observer, seen) = recorder();
        bus.subscribe(Arc::clone(&observer));
        bus.publish(ChangeEvent::changed(story(1)));
        bus.flush().await;

        assert!(bus.unsubscribe(&observer));
        assert!(!bus.unsubscribe(&observer));
        bus.publish(ChangeEvent::changed(story(2)));
        bus.flush().await;

        assert_eq!(*seen.lock().unwrap(), vec![(ChangeKind::Changed, StoryId(1))]);
    }

    #[tokio::test]
    async fn test_every_observer_sees_an_event_before_the_next() {
        let bus = ChangeBus::spawn();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second"] {
            let log = Arc::clone(&log);
            bus.subscribe(Arc::new(move |event: &ChangeEvent| {
                log.lock().unwrap().push(format!("{name}:{}", event.stories[0].id));
            }));
        }
        bus.publish(ChangeEvent::changed(story(1)));
        bus.publish(ChangeEvent::changed(story(2)));
        bus.flush().await;
        assert_eq!(*log.lock().unwrap(), vec!["first:1", "second:1", "first:2", "second:2"]);
    }

    #[tokio::test]
    async fn test_panicking_observer_does_not_stop_delivery() {
        let bus = ChangeBus::spawn();
        bus.subscribe(Arc::new(|event: &ChangeEvent| {
            if event.stories[0].id == StoryId(1) {
                panic!("observer failed on story 1");
            }
        }));
        let (observer, seen) = recorder();
        bus.subscribe(observer);

        bus.publish(ChangeEvent::changed(story(1)));
        bus.publish(ChangeEvent::changed(story(2)));
        bus.flush().await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(ChangeKind::Changed, StoryId(1)), (ChangeKind::Changed, StoryId(2))]
        );
    }
}
