use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

use super::cancel::CancelToken;

struct Shared<T> {
    subscribers: HashMap<u64, mpsc::UnboundedSender<T>>,
    next_id: u64,
    current: Option<T>,
    retain: bool,
    finished: bool,
}

/// Multi-subscriber value stream.
///
/// Every subscriber receives each value sent after it subscribed. A retaining
/// stream (built with [`BroadcastValue::with_value`] or [`BroadcastValue::retained`])
/// also remembers the last value and replays it to new subscribers.
/// [`BroadcastValue::finish`] is the only teardown path: it ends every
/// subscription and rejects further sends.
pub struct BroadcastValue<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for BroadcastValue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for BroadcastValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = lock(&self.shared);
        f.debug_struct("BroadcastValue")
            .field("subscribers", &shared.subscribers.len())
            .field("retain", &shared.retain)
            .field("finished", &shared.finished)
            .finish()
    }
}

impl<T> Default for BroadcastValue<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(shared: &Mutex<Shared<T>>) -> MutexGuard<'_, Shared<T>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> BroadcastValue<T> {
    /// Terminate every subscription and clear subscriber storage.
    ///
    /// Safe to call repeatedly and from `Drop` implementations.
    pub fn finish(&self) {
        let mut shared = lock(&self.shared);
        shared.finished = true;
        shared.subscribers.clear();
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.shared).finished
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared).subscribers.len()
    }
}

impl<T> BroadcastValue<T>
where
    T: Clone + Send + 'static,
{
    /// Event stream without a retained value.
    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// State-carrying stream with no value yet.
    pub fn retained() -> Self {
        Self::build(None, true)
    }

    /// State-carrying stream seeded with `initial`.
    pub fn with_value(initial: T) -> Self {
        Self::build(Some(initial), true)
    }

    fn build(current: Option<T>, retain: bool) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                subscribers: HashMap::new(),
                next_id: 0,
                current,
                retain,
                finished: false,
            })),
        }
    }

    /// Deliver `value` to every live subscriber. Ignored once finished.
    pub fn send(&self, value: T) {
        let mut shared = lock(&self.shared);
        if shared.finished {
            return;
        }
        shared
            .subscribers
            .retain(|_, sender| sender.send(value.clone()).is_ok());
        if shared.retain {
            shared.current = Some(value);
        }
    }

    /// Replace the retained value through `update` and broadcast the result.
    ///
    /// The read-modify-send happens under one lock, so concurrent updates never
    /// interleave. Returns the broadcast value, or `None` when finished or when
    /// the stream holds no value yet.
    pub fn update<F>(&self, update: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        self.update_if(|value| {
            update(value);
            true
        })
    }

    /// Like [`BroadcastValue::update`], but only stores and broadcasts when
    /// `update` returns `true`.
    pub fn update_if<F>(&self, update: F) -> Option<T>
    where
        F: FnOnce(&mut T) -> bool,
    {
        let mut shared = lock(&self.shared);
        if shared.finished {
            return None;
        }
        let mut next = shared.current.clone()?;
        if !update(&mut next) {
            return None;
        }
        shared
            .subscribers
            .retain(|_, sender| sender.send(next.clone()).is_ok());
        shared.current = Some(next.clone());
        Some(next)
    }

    /// The last value sent on a retaining stream.
    pub fn current(&self) -> Option<T> {
        lock(&self.shared).current.clone()
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut shared = lock(&self.shared);
        let id = shared.next_id;
        shared.next_id += 1;

        if !shared.finished {
            if shared.retain {
                if let Some(current) = shared.current.clone() {
                    let _ = sender.send(current);
                }
            }
            shared.subscribers.insert(id, sender);
        }

        Subscription {
            id,
            receiver,
            shared: Arc::downgrade(&self.shared),
        }
    }
}

/// Receiving half of a [`BroadcastValue`]. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: u64,
    receiver: mpsc::UnboundedReceiver<T>,
    shared: Weak<Mutex<Shared<T>>>,
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<T> Subscription<T> {
    /// Next value, or `None` once the stream is finished and drained.
    pub async fn next(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Like [`Subscription::next`], but returns `None` as soon as `token` is
    /// cancelled instead of waiting for another value.
    pub async fn next_or_cancelled(&mut self, token: &CancelToken) -> Option<T> {
        if token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            value = self.receiver.recv() => value,
        }
    }

    /// Non-blocking read of an already-delivered value.
    pub fn try_next(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Every value delivered so far without waiting.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Ok(value) = self.receiver.try_recv() {
            values.push(value);
        }
        values
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared).subscribers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_value() {
        let stream = BroadcastValue::new();
        let mut a = stream.subscribe();
        let mut b = stream.subscribe();
        stream.send(1);
        stream.send(2);
        assert_eq!(a.drain(), vec![1, 2]);
        assert_eq!(b.drain(), vec![1, 2]);
    }

    #[test]
    fn retained_value_is_replayed_on_subscribe() {
        let stream = BroadcastValue::with_value("idle");
        stream.send("armed");
        let mut late = stream.subscribe();
        assert_eq!(late.drain(), vec!["armed"]);
        assert_eq!(stream.current(), Some("armed"));
    }

    #[test]
    fn event_stream_does_not_replay() {
        let stream = BroadcastValue::new();
        stream.send(7);
        let mut late = stream.subscribe();
        assert!(late.try_next().is_none());
        assert_eq!(stream.current(), None);
    }

    #[test]
    fn update_applies_under_lock_and_broadcasts() {
        let stream = BroadcastValue::with_value(1u32);
        let mut sub = stream.subscribe();
        assert_eq!(stream.update(|value| *value += 1), Some(2));
        assert_eq!(sub.drain(), vec![1, 2]);
        assert_eq!(BroadcastValue::<u32>::new().update(|v| *v += 1), None);
        assert_eq!(stream.update_if(|_| false), None);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn dropped_subscription_unregisters() {
        let stream = BroadcastValue::<u8>::new();
        let sub = stream.subscribe();
        assert_eq!(stream.subscriber_count(), 1);
        drop(sub);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn finish_terminates_subscribers() {
        let stream = BroadcastValue::new();
        let mut sub = stream.subscribe();
        stream.send(5);
        stream.finish();
        stream.send(6);

        assert_eq!(sub.next().await, Some(5));
        assert_eq!(sub.next().await, None);
        assert_eq!(stream.subscriber_count(), 0);

        let mut after = stream.subscribe();
        assert_eq!(after.next().await, None);
    }

    #[tokio::test]
    async fn cancelled_consumer_stops_without_value() {
        let stream = BroadcastValue::<u8>::new();
        let mut sub = stream.subscribe();
        let token = CancelToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { sub.next_or_cancelled(&waiter).await });
        tokio::task::yield_now().await;
        token.cancel();
        assert_eq!(task.await.unwrap(), None);
    }
}
