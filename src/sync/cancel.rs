use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::AbortHandle;

/// Anything that can be asked to stop.
pub trait Cancellable: Send + Sync {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

/// Explicit, checked cancellation state.
///
/// Clones share the same flag. Consumers either poll [`CancelToken::is_cancelled`]
/// at their resumption points or await [`CancelToken::cancelled`].
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token has been cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Cancellable for CancelToken {
    fn cancel(&self) {
        CancelToken::cancel(self);
    }

    fn is_cancelled(&self) -> bool {
        CancelToken::is_cancelled(self)
    }
}

/// A spawned tokio task paired with a token the task body can observe.
struct SpawnedTask {
    abort: AbortHandle,
    token: CancelToken,
}

impl Cancellable for SpawnedTask {
    fn cancel(&self) {
        self.token.cancel();
        self.abort.abort();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.abort.is_finished()
    }
}

/// Scoped registry of cancellable background work keyed by identifier.
///
/// Storing under an identifier already in use cancels the previous entry
/// first. Dropping the bag cancels everything it still holds.
#[derive(Default)]
pub struct CancelBag {
    tasks: Mutex<HashMap<String, Box<dyn Cancellable>>>,
    next_anonymous: AtomicU64,
}

impl std::fmt::Debug for CancelBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelBag")
            .field("tasks", &self.len())
            .finish_non_exhaustive()
    }
}

impl CancelBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task`, returning the identifier it was stored under.
    pub fn store<C>(&self, task: C, id: Option<&str>) -> String
    where
        C: Cancellable + 'static,
    {
        let key = match id {
            Some(id) => id.to_string(),
            None => format!(
                "anonymous-{}",
                self.next_anonymous.fetch_add(1, Ordering::Relaxed)
            ),
        };
        let previous = self.lock().insert(key.clone(), Box::new(task));
        if let Some(previous) = previous {
            previous.cancel();
        }
        key
    }

    /// Spawn `future` on the ambient tokio runtime and register it.
    ///
    /// The future receives a [`CancelToken`] that flips when the task is
    /// cancelled through the bag. Returns `None` when called outside a runtime.
    pub fn spawn<F, Fut>(&self, id: Option<&str>, make: F) -> Option<String>
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::try_current().ok()?;
        let token = CancelToken::new();
        let join = handle.spawn(make(token.clone()));
        Some(self.store(
            SpawnedTask {
                abort: join.abort_handle(),
                token,
            },
            id,
        ))
    }

    /// Cancel and forget a single entry. Returns whether it existed.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every entry that is still live and clear the registry.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.lock().drain().map(|(_, task)| task).collect();
        for task in drained {
            if !task.is_cancelled() {
                task.cancel();
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of entries that are neither cancelled nor finished.
    pub fn live_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|task| !task.is_cancelled())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Box<dyn Cancellable>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CancelBag {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
