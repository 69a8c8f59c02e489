use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;

use crate::config::NavigatorConfig;
use crate::logging::{LogLevel, TARGET_NAVIGATION, emit, json_kv};
use crate::route::Route;
use crate::sync::{BroadcastValue, Subscription};

use super::codec::{PathCodec, PathEntry};

/// Renderer-owned stack representation.
///
/// The engine only appends, removes from the end, asks for the length and
/// reads the encoded representation back.
pub trait PhysicalPath: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&mut self, entry: PathEntry);

    /// Remove up to `count` entries from the end in one operation.
    fn remove_last(&mut self, count: usize);

    /// Encoded fragments, decodable with [`PathCodec::decode`].
    fn representation(&self) -> Vec<String>;
}

/// Default in-memory [`PhysicalPath`] using [`PathCodec`] for its representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedPath {
    entries: Vec<PathEntry>,
}

impl EncodedPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }
}

impl PhysicalPath for EncodedPath {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn append(&mut self, entry: PathEntry) {
        self.entries.push(entry);
    }

    fn remove_last(&mut self, count: usize) {
        let keep = self.entries.len().saturating_sub(count);
        self.entries.truncate(keep);
    }

    fn representation(&self) -> Vec<String> {
        PathCodec::encode(&self.entries)
    }
}

struct PathState {
    logical: Vec<String>,
    physical: Box<dyn PhysicalPath>,
    did_appear: bool,
    pending: Vec<PathEntry>,
}

struct PathInner {
    name: String,
    state: Mutex<PathState>,
    changes: BroadcastValue<Vec<String>>,
    config: NavigatorConfig,
}

impl Drop for PathInner {
    fn drop(&mut self) {
        self.changes.finish();
    }
}

/// Logical stack of route paths for one navigation surface, kept in step with
/// the renderer's physical stack.
///
/// Clones share the same stack. After every operation the logical stack has
/// exactly as many entries as the physical one.
#[derive(Clone)]
pub struct NavigationPath {
    inner: Arc<PathInner>,
}

impl std::fmt::Debug for NavigationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("NavigationPath")
            .field("name", &self.inner.name)
            .field("logical", &state.logical)
            .field("did_appear", &state.did_appear)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl NavigationPath {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_physical(name, EncodedPath::new(), &NavigatorConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: &NavigatorConfig) -> Self {
        Self::with_physical(name, EncodedPath::new(), config)
    }

    pub fn with_physical<P>(name: impl Into<String>, physical: P, config: &NavigatorConfig) -> Self
    where
        P: PhysicalPath + 'static,
    {
        let mut physical: Box<dyn PhysicalPath> = Box::new(physical);
        let logical = PathCodec::decode(&physical.representation());
        align_physical(physical.as_mut(), logical.len());
        Self {
            inner: Arc::new(PathInner {
                name: name.into(),
                changes: BroadcastValue::with_value(logical.clone()),
                state: Mutex::new(PathState {
                    logical,
                    physical,
                    did_appear: false,
                    pending: Vec::new(),
                }),
                config: config.clone(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Route paths currently on the stack, root-first.
    pub fn logical_stack(&self) -> Vec<String> {
        self.lock().logical.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().logical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().logical.is_empty()
    }

    pub fn last(&self) -> Option<String> {
        self.lock().logical.last().cloned()
    }

    pub fn has_appeared(&self) -> bool {
        self.lock().did_appear
    }

    /// Pushes issued before the surface mounted, waiting for [`NavigationPath::did_appear`].
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Logical stack after each change, starting with the current one.
    pub fn stack_changes(&self) -> Subscription<Vec<String>> {
        self.inner.changes.subscribe()
    }

    /// Called by the renderer once the hosting surface has mounted. Applies any
    /// deferred pushes in order. Later calls are no-ops.
    pub fn did_appear(&self) {
        let mut state = self.lock();
        if state.did_appear {
            return;
        }
        state.did_appear = true;
        let pending = std::mem::take(&mut state.pending);
        if pending.is_empty() {
            return;
        }
        let applied = pending.len();
        for entry in pending {
            self.append(&mut state, entry);
        }
        self.publish(&state);
        self.log(
            LogLevel::Debug,
            "stack_pending_applied",
            [json_kv("count", json!(applied))],
            state.logical.len(),
        );
    }

    /// Push `route`. Returns `false` when the push was deferred until mount.
    pub fn push<R>(&self, route: &R) -> bool
    where
        R: Route + ?Sized,
    {
        self.push_entry(PathEntry::new(route.discriminator(), route.path()))
    }

    pub fn push_entry(&self, entry: PathEntry) -> bool {
        let mut state = self.lock();
        if !state.did_appear {
            let path = entry.path.clone();
            state.pending.push(entry);
            self.log(
                LogLevel::Debug,
                "stack_push_deferred",
                [json_kv("route", json!(path))],
                state.logical.len(),
            );
            return false;
        }
        let path = entry.path.clone();
        self.append(&mut state, entry);
        self.publish(&state);
        self.log(
            LogLevel::Debug,
            "stack_pushed",
            [json_kv("route", json!(path))],
            state.logical.len(),
        );
        true
    }

    /// Remove the top entry. No-op on an empty stack.
    pub fn pop(&self) -> bool {
        let mut state = self.lock();
        if !state.did_appear && state.pending.pop().is_some() {
            return true;
        }
        if state.logical.is_empty() {
            return false;
        }
        self.remove(&mut state, 1);
        true
    }

    /// Empty the stack in one batch. Returns how many entries were removed.
    pub fn pop_to_root(&self) -> usize {
        let mut state = self.lock();
        state.pending.clear();
        let count = state.logical.len();
        if count == 0 {
            return 0;
        }
        self.remove(&mut state, count);
        count
    }

    /// Pop back to the most recent occurrence of `route`.
    pub fn pop_to<R>(&self, route: &R) -> usize
    where
        R: Route + ?Sized,
    {
        self.pop_to_path(&route.path())
    }

    /// Pop everything above the last entry equal to `path`.
    ///
    /// No-op when `path` is not on the stack, when the physical and logical
    /// counts disagree, or when the match is already on top.
    pub fn pop_to_path(&self, path: &str) -> usize {
        let mut state = self.lock();
        let Some(index) = state.logical.iter().rposition(|entry| entry == path) else {
            return 0;
        };
        if state.physical.len() != state.logical.len() {
            return 0;
        }
        let drop_count = state.logical.len() - 1 - index;
        if drop_count == 0 {
            return 0;
        }
        self.remove(&mut state, drop_count);
        drop_count
    }

    /// Replace the whole stack with `routes` in one batch.
    pub fn restore<R, I>(&self, routes: I)
    where
        R: Route,
        I: IntoIterator<Item = R>,
    {
        let entries: Vec<PathEntry> = routes
            .into_iter()
            .map(|route| PathEntry::new(route.discriminator(), route.path()))
            .collect();
        let mut state = self.lock();
        if !state.did_appear {
            state.pending = entries;
            return;
        }
        let count = state.logical.len();
        state.physical.remove_last(count);
        state.logical.clear();
        for entry in entries {
            self.append(&mut state, entry);
        }
        self.publish(&state);
        self.log(
            LogLevel::Debug,
            "stack_restored",
            std::iter::empty(),
            state.logical.len(),
        );
    }

    /// Re-derive the logical stack from the physical representation.
    ///
    /// The renderer calls this after changing the physical stack on its own,
    /// e.g. for a back-swipe. Fragments that do not decode into whole entries
    /// are dropped from the physical stack as well.
    pub fn reconcile(&self) {
        let mut state = self.lock();
        self.reconcile_locked(&mut state);
    }

    /// Let the renderer mutate the physical stack, then reconcile.
    ///
    /// The stack is not locked while `mutate` runs, so the closure may read
    /// this path. Changes it makes through this path meanwhile land on a
    /// stand-in and are replaced by the reconciled result.
    pub fn mutate_physical<F, T>(&self, mutate: F) -> T
    where
        F: FnOnce(&mut dyn PhysicalPath) -> T,
    {
        let mut physical = {
            let mut state = self.lock();
            let stand_in = Box::new(mirror(&state.logical));
            std::mem::replace(&mut state.physical, stand_in)
        };
        let result = mutate(physical.as_mut());
        let mut state = self.lock();
        state.physical = physical;
        self.reconcile_locked(&mut state);
        result
    }

    fn reconcile_locked(&self, state: &mut PathState) {
        let decoded = PathCodec::decode(&state.physical.representation());
        align_physical(state.physical.as_mut(), decoded.len());
        if decoded == state.logical {
            return;
        }
        state.logical = decoded;
        self.inner.config.record(|metrics| metrics.record_reconciliation());
        self.publish(state);
        self.log(
            LogLevel::Debug,
            "stack_reconciled",
            std::iter::empty(),
            state.logical.len(),
        );
    }

    fn append(&self, state: &mut PathState, entry: PathEntry) {
        state.logical.push(entry.path.clone());
        state.physical.append(entry);
        self.inner.config.record(|metrics| metrics.record_push());
    }

    fn remove(&self, state: &mut PathState, count: usize) {
        let keep = state.logical.len().saturating_sub(count);
        state.logical.truncate(keep);
        state.physical.remove_last(count);
        self.inner.config.record(|metrics| metrics.record_pops(count));
        self.publish(state);
        self.log(
            LogLevel::Debug,
            "stack_popped",
            [json_kv("count", json!(count))],
            state.logical.len(),
        );
    }

    fn publish(&self, state: &PathState) {
        self.inner.changes.send(state.logical.clone());
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I, depth: usize)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let Some(logger) = self.inner.config.logger.as_ref() else {
            return;
        };
        let mut all = vec![
            json_kv("stack", json!(self.inner.name)),
            json_kv("depth", json!(depth)),
        ];
        all.extend(fields);
        emit(Some(logger), level, TARGET_NAVIGATION, message, all);
    }

    fn lock(&self) -> MutexGuard<'_, PathState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory copy of `logical` that decodes back to the same paths.
fn mirror(logical: &[String]) -> EncodedPath {
    EncodedPath {
        entries: logical
            .iter()
            .map(|path| PathEntry::new("mirror", path.clone()))
            .collect(),
    }
}

/// Trim physical entries that the decoded representation does not account for.
fn align_physical(physical: &mut dyn PhysicalPath, decoded_len: usize) {
    let extra = physical.len().saturating_sub(decoded_len);
    if extra > 0 {
        physical.remove_last(extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Logger, MemorySink};
    use crate::route::DynamicRoute;

    fn route(path: &str) -> DynamicRoute {
        DynamicRoute::titled(path)
    }

    fn mounted(name: &str) -> NavigationPath {
        let path = NavigationPath::new(name);
        path.did_appear();
        path
    }

    fn stack_of(path: &NavigationPath, routes: &[&str]) {
        for r in routes {
            path.push(&route(r));
        }
    }

    #[test]
    fn pushes_grow_stack_and_track_last() {
        let path = mounted("home");
        stack_of(&path, &["a", "b", "c"]);
        assert_eq!(path.len(), 3);
        assert_eq!(path.last().as_deref(), Some("c"));
        path.pop();
        assert_eq!(path.len(), 2);
        assert_eq!(path.last().as_deref(), Some("b"));
    }

    #[test]
    fn pop_on_empty_is_noop() {
        let path = mounted("home");
        assert!(!path.pop());
        assert!(path.is_empty());
    }

    #[test]
    fn pop_to_targets_last_occurrence() {
        let path = mounted("home");
        stack_of(&path, &["A", "B", "A", "C"]);
        assert_eq!(path.pop_to(&route("A")), 1);
        assert_eq!(path.logical_stack(), vec!["A", "B", "A"]);
    }

    #[test]
    fn pop_to_missing_or_top_is_noop() {
        let path = mounted("home");
        stack_of(&path, &["A", "B"]);
        assert_eq!(path.pop_to(&route("Z")), 0);
        assert_eq!(path.pop_to(&route("B")), 0);
        assert_eq!(path.logical_stack(), vec!["A", "B"]);
    }

    #[test]
    fn pop_to_root_is_one_batch() {
        let path = mounted("home");
        stack_of(&path, &["a", "b", "c"]);
        let mut changes = path.stack_changes();
        let _ = changes.drain();

        assert_eq!(path.pop_to_root(), 3);
        assert!(path.is_empty());
        assert_eq!(changes.drain(), vec![Vec::<String>::new()]);

        assert_eq!(path.pop_to_root(), 0);
        assert!(changes.drain().is_empty());
    }

    #[test]
    fn push_before_mount_is_deferred_not_dropped() {
        let path = NavigationPath::new("home");
        assert!(!path.push(&route("a")));
        assert!(!path.push(&route("b")));
        assert!(path.is_empty());
        assert_eq!(path.pending_len(), 2);

        path.did_appear();
        assert_eq!(path.logical_stack(), vec!["a", "b"]);
        assert_eq!(path.pending_len(), 0);
        assert!(path.push(&route("c")));
    }

    #[test]
    fn pop_before_mount_drops_pending_push() {
        let path = NavigationPath::new("home");
        path.push(&route("a"));
        path.push(&route("b"));
        assert!(path.pop());
        path.did_appear();
        assert_eq!(path.logical_stack(), vec!["a"]);
    }

    #[test]
    fn external_pop_is_reconciled() {
        let path = mounted("home");
        stack_of(&path, &["a", "b", "c"]);
        path.mutate_physical(|physical| physical.remove_last(1));
        assert_eq!(path.logical_stack(), vec!["a", "b"]);
    }

    #[test]
    fn mutate_closure_may_read_the_path() {
        let path = mounted("home");
        stack_of(&path, &["a", "b", "c"]);

        let (depth, seen) = path.mutate_physical(|physical| {
            physical.remove_last(1);
            (path.len(), path.logical_stack())
        });
        assert_eq!(depth, 3);
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(path.logical_stack(), vec!["a", "b"]);
    }

    #[test]
    fn push_inside_mutate_yields_to_reconciled_stack() {
        let path = mounted("home");
        stack_of(&path, &["a", "b"]);

        let pushed = path.mutate_physical(|physical| {
            physical.remove_last(1);
            path.push(&route("z"))
        });
        assert!(pushed);
        assert_eq!(path.logical_stack(), vec!["a"]);
        assert_eq!(path.mutate_physical(|physical| physical.len()), 1);
    }

    /// Reports one entry fewer than it holds.
    #[derive(Default)]
    struct ShortCountPath {
        inner: EncodedPath,
    }

    impl PhysicalPath for ShortCountPath {
        fn len(&self) -> usize {
            self.inner.len().saturating_sub(1)
        }

        fn append(&mut self, entry: PathEntry) {
            self.inner.append(entry);
        }

        fn remove_last(&mut self, count: usize) {
            self.inner.remove_last(count);
        }

        fn representation(&self) -> Vec<String> {
            self.inner.representation()
        }
    }

    #[test]
    fn pop_to_is_noop_when_counts_disagree() {
        let path = NavigationPath::with_physical(
            "home",
            ShortCountPath::default(),
            &NavigatorConfig::default(),
        );
        path.did_appear();
        stack_of(&path, &["a", "b", "c"]);

        assert_eq!(path.pop_to(&route("a")), 0);
        assert_eq!(path.logical_stack(), vec!["a", "b", "c"]);
    }

    #[derive(Default)]
    struct LossyPath {
        inner: EncodedPath,
        corrupt: bool,
    }

    impl PhysicalPath for LossyPath {
        fn len(&self) -> usize {
            self.inner.len()
        }

        fn append(&mut self, entry: PathEntry) {
            self.inner.append(entry);
        }

        fn remove_last(&mut self, count: usize) {
            self.inner.remove_last(count);
        }

        fn representation(&self) -> Vec<String> {
            let mut fragments = self.inner.representation();
            if self.corrupt {
                fragments.push("stray".to_string());
            }
            fragments
        }
    }

    #[test]
    fn malformed_representation_truncates_best_effort() {
        let path = NavigationPath::with_physical(
            "home",
            LossyPath::default(),
            &NavigatorConfig::default(),
        );
        path.did_appear();
        stack_of(&path, &["a", "b", "c"]);

        let physical_len = path.mutate_physical(|physical| {
            physical.append(PathEntry::new("dynamic", "d"));
            physical.len()
        });
        assert_eq!(physical_len, 4);
        assert_eq!(path.logical_stack(), vec!["a", "b", "c", "d"]);

        let path = NavigationPath::with_physical(
            "broken",
            LossyPath {
                inner: EncodedPath::new(),
                corrupt: true,
            },
            &NavigatorConfig::default(),
        );
        path.did_appear();
        path.push(&route("a"));
        path.push(&route("b"));
        path.reconcile();
        // Five fragments: the unpaired trailing one is discarded.
        assert_eq!(path.logical_stack(), vec!["a", "b"]);
        assert_eq!(path.mutate_physical(|physical| physical.len()), 2);
    }

    #[test]
    fn restore_replaces_stack_in_one_change() {
        let path = mounted("home");
        stack_of(&path, &["a", "b"]);
        let mut changes = path.stack_changes();
        let _ = changes.drain();

        path.restore([route("x"), route("y"), route("z")]);
        assert_eq!(path.logical_stack(), vec!["x", "y", "z"]);
        assert_eq!(changes.drain().len(), 1);
    }

    #[test]
    fn operations_are_logged() {
        let sink = Arc::new(MemorySink::new());
        let config = NavigatorConfig::default().with_logger(Logger::from_shared(sink.clone()));
        let path = NavigationPath::with_config("home", &config);
        path.push(&route("a"));
        path.did_appear();
        path.pop();
        assert_eq!(
            sink.messages(),
            vec!["stack_push_deferred", "stack_pending_applied", "stack_popped"]
        );
    }
}
