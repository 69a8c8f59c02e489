use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::json;

use crate::config::NavigatorConfig;
use crate::error::{NavError, Result};
use crate::logging::{LogLevel, TARGET_COORDINATOR, emit, json_kv};
use crate::navigation::NavigationPath;
use crate::route::{AnyRoute, Route, Screen, StackKey, StaticScreen};
use crate::router::Router;
use crate::sync::{BroadcastValue, CancelBag, Subscription};
use crate::tabs::{CoordinatorEmitter, CoordinatorEvent, TabActivation, TabSelection};
use crate::transition::{Transition, TransitionKind};

/// Builder that validates stack declarations before a [`Coordinator`] exists.
#[derive(Debug)]
pub struct CoordinatorBuilder {
    identifier: String,
    stacks: Vec<String>,
    initial_tab: usize,
    config: NavigatorConfig,
}

impl CoordinatorBuilder {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            stacks: Vec::new(),
            initial_tab: 0,
            config: NavigatorConfig::default(),
        }
    }

    pub fn stack<K: StackKey + ?Sized>(mut self, key: &K) -> Self {
        self.stacks.push(key.stack_name().to_string());
        self
    }

    pub fn stacks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stacks.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn initial_tab(mut self, index: usize) -> Self {
        self.initial_tab = index;
        self
    }

    pub fn config(mut self, config: &NavigatorConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Rejects an empty identifier and empty or duplicate stack names.
    pub fn build(self) -> Result<Arc<Coordinator>> {
        if self.identifier.trim().is_empty() {
            return Err(NavError::EmptyIdentifier);
        }

        let mut stacks: Vec<NavigationPath> = Vec::with_capacity(self.stacks.len());
        for name in self.stacks {
            if name.trim().is_empty() {
                return Err(NavError::EmptyIdentifier);
            }
            if stacks.iter().any(|stack| stack.name() == name) {
                return Err(NavError::DuplicateStack(name));
            }
            stacks.push(NavigationPath::with_config(name, &self.config));
        }

        let emitter = CoordinatorEmitter::new();
        let tabs = TabSelection::with_config(self.initial_tab, emitter.clone(), &self.config);
        let root_router = Router::with_config(format!("{}.root", self.identifier), &self.config);

        Ok(Arc::new(Coordinator {
            identifier: self.identifier,
            root_router,
            tabs,
            emitter,
            stacks,
            active_navigation: Mutex::new(None),
            dismiss_signal: BroadcastValue::with_value(false),
            parent: Mutex::new(None),
            children: Mutex::new(Vec::new()),
            tasks: CancelBag::new(),
            config: self.config,
        }))
    }
}

/// Owner of one screen flow: a root router for top-level presentations, the
/// named navigation stacks, tab state and the dismiss-all signal.
pub struct Coordinator {
    identifier: String,
    root_router: Router<AnyRoute>,
    tabs: TabSelection,
    emitter: CoordinatorEmitter,
    stacks: Vec<NavigationPath>,
    active_navigation: Mutex<Option<String>>,
    dismiss_signal: BroadcastValue<bool>,
    parent: Mutex<Option<Weak<Coordinator>>>,
    children: Mutex<Vec<Weak<Coordinator>>>,
    tasks: CancelBag,
    config: NavigatorConfig,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("identifier", &self.identifier)
            .field("stacks", &self.stack_names())
            .field("active_navigation", &*self.lock_active())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn builder(identifier: impl Into<String>) -> CoordinatorBuilder {
        CoordinatorBuilder::new(identifier)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn root_router(&self) -> &Router<AnyRoute> {
        &self.root_router
    }

    pub fn tabs(&self) -> &TabSelection {
        &self.tabs
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Background work scoped to this coordinator; cancelled when it drops.
    pub fn tasks(&self) -> &CancelBag {
        &self.tasks
    }

    pub fn events(&self) -> Subscription<CoordinatorEvent> {
        self.emitter.subscribe()
    }

    pub fn stack<K: StackKey + ?Sized>(&self, key: &K) -> Option<&NavigationPath> {
        let name = key.stack_name();
        self.stacks.iter().find(|stack| stack.name() == name)
    }

    pub fn stacks(&self) -> &[NavigationPath] {
        &self.stacks
    }

    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(NavigationPath::name).collect()
    }

    /// Called by the renderer when the stack named `key` mounts. The stack
    /// becomes the default push target and flushes any deferred pushes.
    pub fn register_active_navigation<K: StackKey + ?Sized>(&self, key: &K) -> Result<()> {
        let name = key.stack_name();
        let stack = self
            .stack(name)
            .ok_or_else(|| NavError::UnknownStack(name.to_string()))?;
        *self.lock_active() = Some(name.to_string());
        stack.did_appear();
        self.log(LogLevel::Debug, "active_navigation", [json_kv("stack", json!(name))]);
        Ok(())
    }

    /// The most recently mounted stack, or the first declared one before any
    /// stack has mounted.
    pub fn active_navigation(&self) -> Option<&NavigationPath> {
        let active = self.lock_active().clone();
        match active {
            Some(name) => self.stack(name.as_str()),
            None => self.stacks.first(),
        }
    }

    /// Push onto the active stack. Returns `false` when the coordinator has no
    /// stacks at all; a push deferred until mount still counts as accepted.
    pub fn push<R: Route + ?Sized>(&self, route: &R) -> bool {
        match self.active_navigation() {
            Some(stack) => {
                stack.push(route);
                true
            }
            None => false,
        }
    }

    /// Pop the active stack to its root. Returns the number of entries removed.
    pub fn pop_to_root(&self) -> usize {
        self.active_navigation()
            .map(NavigationPath::pop_to_root)
            .unwrap_or(0)
    }

    pub fn pop_all_to_root(&self) -> usize {
        self.stacks.iter().map(NavigationPath::pop_to_root).sum()
    }

    pub fn select_tab(&self, index: usize) -> TabActivation {
        self.tabs.select(index)
    }

    pub fn dismiss_signal(&self) -> bool {
        self.dismiss_signal.current().unwrap_or(false)
    }

    /// Edges of the dismiss-all signal, starting with its current value.
    pub fn dismiss_signals(&self) -> Subscription<bool> {
        self.dismiss_signal.subscribe()
    }

    /// Drop every presentation of this flow and pop every stack to root.
    pub fn dismiss_all(&self) -> usize {
        self.toggle_dismiss_signal();
        let removed = self.pop_all_to_root();
        self.emitter.emit(CoordinatorEvent::DismissAll);
        self.log(LogLevel::Info, "dismiss_all", [json_kv("removed", json!(removed))]);
        removed
    }

    /// Dismiss every flow related to this one: the outermost live ancestor
    /// and every live descendant of it, each through
    /// [`Coordinator::dismiss_all`]. Returns the total number of entries
    /// removed from their stacks.
    pub fn dismiss_all_flows(&self) -> usize {
        let mut seen: Vec<*const Coordinator> = vec![self as *const Coordinator];
        let mut outermost = None;
        let mut next = self.parent();
        while let Some(parent) = next {
            if seen.contains(&Arc::as_ptr(&parent)) {
                break;
            }
            seen.push(Arc::as_ptr(&parent));
            next = parent.parent();
            outermost = Some(parent);
        }

        let mut visited = Vec::new();
        let mut removed = match outermost {
            Some(outermost) => outermost.dismiss_tree(&mut visited),
            None => 0,
        };
        removed += self.dismiss_tree(&mut visited);
        removed
    }

    /// Like [`Coordinator::dismiss_all`], and also clears the root router.
    ///
    /// The dismiss-all signal is edge-triggered: observers react to every
    /// change of its value, so a reset toggles it rather than forcing it back
    /// to `false`.
    pub fn reset(&self) -> usize {
        self.toggle_dismiss_signal();
        let removed = self.pop_all_to_root();
        self.root_router.reset();
        self.emitter.emit(CoordinatorEvent::Reset);
        self.log(LogLevel::Info, "reset", [json_kv("removed", json!(removed))]);
        removed
    }

    /// Present `child` as a nested flow through this coordinator's root router.
    pub fn open_child(
        self: &Arc<Self>,
        child: &Arc<Coordinator>,
        kind: TransitionKind,
    ) -> Transition<AnyRoute> {
        *child.lock_parent() = Some(Arc::downgrade(self));
        {
            let mut children = self.lock_children();
            children.retain(|known| {
                known.strong_count() > 0 && !std::ptr::eq(known.as_ptr(), Arc::as_ptr(child))
            });
            children.push(Arc::downgrade(child));
        }
        self.log(
            LogLevel::Debug,
            "child_opened",
            [
                json_kv("child", json!(child.identifier)),
                json_kv("kind", json!(kind.as_str())),
            ],
        );
        self.root_router
            .trigger(AnyRoute::new(FlowRoute::for_child(child)), kind)
    }

    /// Dismiss this flow from the coordinator that opened it. Returns `false`
    /// when there is no live parent.
    pub fn close(&self) -> bool {
        let parent = self.lock_parent().take().and_then(|parent| parent.upgrade());
        match parent {
            Some(parent) => {
                parent
                    .lock_children()
                    .retain(|known| !std::ptr::eq(known.as_ptr(), self));
                parent.root_router.dismiss();
                true
            }
            None => false,
        }
    }

    pub fn parent(&self) -> Option<Arc<Coordinator>> {
        self.lock_parent().as_ref().and_then(Weak::upgrade)
    }

    /// Live child flows opened from this coordinator, oldest first.
    pub fn children(&self) -> Vec<Arc<Coordinator>> {
        self.lock_children().iter().filter_map(Weak::upgrade).collect()
    }

    fn dismiss_tree(&self, visited: &mut Vec<*const Coordinator>) -> usize {
        let this: *const Coordinator = self;
        if visited.contains(&this) {
            return 0;
        }
        visited.push(this);
        let mut removed = self.dismiss_all();
        for child in self.children() {
            removed += child.dismiss_tree(visited);
        }
        removed
    }

    fn toggle_dismiss_signal(&self) {
        self.dismiss_signal.update(|raised| *raised = !*raised);
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<String>> {
        self.active_navigation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_parent(&self) -> MutexGuard<'_, Option<Weak<Coordinator>>> {
        self.parent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_children(&self) -> MutexGuard<'_, Vec<Weak<Coordinator>>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let fields = std::iter::once(json_kv("coordinator", json!(self.identifier))).chain(fields);
        emit(self.config.logger.as_ref(), level, TARGET_COORDINATOR, message, fields);
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.tasks.cancel_all();
        self.dismiss_signal.finish();
        self.emitter.finish();
    }
}

/// Route under which a child flow is presented on its parent's root router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRoute {
    identifier: String,
}

impl FlowRoute {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    fn for_child(child: &Coordinator) -> Self {
        Self::new(child.identifier())
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl Route for FlowRoute {
    fn path(&self) -> String {
        format!("flow_{}", self.identifier)
    }

    fn screen(&self) -> Box<dyn Screen> {
        Box::new(StaticScreen::new(self.identifier.clone()))
    }

    fn discriminator(&self) -> &'static str {
        "flow"
    }
}
