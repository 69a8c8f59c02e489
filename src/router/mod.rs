//! Per-screen holder of the current navigation intent.
//!
//! Setting a [`Transition`] is the only effect of any router call. The router
//! is a single latest-value cell: a renderer that wakes after several intents
//! sees only the newest one. It performs the concrete UI action and reports
//! back through [`Router::complete`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use tokio::sync::watch;

use crate::config::NavigatorConfig;
use crate::logging::{LogLevel, TARGET_ROUTER, emit, json_kv};
use crate::route::Route;
use crate::transition::{
    AlertPayload, DialogPayload, PopoverPayload, Transition, TransitionKind, WindowPayload,
};

struct RouterInner<R> {
    label: String,
    transition: watch::Sender<Transition<R>>,
    sequence: AtomicU64,
    config: NavigatorConfig,
}

/// Holds exactly one current [`Transition`]; every call replaces it.
pub struct Router<R> {
    inner: Arc<RouterInner<R>>,
}

impl<R> Clone for Router<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> std::fmt::Debug for Router<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("label", &self.inner.label)
            .finish_non_exhaustive()
    }
}

impl<R> Router<R>
where
    R: Route + Clone,
{
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_config(label, &NavigatorConfig::default())
    }

    pub fn with_config(label: impl Into<String>, config: &NavigatorConfig) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                label: label.into(),
                transition: watch::Sender::new(Transition::none()),
                sequence: AtomicU64::new(0),
                config: config.clone(),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// The current transition.
    pub fn transition(&self) -> Transition<R> {
        self.inner.transition.borrow().clone()
    }

    /// Watch the current transition. The receiver starts with the current
    /// value marked as seen and wakes once per batch of replacements.
    pub fn subscribe(&self) -> watch::Receiver<Transition<R>> {
        self.inner.transition.subscribe()
    }

    /// Replace the current transition with `transition`.
    pub fn set(&self, transition: Transition<R>) -> Transition<R> {
        let sequence = &self.inner.sequence;
        let mut issued = Transition::none();
        self.inner.transition.send_modify(|current| {
            *current = transition.stamped(sequence.fetch_add(1, Ordering::SeqCst) + 1);
            issued = current.clone();
        });

        if !issued.is_none() {
            self.inner.config.record(|metrics| metrics.record_transition());
            emit(
                self.inner.config.logger.as_ref(),
                LogLevel::Debug,
                TARGET_ROUTER,
                "transition_issued",
                [
                    json_kv("router", json!(self.inner.label)),
                    json_kv("kind", json!(issued.kind.as_str())),
                    json_kv("route", json!(issued.route.as_ref().map(Route::path))),
                    json_kv("sequence", json!(issued.sequence())),
                ],
            );
        }
        issued
    }

    pub fn trigger(&self, route: R, kind: TransitionKind) -> Transition<R> {
        self.set(Transition::with_route(kind, route))
    }

    pub fn push(&self, route: R) -> Transition<R> {
        self.trigger(route, TransitionKind::Push)
    }

    pub fn present(&self, route: R) -> Transition<R> {
        self.trigger(route, TransitionKind::Present)
    }

    pub fn sheet(&self, route: R) -> Transition<R> {
        self.trigger(route, TransitionKind::Sheet)
    }

    pub fn dismiss(&self) -> Transition<R> {
        self.set(Transition::new(TransitionKind::Dismiss))
    }

    pub fn dismiss_all(&self) -> Transition<R> {
        self.set(Transition::new(TransitionKind::DismissAll))
    }

    pub fn pop(&self) -> Transition<R> {
        self.set(Transition::new(TransitionKind::Pop))
    }

    pub fn pop_to_root(&self) -> Transition<R> {
        self.set(Transition::new(TransitionKind::PopToRoot))
    }

    pub fn pop_to(&self, route: R) -> Transition<R> {
        self.trigger(route, TransitionKind::PopToRoute)
    }

    pub fn select_tab(&self, index: usize) -> Transition<R> {
        self.set(Transition::select_tab(index))
    }

    pub fn open_window(&self, window: WindowPayload) -> Transition<R> {
        self.set(Transition::open_window(window))
    }

    pub fn open_url(&self, url: impl Into<String>) -> Transition<R> {
        self.set(Transition::open_url(TransitionKind::OpenUrl, url))
    }

    pub fn open_document(&self, url: impl Into<String>) -> Transition<R> {
        self.set(Transition::open_url(TransitionKind::OpenDocument, url))
    }

    pub fn show_alert(&self, alert: AlertPayload) -> Transition<R> {
        self.set(Transition::alert(alert))
    }

    pub fn show_error(&self, error: &dyn std::fmt::Display) -> Transition<R> {
        self.show_alert(AlertPayload::from_error(error))
    }

    pub fn show_dialog(&self, dialog: DialogPayload) -> Transition<R> {
        self.set(Transition::action_sheet(dialog))
    }

    pub fn show_popover(&self, popover: PopoverPayload) -> Transition<R> {
        self.set(Transition::popover(popover, None))
    }

    /// Show the alert declared by `route`, if it declares one.
    pub fn show_route_alert(&self, route: &R) -> Option<Transition<R>> {
        let alert = route.alert()?;
        Some(self.set(Transition::alert(alert).routed(route.clone())))
    }

    /// Show the confirmation dialog declared by `route`, if any.
    pub fn show_route_dialog(&self, route: &R) -> Option<Transition<R>> {
        let dialog = route.dialog()?;
        Some(self.set(Transition::action_sheet(dialog).routed(route.clone())))
    }

    /// Show the popover declared by `route`, if any.
    pub fn show_route_popover(&self, route: &R) -> Option<Transition<R>> {
        let popover = route.popover()?;
        Some(self.set(Transition::popover(popover, Some(route.clone()))))
    }

    /// Unconditionally return to `None`, e.g. after a global reset or a local
    /// dismiss gesture.
    pub fn reset(&self) {
        self.set(Transition::none());
    }

    /// Reset to `None` if `handled` is still the current transition.
    ///
    /// Returns `false` when a newer intent replaced it in the meantime; that
    /// intent is left untouched.
    pub fn complete(&self, handled: &Transition<R>) -> bool {
        let sequence = &self.inner.sequence;
        let target = handled.sequence();
        self.inner.transition.send_if_modified(|current| {
            if current.sequence() != target || current.is_none() {
                return false;
            }
            *current = Transition::none().stamped(sequence.fetch_add(1, Ordering::SeqCst) + 1);
            true
        })
    }
}
