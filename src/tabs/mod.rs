//! Tab selection and double-activation detection.
//!
//! Reselecting the current tab arms a debounce window; a second reselection
//! inside the window emits [`CoordinatorEvent::DoubleTap`]. The window is
//! enforced by a deadline check, and a cancellable timer task resets the tap
//! counter when the window lapses so observers of [`TabSelection::tap_counts`]
//! see it return to zero.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use crate::config::NavigatorConfig;
use crate::logging::{LogLevel, TARGET_TABS, emit, json_kv};
use crate::sync::{BroadcastValue, CancelBag, Subscription};

const TAP_TIMER_ID: &str = "tabs.double_tap";

/// Events a coordinator broadcasts to its renderer and feature code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorEvent {
    TabSelected { index: usize },
    DoubleTap { index: usize },
    DismissAll,
    Reset,
}

/// Broadcast channel for [`CoordinatorEvent`]s. Clones share the channel.
#[derive(Clone, Debug, Default)]
pub struct CoordinatorEmitter {
    events: BroadcastValue<CoordinatorEvent>,
}

impl CoordinatorEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: CoordinatorEvent) {
        self.events.send(event);
    }

    pub fn subscribe(&self) -> Subscription<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub fn finish(&self) {
        self.events.finish();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TapState {
    Idle,
    Armed { deadline: Instant, generation: u64 },
}

#[derive(Debug)]
struct SelectionState {
    selection: usize,
    tap: TapState,
    generation: u64,
}

struct TabInner {
    state: Mutex<SelectionState>,
    selection: BroadcastValue<usize>,
    tap_count: BroadcastValue<u32>,
    emitter: CoordinatorEmitter,
    timers: CancelBag,
    window: Duration,
    config: NavigatorConfig,
}

impl TabInner {
    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expire(&self, generation: u64) {
        let mut state = self.lock();
        if let TapState::Armed {
            generation: armed, ..
        } = state.tap
        {
            if armed == generation {
                state.tap = TapState::Idle;
                self.tap_count.send(0);
            }
        }
    }
}

impl Drop for TabInner {
    fn drop(&mut self) {
        self.timers.cancel_all();
        self.selection.finish();
        self.tap_count.finish();
    }
}

/// Outcome of a single [`TabSelection::select`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabActivation {
    /// A different tab became selected.
    Switched,
    /// The current tab was reselected once; the debounce window is armed.
    Armed,
    /// Second reselection inside the window.
    DoubleTap,
}

/// Current tab plus the double-tap debounce state machine.
#[derive(Clone)]
pub struct TabSelection {
    inner: Arc<TabInner>,
}

impl std::fmt::Debug for TabSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabSelection")
            .field("state", &*self.inner.lock())
            .field("window", &self.inner.window)
            .finish_non_exhaustive()
    }
}

impl TabSelection {
    pub fn new(initial: usize, emitter: CoordinatorEmitter) -> Self {
        Self::with_config(initial, emitter, &NavigatorConfig::default())
    }

    pub fn with_config(
        initial: usize,
        emitter: CoordinatorEmitter,
        config: &NavigatorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TabInner {
                state: Mutex::new(SelectionState {
                    selection: initial,
                    tap: TapState::Idle,
                    generation: 0,
                }),
                selection: BroadcastValue::with_value(initial),
                tap_count: BroadcastValue::with_value(0),
                emitter,
                timers: CancelBag::new(),
                window: config.double_tap_window,
                config: config.clone(),
            }),
        }
    }

    pub fn selection(&self) -> usize {
        self.inner.lock().selection
    }

    /// Current reselection count: 0 when idle, 1 while armed.
    pub fn tap_count(&self) -> u32 {
        match self.inner.lock().tap {
            TapState::Idle => 0,
            TapState::Armed { .. } => 1,
        }
    }

    pub fn selections(&self) -> Subscription<usize> {
        self.inner.selection.subscribe()
    }

    pub fn tap_counts(&self) -> Subscription<u32> {
        self.inner.tap_count.subscribe()
    }

    pub fn select(&self, index: usize) -> TabActivation {
        let now = Instant::now();
        let mut state = self.inner.lock();

        if state.selection != index {
            state.selection = index;
            state.tap = TapState::Idle;
            drop(state);
            self.inner.timers.cancel(TAP_TIMER_ID);
            self.inner.tap_count.send(0);
            self.inner.selection.send(index);
            self.inner.emitter.emit(CoordinatorEvent::TabSelected { index });
            self.log("tab_selected", index);
            return TabActivation::Switched;
        }

        match state.tap {
            TapState::Armed { deadline, .. } if now < deadline => {
                state.tap = TapState::Idle;
                drop(state);
                self.inner.timers.cancel(TAP_TIMER_ID);
                self.inner.tap_count.send(2);
                self.inner.tap_count.send(0);
                self.inner.emitter.emit(CoordinatorEvent::DoubleTap { index });
                self.inner.config.record(|metrics| metrics.record_double_tap());
                self.log("double_tap", index);
                TabActivation::DoubleTap
            }
            _ => {
                state.generation += 1;
                let generation = state.generation;
                state.tap = TapState::Armed {
                    deadline: now + self.inner.window,
                    generation,
                };
                drop(state);
                self.inner.tap_count.send(1);
                self.arm_timer(generation);
                TabActivation::Armed
            }
        }
    }

    fn arm_timer(&self, generation: u64) {
        let weak: Weak<TabInner> = Arc::downgrade(&self.inner);
        let window = self.inner.window;
        self.inner.timers.spawn(Some(TAP_TIMER_ID), move |token| async move {
            tokio::time::sleep(window).await;
            if token.is_cancelled() {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                inner.expire(generation);
            }
        });
    }

    fn log(&self, message: &str, index: usize) {
        emit(
            self.inner.config.logger.as_ref(),
            LogLevel::Debug,
            TARGET_TABS,
            message,
            [json_kv("index", json!(index))],
        );
    }
}
