//! Declarative navigation engine.
//!
//! Feature code expresses navigation as intents on a [`Router`]; a renderer
//! observes the resulting [`Transition`] and performs the concrete UI action.
//! [`NavigationPath`] keeps a logical stack of route paths in step with the
//! renderer's physical stack, [`Coordinator`] groups the routers, stacks and
//! tab state of one screen flow, and [`RootContext`] runs ordered routing
//! programs across the active coordinators.
//!
//! Modules follow the `mod.rs` + `core.rs` layout; each module re-exports its
//! public surface here.

pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod navigation;
pub mod route;
pub mod router;
pub mod sync;
pub mod tabs;
pub mod transition;

pub use config::{
    DEFAULT_DOUBLE_TAP_WINDOW, DEFAULT_SETTLE_DELAY, MIN_SETTLE_DELAY, NavigatorConfig,
    TimingSettings,
};
pub use context::{
    BufferedRoutingAudit, NullRoutingAudit, ProgramReport, RootContext, RoutingAudit,
    RoutingAuditEvent, RoutingAuditEventBuilder, RoutingAuditStage, RoutingCommand,
};
pub use coordinator::{
    Coordinator, CoordinatorBuilder, FlowRoute, NullRendererHooks, PresentationState,
    RendererHooks, TransitionObserver,
};
pub use error::{NavError, Result};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{MetricSnapshot, NavigationMetrics};
pub use navigation::{EncodedPath, NavigationPath, PathCodec, PathEntry, PhysicalPath};
pub use route::{
    AnyRoute, DynamicRoute, Route, RouteTable, Screen, ScreenFactory, ScreenLifecycleEvent,
    StackKey, StaticScreen, route_path,
};
pub use router::Router;
pub use sync::{BroadcastValue, CancelBag, CancelToken, Cancellable, Subscription};
pub use tabs::{CoordinatorEmitter, CoordinatorEvent, TabActivation, TabSelection};
pub use transition::{
    ActionRole, AlertAction, AlertPayload, DialogPayload, PopoverPayload, Transition,
    TransitionKind, WindowPayload,
};
