use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::transition::{AlertPayload, DialogPayload, PopoverPayload};

/// Lifecycle notifications delivered to a screen as it is shown and hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenLifecycleEvent {
    WillAppear,
    DidAppear,
    WillDisappear,
    DidDisappear,
}

/// Renderable content produced by a route. The engine never draws it; it only
/// hands it to the renderer and forwards lifecycle events.
pub trait Screen: Send {
    fn title(&self) -> &str;

    fn on_lifecycle(&mut self, _event: ScreenLifecycleEvent) {}
}

/// Factory type responsible for creating a fresh [`Screen`].
pub type ScreenFactory = Arc<dyn Fn() -> Box<dyn Screen> + Send + Sync>;

/// Screen with a fixed title and no behaviour of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticScreen {
    title: String,
}

impl StaticScreen {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Screen for StaticScreen {
    fn title(&self) -> &str {
        &self.title
    }
}

/// A navigation destination.
///
/// `path` is the route's identity: it must be deterministic and unique across
/// every route of one enumeration, because stacks store and match routes by it.
pub trait Route: Send + Sync + fmt::Debug + 'static {
    fn path(&self) -> String;

    fn screen(&self) -> Box<dyn Screen>;

    /// Type discriminator written next to the path in encoded stacks.
    fn discriminator(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn alert(&self) -> Option<AlertPayload> {
        None
    }

    fn dialog(&self) -> Option<DialogPayload> {
        None
    }

    fn popover(&self) -> Option<PopoverPayload> {
        None
    }
}

/// Type-erased route, used wherever routes of different enumerations mix
/// (the root router, routing programs). Equality and hashing use `path` only.
#[derive(Clone)]
pub struct AnyRoute {
    path: String,
    inner: Arc<dyn Route>,
}

impl AnyRoute {
    pub fn new<R: Route>(route: R) -> Self {
        Self::from_arc(Arc::new(route))
    }

    pub fn from_arc(inner: Arc<dyn Route>) -> Self {
        Self {
            path: inner.path(),
            inner,
        }
    }

    pub fn inner(&self) -> &dyn Route {
        self.inner.as_ref()
    }
}

impl Route for AnyRoute {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn screen(&self) -> Box<dyn Screen> {
        self.inner.screen()
    }

    fn discriminator(&self) -> &'static str {
        self.inner.discriminator()
    }

    fn alert(&self) -> Option<AlertPayload> {
        self.inner.alert()
    }

    fn dialog(&self) -> Option<DialogPayload> {
        self.inner.dialog()
    }

    fn popover(&self) -> Option<PopoverPayload> {
        self.inner.popover()
    }
}

impl fmt::Debug for AnyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyRoute").field(&self.path).finish()
    }
}

impl PartialEq for AnyRoute {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for AnyRoute {}

impl Hash for AnyRoute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Route built from a path and a screen factory, for destinations that do not
/// warrant their own enumeration.
#[derive(Clone)]
pub struct DynamicRoute {
    path: String,
    factory: ScreenFactory,
    alert: Option<AlertPayload>,
}

impl DynamicRoute {
    pub fn new(path: impl Into<String>, factory: ScreenFactory) -> Self {
        Self {
            path: path.into(),
            factory,
            alert: None,
        }
    }

    /// Route whose screen is a [`StaticScreen`] titled with the path.
    pub fn titled(path: impl Into<String>) -> Self {
        let path = path.into();
        let title = path.clone();
        Self::new(
            path,
            Arc::new(move || Box::new(StaticScreen::new(title.clone())) as Box<dyn Screen>),
        )
    }

    pub fn with_alert(mut self, alert: AlertPayload) -> Self {
        self.alert = Some(alert);
        self
    }
}

impl fmt::Debug for DynamicRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicRoute")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PartialEq for DynamicRoute {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Route for DynamicRoute {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn screen(&self) -> Box<dyn Screen> {
        (self.factory)()
    }

    fn discriminator(&self) -> &'static str {
        "dynamic"
    }

    fn alert(&self) -> Option<AlertPayload> {
        self.alert.clone()
    }
}
