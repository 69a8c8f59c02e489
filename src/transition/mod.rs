//! The single pending navigation intent of a router.

mod payload;

pub use payload::{
    ActionRole, AlertAction, AlertPayload, DialogPayload, PopoverPayload, WindowPayload,
};

/// What a renderer should do for a [`Transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionKind {
    #[default]
    None,
    Push,
    Present,
    Sheet,
    SelectTab,
    Alert,
    ActionSheet,
    Dismiss,
    DismissAll,
    Pop,
    PopToRoot,
    PopToRoute,
    OpenWindow,
    OpenUrl,
    OpenDocument,
}

impl TransitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionKind::None => "none",
            TransitionKind::Push => "push",
            TransitionKind::Present => "present",
            TransitionKind::Sheet => "sheet",
            TransitionKind::SelectTab => "select_tab",
            TransitionKind::Alert => "alert",
            TransitionKind::ActionSheet => "action_sheet",
            TransitionKind::Dismiss => "dismiss",
            TransitionKind::DismissAll => "dismiss_all",
            TransitionKind::Pop => "pop",
            TransitionKind::PopToRoot => "pop_to_root",
            TransitionKind::PopToRoute => "pop_to_route",
            TransitionKind::OpenWindow => "open_window",
            TransitionKind::OpenUrl => "open_url",
            TransitionKind::OpenDocument => "open_document",
        }
    }

    /// Kinds that raise a modal presentation flag on the renderer side.
    pub fn is_presentation(self) -> bool {
        matches!(
            self,
            TransitionKind::Present
                | TransitionKind::Sheet
                | TransitionKind::Alert
                | TransitionKind::ActionSheet
        )
    }

    /// Kinds that change a navigation stack.
    pub fn affects_stack(self) -> bool {
        matches!(
            self,
            TransitionKind::Push
                | TransitionKind::Pop
                | TransitionKind::PopToRoot
                | TransitionKind::PopToRoute
        )
    }

    /// Whether the observer must reset the router to `None` after acting.
    /// Pushes are idempotent against stack state and stay put.
    pub fn requires_reset(self) -> bool {
        !matches!(self, TransitionKind::None | TransitionKind::Push)
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one navigation intent.
///
/// Equality compares `kind` only, so observers do not react twice to two
/// intents of the same kind that differ in payload.
#[derive(Debug, Clone)]
pub struct Transition<R> {
    pub kind: TransitionKind,
    pub route: Option<R>,
    pub alert: Option<AlertPayload>,
    pub dialog: Option<DialogPayload>,
    pub popover: Option<PopoverPayload>,
    pub tab_index: Option<usize>,
    pub window: Option<WindowPayload>,
    pub url: Option<String>,
    sequence: u64,
}

impl<R> Default for Transition<R> {
    fn default() -> Self {
        Self::none()
    }
}

impl<R> PartialEq for Transition<R> {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl<R> Eq for Transition<R> {}

impl<R> Transition<R> {
    pub fn none() -> Self {
        Self::new(TransitionKind::None)
    }

    pub fn new(kind: TransitionKind) -> Self {
        Self {
            kind,
            route: None,
            alert: None,
            dialog: None,
            popover: None,
            tab_index: None,
            window: None,
            url: None,
            sequence: 0,
        }
    }

    pub fn with_route(kind: TransitionKind, route: R) -> Self {
        Self {
            route: Some(route),
            ..Self::new(kind)
        }
    }

    pub fn alert(alert: AlertPayload) -> Self {
        Self {
            alert: Some(alert),
            ..Self::new(TransitionKind::Alert)
        }
    }

    pub fn action_sheet(dialog: DialogPayload) -> Self {
        Self {
            dialog: Some(dialog),
            ..Self::new(TransitionKind::ActionSheet)
        }
    }

    pub fn popover(popover: PopoverPayload, route: Option<R>) -> Self {
        Self {
            popover: Some(popover),
            route,
            ..Self::new(TransitionKind::Present)
        }
    }

    pub fn select_tab(index: usize) -> Self {
        Self {
            tab_index: Some(index),
            ..Self::new(TransitionKind::SelectTab)
        }
    }

    pub fn open_window(window: WindowPayload) -> Self {
        Self {
            window: Some(window),
            ..Self::new(TransitionKind::OpenWindow)
        }
    }

    pub fn open_url(kind: TransitionKind, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(kind)
        }
    }

    /// Attach the route the payload belongs to.
    pub fn routed(mut self, route: R) -> Self {
        self.route = Some(route);
        self
    }

    pub fn is_none(&self) -> bool {
        self.kind == TransitionKind::None
    }

    /// Monotonic stamp assigned by the issuing router; zero for transitions
    /// that were never issued.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn stamped(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}
