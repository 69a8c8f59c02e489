//! Renderer-side consumer of router transitions.
//!
//! [`TransitionObserver`] performs exactly one action per transition kind
//! against its coordinator and a set of [`RendererHooks`], then hands the
//! router back to `None` for every kind except `Push`.

use std::sync::{Arc, Weak};

use crate::route::{AnyRoute, Route, Screen, ScreenLifecycleEvent};
use crate::router::Router;
use crate::transition::{Transition, TransitionKind, WindowPayload};

use super::core::Coordinator;

/// Side channels the engine cannot perform itself.
pub trait RendererHooks<R>: Send {
    /// A modal presentation flag was raised for `transition`.
    fn present(&mut self, _transition: &Transition<R>) {}

    /// The current modal presentation went away.
    fn dismiss(&mut self) {}

    fn open_window(&mut self, _window: &WindowPayload) {}

    /// `kind` is either `OpenUrl` or `OpenDocument`.
    fn open_url(&mut self, _kind: TransitionKind, _url: &str) {}
}

/// Hooks that ignore every side channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRendererHooks;

impl<R> RendererHooks<R> for NullRendererHooks {}

/// Which modal presentations are currently up.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PresentationState {
    pub present: bool,
    pub sheet: bool,
    pub alert: bool,
    pub action_sheet: bool,
}

impl PresentationState {
    pub fn any(&self) -> bool {
        self.present || self.sheet || self.alert || self.action_sheet
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn raise(&mut self, kind: TransitionKind) {
        match kind {
            TransitionKind::Present => self.present = true,
            TransitionKind::Sheet => self.sheet = true,
            TransitionKind::Alert => self.alert = true,
            TransitionKind::ActionSheet => self.action_sheet = true,
            _ => {}
        }
    }
}

pub struct TransitionObserver<R> {
    router: Router<R>,
    coordinator: Weak<Coordinator>,
    hooks: Box<dyn RendererHooks<R>>,
    state: PresentationState,
    presented: Option<Box<dyn Screen>>,
    last_signal: bool,
    last_sequence: u64,
}

impl<R> std::fmt::Debug for TransitionObserver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionObserver")
            .field("router", &self.router)
            .field("state", &self.state)
            .field(
                "presented",
                &self.presented.as_deref().map(|screen| screen.title()),
            )
            .finish_non_exhaustive()
    }
}

impl TransitionObserver<AnyRoute> {
    /// Observer for the coordinator's own root router.
    pub fn for_root<H>(coordinator: &Arc<Coordinator>, hooks: H) -> Self
    where
        H: RendererHooks<AnyRoute> + 'static,
    {
        Self::new(coordinator.root_router().clone(), coordinator, hooks)
    }
}

impl<R> TransitionObserver<R>
where
    R: Route + Clone,
{
    pub fn new<H>(router: Router<R>, coordinator: &Arc<Coordinator>, hooks: H) -> Self
    where
        H: RendererHooks<R> + 'static,
    {
        Self {
            router,
            last_signal: coordinator.dismiss_signal(),
            coordinator: Arc::downgrade(coordinator),
            hooks: Box::new(hooks),
            state: PresentationState::default(),
            presented: None,
            last_sequence: 0,
        }
    }

    pub fn state(&self) -> PresentationState {
        self.state
    }

    pub fn presented_title(&self) -> Option<&str> {
        self.presented.as_deref().map(|screen| screen.title())
    }

    /// Act on one transition. Returns `false` when nothing was done: the
    /// transition was `None`, was already handled, or the coordinator is gone.
    pub fn handle(&mut self, transition: &Transition<R>) -> bool {
        if transition.is_none() {
            return false;
        }
        if transition.sequence() != 0 && transition.sequence() == self.last_sequence {
            return false;
        }
        let Some(coordinator) = self.coordinator.upgrade() else {
            return false;
        };
        self.last_sequence = transition.sequence();

        match transition.kind {
            TransitionKind::None => {}
            TransitionKind::Push => {
                if let Some(route) = transition.route.as_ref() {
                    coordinator.push(route);
                }
            }
            TransitionKind::Present
            | TransitionKind::Sheet
            | TransitionKind::Alert
            | TransitionKind::ActionSheet => {
                self.state.raise(transition.kind);
                let hosts_screen =
                    matches!(transition.kind, TransitionKind::Present | TransitionKind::Sheet);
                if let Some(route) = transition.route.as_ref().filter(|_| hosts_screen) {
                    self.show(route);
                }
                self.hooks.present(transition);
            }
            TransitionKind::Dismiss => {
                self.state.clear();
                self.hide();
                self.hooks.dismiss();
            }
            TransitionKind::DismissAll => {
                coordinator.dismiss_all_flows();
                self.handle_dismiss_signal(coordinator.dismiss_signal());
            }
            TransitionKind::SelectTab => {
                if let Some(index) = transition.tab_index {
                    coordinator.select_tab(index);
                }
            }
            TransitionKind::Pop => {
                if let Some(stack) = coordinator.active_navigation() {
                    stack.pop();
                }
            }
            TransitionKind::PopToRoot => {
                coordinator.pop_to_root();
            }
            TransitionKind::PopToRoute => {
                if let (Some(stack), Some(route)) =
                    (coordinator.active_navigation(), transition.route.as_ref())
                {
                    stack.pop_to(route);
                }
            }
            TransitionKind::OpenWindow => {
                if let Some(window) = transition.window.as_ref() {
                    self.hooks.open_window(window);
                }
            }
            TransitionKind::OpenUrl | TransitionKind::OpenDocument => {
                if let Some(url) = transition.url.as_deref() {
                    self.hooks.open_url(transition.kind, url);
                }
            }
        }

        if transition.kind.requires_reset() {
            self.router.complete(transition);
        }
        true
    }

    /// React to an edge of the coordinator's dismiss-all signal by dropping
    /// every presentation.
    pub fn handle_dismiss_signal(&mut self, value: bool) {
        if value == self.last_signal {
            return;
        }
        self.last_signal = value;
        let had_presentation = self.state.any() || self.presented.is_some();
        self.state.clear();
        self.hide();
        if had_presentation {
            self.hooks.dismiss();
        }
    }

    /// Run the observer as a task in the coordinator's cancel bag.
    ///
    /// The current transition is handled first; afterwards each wake-up reads
    /// only the newest transition, so intents replaced before the task ran are
    /// never acted on. The loop ends when the task is cancelled, the router is
    /// dropped, or the coordinator goes away. Returns the task identifier, or
    /// `None` outside a tokio runtime or when the coordinator is already gone.
    pub fn spawn(mut self) -> Option<String> {
        let coordinator = self.coordinator.upgrade()?;
        let id = format!("observer.{}", self.router.label());
        let mut transitions = self.router.subscribe();
        let mut signals = coordinator.dismiss_signals();

        coordinator
            .tasks()
            .spawn(Some(id.as_str()), move |token| async move {
                let initial = transitions.borrow_and_update().clone();
                self.handle(&initial);
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        changed = transitions.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let transition = transitions.borrow_and_update().clone();
                            self.handle(&transition);
                        }
                        signal = signals.next_or_cancelled(&token) => match signal {
                            Some(value) => self.handle_dismiss_signal(value),
                            None => break,
                        },
                    }
                }
            })
    }

    fn show(&mut self, route: &R) {
        if let Some(previous) = self.presented.as_mut() {
            previous.on_lifecycle(ScreenLifecycleEvent::WillDisappear);
        }

        let mut next = route.screen();
        next.on_lifecycle(ScreenLifecycleEvent::WillAppear);
        next.on_lifecycle(ScreenLifecycleEvent::DidAppear);

        if let Some(mut previous) = self.presented.take() {
            previous.on_lifecycle(ScreenLifecycleEvent::DidDisappear);
        }
        self.presented = Some(next);
    }

    fn hide(&mut self) {
        if let Some(mut screen) = self.presented.take() {
            screen.on_lifecycle(ScreenLifecycleEvent::WillDisappear);
            screen.on_lifecycle(ScreenLifecycleEvent::DidDisappear);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{DynamicRoute, ScreenFactory};
    use crate::transition::AlertPayload;
    use std::sync::Mutex;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct JournalScreen {
        title: String,
        journal: Journal,
    }

    impl Screen for JournalScreen {
        fn title(&self) -> &str {
            &self.title
        }

        fn on_lifecycle(&mut self, event: ScreenLifecycleEvent) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{event:?}", self.title));
        }
    }

    #[derive(Clone, Default)]
    struct JournalHooks {
        journal: Journal,
    }

    impl<R> RendererHooks<R> for JournalHooks {
        fn present(&mut self, transition: &Transition<R>) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("present:{}", transition.kind));
        }

        fn dismiss(&mut self) {
            self.journal.lock().unwrap().push("dismiss".into());
        }

        fn open_url(&mut self, kind: TransitionKind, url: &str) {
            self.journal.lock().unwrap().push(format!("{kind}:{url}"));
        }
    }

    fn journal_route(path: &str, journal: &Journal) -> AnyRoute {
        let title = path.to_string();
        let journal = Arc::clone(journal);
        let factory: ScreenFactory = Arc::new(move || {
            Box::new(JournalScreen {
                title: title.clone(),
                journal: Arc::clone(&journal),
            }) as Box<dyn Screen>
        });
        AnyRoute::new(DynamicRoute::new(path, factory))
    }

    fn setup() -> (Arc<Coordinator>, TransitionObserver<AnyRoute>, Journal) {
        let coordinator = Coordinator::builder("main")
            .stacks(["home", "search"])
            .build()
            .unwrap();
        coordinator.register_active_navigation("home").unwrap();
        let hooks = JournalHooks::default();
        let journal = Arc::clone(&hooks.journal);
        let observer = TransitionObserver::for_root(&coordinator, hooks);
        (coordinator, observer, journal)
    }

    #[test]
    fn sheet_raises_flag_and_resets_router() {
        let (coordinator, mut observer, journal) = setup();
        let router = coordinator.root_router();
        let issued = router.sheet(journal_route("a_sheet", &journal));

        assert!(observer.handle(&issued));
        assert!(observer.state().sheet);
        assert_eq!(observer.presented_title(), Some("a_sheet"));
        assert!(router.transition().is_none());
        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "a_sheet:WillAppear".to_string(),
                "a_sheet:DidAppear".to_string(),
                "present:sheet".to_string(),
            ]
        );
    }

    #[test]
    fn push_lands_on_active_stack_and_is_not_reset() {
        let (coordinator, mut observer, journal) = setup();
        let issued = coordinator.root_router().push(journal_route("h_detail", &journal));

        assert!(observer.handle(&issued));
        assert!(!observer.handle(&issued));
        assert_eq!(
            coordinator.stack("home").unwrap().logical_stack(),
            vec!["h_detail"]
        );
        assert_eq!(coordinator.root_router().transition().kind, TransitionKind::Push);
    }

    #[test]
    fn dismiss_runs_disappear_lifecycle() {
        let (coordinator, mut observer, journal) = setup();
        let router = coordinator.root_router();
        observer.handle(&router.present(journal_route("a_modal", &journal)));
        journal.lock().unwrap().clear();

        observer.handle(&router.dismiss());
        assert!(!observer.state().any());
        assert_eq!(observer.presented_title(), None);
        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "a_modal:WillDisappear".to_string(),
                "a_modal:DidDisappear".to_string(),
                "dismiss".to_string(),
            ]
        );
    }

    #[test]
    fn dismiss_all_clears_flags_and_stacks() {
        let (coordinator, mut observer, journal) = setup();
        let router = coordinator.root_router();
        coordinator.push(&journal_route("h_one", &journal));
        observer.handle(&router.show_alert(AlertPayload::new("Hi")));
        assert!(observer.state().alert);

        observer.handle(&router.dismiss_all());
        assert!(!observer.state().any());
        assert!(coordinator.stack("home").unwrap().is_empty());
        assert!(router.transition().is_none());
    }

    #[test]
    fn stack_and_tab_kinds_drive_coordinator() {
        let (coordinator, mut observer, journal) = setup();
        let router = coordinator.root_router();
        for path in ["h_a", "h_b", "h_a", "h_c"] {
            coordinator.push(&journal_route(path, &journal));
        }

        observer.handle(&router.pop_to(journal_route("h_a", &journal)));
        assert_eq!(
            coordinator.stack("home").unwrap().logical_stack(),
            vec!["h_a", "h_b", "h_a"]
        );
        observer.handle(&router.pop());
        assert_eq!(coordinator.stack("home").unwrap().len(), 2);
        observer.handle(&router.pop_to_root());
        assert!(coordinator.stack("home").unwrap().is_empty());

        observer.handle(&router.select_tab(2));
        assert_eq!(coordinator.tabs().selection(), 2);
    }

    #[test]
    fn url_kinds_go_to_hooks() {
        let (coordinator, mut observer, journal) = setup();
        observer.handle(&coordinator.root_router().open_document("file:///notes.md"));
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["open_document:file:///notes.md".to_string()]
        );
    }

    #[test]
    fn dismiss_signal_edges_drop_presentations() {
        let (coordinator, mut observer, journal) = setup();
        observer.handle(&coordinator.root_router().sheet(journal_route("a_sheet", &journal)));

        observer.handle_dismiss_signal(false);
        assert!(observer.state().sheet);

        coordinator.dismiss_all();
        observer.handle_dismiss_signal(coordinator.dismiss_signal());
        assert!(!observer.state().any());
    }

    #[test]
    fn child_dismiss_all_drops_parent_presentation() {
        let (parent, mut parent_observer, _journal) = setup();
        let child = Coordinator::builder("wizard").stack("steps").build().unwrap();
        let mut child_observer = TransitionObserver::for_root(&child, NullRendererHooks);

        parent_observer.handle(&parent.open_child(&child, TransitionKind::Sheet));
        assert!(parent_observer.state().sheet);
        assert_eq!(parent_observer.presented_title(), Some("wizard"));

        assert!(child_observer.handle(&child.root_router().dismiss_all()));
        parent_observer.handle_dismiss_signal(parent.dismiss_signal());
        assert!(!parent_observer.state().any());
        assert_eq!(parent_observer.presented_title(), None);
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn spawned_observer_consumes_transitions() {
        let (coordinator, observer, journal) = setup();
        let id = observer.spawn().unwrap();
        assert!(coordinator.tasks().contains(&id));

        coordinator.root_router().sheet(journal_route("a_sheet", &journal));
        settle().await;
        assert!(coordinator.root_router().transition().is_none());

        coordinator.tasks().cancel(&id);
        coordinator.root_router().sheet(journal_route("a_sheet", &journal));
        settle().await;
        assert_eq!(coordinator.root_router().transition().kind, TransitionKind::Sheet);
    }

    #[tokio::test]
    async fn spawned_observer_acts_only_on_newest_intent() {
        let (coordinator, observer, journal) = setup();
        observer.spawn().unwrap();
        let router = coordinator.root_router();

        router.push(journal_route("h_first", &journal));
        router.push(journal_route("h_second", &journal));
        settle().await;
        assert_eq!(
            coordinator.stack("home").unwrap().logical_stack(),
            vec!["h_second"]
        );

        journal.lock().unwrap().clear();
        router.sheet(AnyRoute::new(DynamicRoute::titled("a_sheet")));
        router.present(AnyRoute::new(DynamicRoute::titled("a_modal")));
        settle().await;
        assert_eq!(*journal.lock().unwrap(), vec!["present:present".to_string()]);
        assert!(router.transition().is_none());
    }

    #[tokio::test]
    async fn spawned_child_dismiss_all_reaches_parent_observer() {
        let (parent, observer, journal) = setup();
        observer.spawn().unwrap();
        let child = Coordinator::builder("wizard").stack("steps").build().unwrap();
        TransitionObserver::for_root(&child, NullRendererHooks)
            .spawn()
            .unwrap();

        parent.open_child(&child, TransitionKind::Sheet);
        settle().await;
        assert_eq!(*journal.lock().unwrap(), vec!["present:sheet".to_string()]);

        child.root_router().dismiss_all();
        settle().await;
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["present:sheet".to_string(), "dismiss".to_string()]
        );
        assert!(parent.dismiss_signal());
        assert!(child.root_router().transition().is_none());
    }
}
