use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{Value, json};
use tokio::time::Instant;

use crate::config::NavigatorConfig;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::logging::{LogLevel, TARGET_CONTEXT, emit, json_kv};
use crate::route::AnyRoute;
use crate::transition::{Transition, TransitionKind};

use super::audit::{
    NullRoutingAudit, RoutingAudit, RoutingAuditEventBuilder, RoutingAuditStage,
};
use super::command::{ProgramReport, RoutingCommand};

/// Which coordinators a program addresses.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Current,
    Identified(&'a str),
}

/// Registry of active coordinators and executor of routing programs.
///
/// Coordinators are held weakly, ordered as a stack whose top is the current
/// flow. Dead entries are pruned on every read and write. Programs run one at
/// a time; a second program waits until the first has finished.
pub struct RootContext {
    coordinators: Mutex<Vec<Weak<Coordinator>>>,
    programs: tokio::sync::Mutex<()>,
    next_program: AtomicU64,
    audit: Arc<dyn RoutingAudit>,
    config: NavigatorConfig,
    started: Instant,
}

impl std::fmt::Debug for RootContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootContext")
            .field("active", &self.active_identifiers())
            .field("settle_delay", &self.config.effective_settle_delay())
            .finish_non_exhaustive()
    }
}

impl Default for RootContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RootContext {
    pub fn new() -> Self {
        Self::with_config(NavigatorConfig::default())
    }

    pub fn with_config(config: NavigatorConfig) -> Self {
        Self {
            coordinators: Mutex::new(Vec::new()),
            programs: tokio::sync::Mutex::new(()),
            next_program: AtomicU64::new(1),
            audit: Arc::new(NullRoutingAudit),
            config,
            started: Instant::now(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn RoutingAudit>) -> Self {
        self.audit = audit;
        self
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Add `coordinator` on top of the active list. Registering an identifier
    /// that is already active is a no-op; returns whether it was added.
    pub fn register(&self, coordinator: &Arc<Coordinator>) -> bool {
        let identifier = coordinator.identifier();
        {
            let mut coordinators = self.lock();
            if coordinators
                .iter()
                .filter_map(Weak::upgrade)
                .any(|active| active.identifier() == identifier)
            {
                return false;
            }
            coordinators.push(Arc::downgrade(coordinator));
        }

        self.record(RoutingAuditStage::CoordinatorRegistered, |builder| {
            builder.detail("coordinator", identifier);
        });
        self.log(
            LogLevel::Debug,
            "coordinator_registered",
            [json_kv("coordinator", json!(identifier))],
        );
        true
    }

    /// Remove the coordinator with `identifier`; a missing one is a no-op.
    pub fn resign(&self, identifier: &str) -> bool {
        let removed = {
            let mut coordinators = self.lock();
            let before = coordinators.len();
            coordinators.retain(|weak| {
                weak.upgrade()
                    .is_some_and(|active| active.identifier() != identifier)
            });
            before != coordinators.len()
        };
        if removed {
            self.record(RoutingAuditStage::CoordinatorResigned, |builder| {
                builder.detail("coordinator", identifier);
            });
            self.log(
                LogLevel::Debug,
                "coordinator_resigned",
                [json_kv("coordinator", json!(identifier))],
            );
        }
        removed
    }

    /// Live coordinators, bottom to top.
    pub fn active_coordinators(&self) -> Vec<Arc<Coordinator>> {
        self.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn active_identifiers(&self) -> Vec<String> {
        self.active_coordinators()
            .iter()
            .map(|coordinator| coordinator.identifier().to_string())
            .collect()
    }

    /// The most recently registered live coordinator.
    pub fn current(&self) -> Option<Arc<Coordinator>> {
        self.lock().iter().rev().find_map(Weak::upgrade)
    }

    pub fn coordinator(&self, identifier: &str) -> Option<Arc<Coordinator>> {
        self.active_coordinators()
            .into_iter()
            .find(|coordinator| coordinator.identifier() == identifier)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Present `child` from `parent` and make it the current flow.
    pub fn open_child(
        &self,
        parent: &Arc<Coordinator>,
        child: &Arc<Coordinator>,
        kind: TransitionKind,
    ) -> Transition<AnyRoute> {
        let issued = parent.open_child(child, kind);
        self.register(child);
        issued
    }

    /// Dismiss `child` from its parent and drop it from the active list.
    pub fn close_child(&self, child: &Coordinator) -> bool {
        let closed = child.close();
        let resigned = self.resign(child.identifier());
        closed || resigned
    }

    /// Run `commands` in order against the current coordinator, pausing for
    /// the settle delay after each one.
    ///
    /// Every command is validated before the first one runs. A command with no
    /// target is skipped; earlier effects stay in place.
    pub async fn routing<I>(&self, commands: I) -> Result<ProgramReport>
    where
        I: IntoIterator<Item = RoutingCommand>,
    {
        let commands: Vec<RoutingCommand> = commands.into_iter().collect();
        self.run_program(Target::Current, commands).await
    }

    /// Like [`RootContext::routing`], addressed to the active coordinator
    /// with `identifier`.
    pub async fn routing_in<I>(&self, identifier: &str, commands: I) -> Result<ProgramReport>
    where
        I: IntoIterator<Item = RoutingCommand>,
    {
        let commands: Vec<RoutingCommand> = commands.into_iter().collect();
        self.run_program(Target::Identified(identifier), commands)
            .await
    }

    async fn run_program(
        &self,
        target: Target<'_>,
        commands: Vec<RoutingCommand>,
    ) -> Result<ProgramReport> {
        for command in &commands {
            command.validate()?;
        }

        let _program = self.programs.lock().await;
        let program = self.next_program.fetch_add(1, Ordering::Relaxed);
        self.record(RoutingAuditStage::ProgramStarted, |builder| {
            builder
                .detail("program", program)
                .detail("commands", commands.len());
        });
        self.log(
            LogLevel::Info,
            "program_started",
            [
                json_kv("program", json!(program)),
                json_kv("commands", json!(commands.len())),
            ],
        );

        let mut report = ProgramReport::default();
        for (index, command) in commands.iter().enumerate() {
            let applied = self.apply(target, command);
            let stage = if applied {
                report.applied += 1;
                RoutingAuditStage::CommandApplied
            } else {
                report.skipped += 1;
                RoutingAuditStage::CommandSkipped
            };
            self.record(stage, |builder| {
                builder
                    .detail("program", program)
                    .detail("index", index)
                    .detail("command", command.name());
                if let Some(path) = command.route_path() {
                    builder.detail("route", path);
                }
            });
            self.log(
                if applied { LogLevel::Debug } else { LogLevel::Warn },
                if applied { "command_applied" } else { "command_skipped" },
                [
                    json_kv("program", json!(program)),
                    json_kv("index", json!(index)),
                    json_kv("command", json!(command.name())),
                    json_kv("route", json!(command.route_path())),
                ],
            );

            tokio::time::sleep(command.settle_delay(&self.config)).await;
        }

        self.config
            .record(|metrics| metrics.record_program(report.applied, report.skipped));
        self.record(RoutingAuditStage::ProgramFinished, |builder| {
            builder
                .detail("program", program)
                .detail("applied", report.applied)
                .detail("skipped", report.skipped);
        });
        self.log(
            LogLevel::Info,
            "program_finished",
            [
                json_kv("program", json!(program)),
                json_kv("applied", json!(report.applied)),
                json_kv("skipped", json!(report.skipped)),
            ],
        );
        self.config.emit_metrics(self.started.elapsed());
        Ok(report)
    }

    fn apply(&self, target: Target<'_>, command: &RoutingCommand) -> bool {
        match command {
            RoutingCommand::Wait(_) => true,
            RoutingCommand::ResetAll => {
                let active = self.active_coordinators();
                active.iter().for_each(|coordinator| {
                    coordinator.reset();
                });
                !active.is_empty()
            }
            RoutingCommand::DismissAll => {
                let active = self.active_coordinators();
                active.iter().for_each(|coordinator| {
                    coordinator.dismiss_all();
                });
                !active.is_empty()
            }
            _ => {
                let Some(coordinator) = self.resolve(target) else {
                    return false;
                };
                match command {
                    RoutingCommand::PopToRoot => {
                        coordinator.active_navigation().is_some_and(|stack| {
                            stack.pop_to_root();
                            true
                        })
                    }
                    RoutingCommand::SelectTab(index) => {
                        coordinator.select_tab(*index);
                        true
                    }
                    RoutingCommand::Push(route) => coordinator.push(route),
                    RoutingCommand::Sheet(route) => {
                        coordinator.root_router().sheet(route.clone());
                        true
                    }
                    RoutingCommand::Present(route) => {
                        coordinator.root_router().present(route.clone());
                        true
                    }
                    RoutingCommand::OpenWindow(window) => {
                        coordinator.root_router().open_window(window.clone());
                        true
                    }
                    RoutingCommand::ResetAll
                    | RoutingCommand::DismissAll
                    | RoutingCommand::Wait(_) => true,
                }
            }
        }
    }

    fn resolve(&self, target: Target<'_>) -> Option<Arc<Coordinator>> {
        match target {
            Target::Current => self.current(),
            Target::Identified(identifier) => self.coordinator(identifier),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Weak<Coordinator>>> {
        let mut coordinators = self
            .coordinators
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        coordinators.retain(|weak| weak.strong_count() > 0);
        coordinators
    }

    fn record<F>(&self, stage: RoutingAuditStage, fill: F)
    where
        F: FnOnce(&mut RoutingAuditEventBuilder),
    {
        let mut builder = RoutingAuditEventBuilder::new(stage);
        fill(&mut builder);
        self.audit.record(builder.finish());
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        emit(self.config.logger.as_ref(), level, TARGET_CONTEXT, message, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NavError;
    use crate::context::BufferedRoutingAudit;
    use crate::logging::{Logger, MemorySink};
    use crate::metrics::DEFAULT_METRICS_TARGET;
    use crate::navigation::NavigationPath;
    use crate::route::DynamicRoute;
    use std::time::Duration;

    fn coordinator(id: &str) -> Arc<Coordinator> {
        Coordinator::builder(id)
            .stacks(["home", "search"])
            .build()
            .unwrap()
    }

    fn fill_stacks(coordinator: &Coordinator) {
        for name in ["home", "search"] {
            let stack = coordinator.stack(name).unwrap();
            stack.did_appear();
            stack.push(&DynamicRoute::titled("a_one"));
            stack.push(&DynamicRoute::titled("a_two"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reset_all_empties_every_stack_and_toggles_signal_once() {
        let context = RootContext::new();
        let first = coordinator("first");
        let second = coordinator("second");
        fill_stacks(&first);
        fill_stacks(&second);
        context.register(&first);
        context.register(&second);
        let mut signals = [first.dismiss_signals(), second.dismiss_signals()];

        let report = context.routing([RoutingCommand::ResetAll]).await.unwrap();

        assert_eq!(report, ProgramReport { applied: 1, skipped: 0 });
        for coordinator in [&first, &second] {
            assert!(coordinator.stacks().iter().all(NavigationPath::is_empty));
        }
        for signal in signals.iter_mut() {
            assert_eq!(signal.drain(), vec![false, true]);
        }
    }

    #[test]
    fn registration_is_idempotent() {
        let context = RootContext::new();
        let main = coordinator("main");
        assert!(context.register(&main));
        assert!(!context.register(&main));
        assert!(!context.register(&coordinator("main")));
        assert_eq!(context.len(), 1);

        assert!(context.resign("main"));
        assert!(!context.resign("main"));
        assert!(context.is_empty());
    }

    #[test]
    fn dead_coordinators_are_pruned() {
        let context = RootContext::new();
        let main = coordinator("main");
        let modal = coordinator("modal");
        context.register(&main);
        context.register(&modal);
        assert_eq!(context.current().map(|c| c.identifier().to_string()), Some("modal".into()));

        drop(modal);
        assert_eq!(context.active_identifiers(), vec!["main".to_string()]);
        assert_eq!(context.current().map(|c| c.identifier().to_string()), Some("main".into()));
        assert_eq!(context.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_separated_by_settle_delay() {
        let context = RootContext::new();
        let main = coordinator("main");
        main.register_active_navigation("home").unwrap();
        context.register(&main);

        let started = Instant::now();
        context
            .routing([
                RoutingCommand::SelectTab(1),
                RoutingCommand::push(DynamicRoute::titled("h_detail")),
            ])
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(1200));
        assert_eq!(main.tabs().selection(), 1);
        assert_eq!(main.stack("home").unwrap().logical_stack(), vec!["h_detail"]);

        let started = Instant::now();
        context
            .routing([RoutingCommand::Wait(Duration::from_millis(250))])
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_respects_floor() {
        let config = NavigatorConfig::default().with_settle_delay(Duration::from_millis(50));
        let context = RootContext::with_config(config);
        let started = Instant::now();
        context.routing([RoutingCommand::PopToRoot]).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_target_skips_without_rollback() {
        let context = RootContext::new();
        let bare = Coordinator::builder("bare").build().unwrap();
        context.register(&bare);

        let report = context
            .routing([
                RoutingCommand::SelectTab(3),
                RoutingCommand::push(DynamicRoute::titled("h_detail")),
            ])
            .await
            .unwrap();

        assert_eq!(report, ProgramReport { applied: 1, skipped: 1 });
        assert!(!report.is_complete());
        assert_eq!(bare.tabs().selection(), 3);

        let empty = RootContext::new();
        let report = empty.routing([RoutingCommand::ResetAll]).await.unwrap();
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_program_is_rejected_before_running() {
        let context = RootContext::new();
        let main = coordinator("main");
        context.register(&main);

        let result = context
            .routing([RoutingCommand::SelectTab(2), RoutingCommand::Wait(Duration::ZERO)])
            .await;
        assert!(matches!(result, Err(NavError::InvalidCommand(_))));
        assert_eq!(main.tabs().selection(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn targeted_program_addresses_named_coordinator() {
        let context = RootContext::new();
        let main = coordinator("main");
        let modal = coordinator("modal");
        context.register(&main);
        context.register(&modal);

        context
            .routing_in("main", [RoutingCommand::sheet(DynamicRoute::titled("a_sheet"))])
            .await
            .unwrap();
        assert_eq!(main.root_router().transition().kind, TransitionKind::Sheet);
        assert!(modal.root_router().transition().is_none());

        let report = context
            .routing_in("gone", [RoutingCommand::SelectTab(1)])
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn programs_never_overlap() {
        let audit = Arc::new(BufferedRoutingAudit::new());
        let context = Arc::new(RootContext::new().with_audit(audit.clone()));
        let main = coordinator("main");
        context.register(&main);

        let first = {
            let context = Arc::clone(&context);
            tokio::spawn(async move {
                context
                    .routing([RoutingCommand::SelectTab(1), RoutingCommand::SelectTab(2)])
                    .await
            })
        };
        let second = {
            let context = Arc::clone(&context);
            tokio::spawn(async move { context.routing([RoutingCommand::PopToRoot]).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let program_stages: Vec<_> = audit
            .stages()
            .into_iter()
            .filter(|stage| {
                matches!(
                    stage,
                    RoutingAuditStage::ProgramStarted | RoutingAuditStage::ProgramFinished
                )
            })
            .collect();
        assert_eq!(
            program_stages,
            vec![
                RoutingAuditStage::ProgramStarted,
                RoutingAuditStage::ProgramFinished,
                RoutingAuditStage::ProgramStarted,
                RoutingAuditStage::ProgramFinished,
            ]
        );
    }

    #[test]
    fn child_flows_become_current_and_resign_on_close() {
        let context = RootContext::new();
        let main = coordinator("main");
        let child = coordinator("child");
        context.register(&main);

        let issued = context.open_child(&main, &child, TransitionKind::Sheet);
        assert_eq!(issued.kind, TransitionKind::Sheet);
        assert_eq!(context.current().map(|c| c.identifier().to_string()), Some("child".into()));

        assert!(context.close_child(&child));
        assert_eq!(main.root_router().transition().kind, TransitionKind::Dismiss);
        assert_eq!(context.active_identifiers(), vec!["main".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn programs_are_logged_and_counted() {
        let sink = Arc::new(MemorySink::new());
        let mut config = NavigatorConfig::default().with_logger(Logger::from_shared(sink.clone()));
        config.enable_metrics();
        let context = RootContext::with_config(config.clone());
        context
            .routing([RoutingCommand::DismissAll, RoutingCommand::Wait(Duration::from_millis(5))])
            .await
            .unwrap();

        assert_eq!(
            sink.messages(),
            vec![
                "program_started".to_string(),
                "command_skipped".to_string(),
                "command_applied".to_string(),
                "program_finished".to_string(),
                "navigation_metrics".to_string(),
            ]
        );
        let snapshot_event = sink.events().pop().unwrap();
        assert_eq!(snapshot_event.target, DEFAULT_METRICS_TARGET);
        assert_eq!(snapshot_event.field("programs"), Some(&json!(1)));
        let uptime = snapshot_event.field("uptime_ms").and_then(Value::as_u64).unwrap();
        assert!(uptime >= 605, "uptime {uptime}ms");

        let metrics = config.metrics_handle().unwrap();
        let snapshot = metrics.lock().unwrap().snapshot(Duration::ZERO);
        assert_eq!(snapshot.programs, 1);
        assert_eq!(snapshot.commands_skipped, 1);
    }
}
