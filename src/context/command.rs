use std::time::Duration;

use crate::config::NavigatorConfig;
use crate::error::{NavError, Result};
use crate::route::{AnyRoute, Route};
use crate::transition::WindowPayload;

/// One step of a routing program.
#[derive(Debug, Clone)]
pub enum RoutingCommand {
    /// Reset every active coordinator: toggle its dismiss-all signal, pop every
    /// stack to root and clear its root router.
    ResetAll,
    /// Dismiss every presentation of every active coordinator.
    DismissAll,
    /// Pop the target's active stack to root.
    PopToRoot,
    SelectTab(usize),
    /// Push onto the target's active stack.
    Push(AnyRoute),
    Sheet(AnyRoute),
    Present(AnyRoute),
    OpenWindow(WindowPayload),
    /// Pause for the given duration instead of the settle delay.
    Wait(Duration),
}

impl RoutingCommand {
    pub fn push<R: Route>(route: R) -> Self {
        RoutingCommand::Push(AnyRoute::new(route))
    }

    pub fn sheet<R: Route>(route: R) -> Self {
        RoutingCommand::Sheet(AnyRoute::new(route))
    }

    pub fn present<R: Route>(route: R) -> Self {
        RoutingCommand::Present(AnyRoute::new(route))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RoutingCommand::ResetAll => "reset_all",
            RoutingCommand::DismissAll => "dismiss_all",
            RoutingCommand::PopToRoot => "pop_to_root",
            RoutingCommand::SelectTab(_) => "select_tab",
            RoutingCommand::Push(_) => "push",
            RoutingCommand::Sheet(_) => "sheet",
            RoutingCommand::Present(_) => "present",
            RoutingCommand::OpenWindow(_) => "open_window",
            RoutingCommand::Wait(_) => "wait",
        }
    }

    /// Reject malformed arguments before a program starts.
    pub fn validate(&self) -> Result<()> {
        match self {
            RoutingCommand::Wait(duration) if duration.is_zero() => Err(
                NavError::InvalidCommand("wait duration must be greater than zero".into()),
            ),
            RoutingCommand::OpenWindow(window) if window.id.trim().is_empty() => Err(
                NavError::InvalidCommand("open_window requires a window id".into()),
            ),
            RoutingCommand::Push(route)
            | RoutingCommand::Sheet(route)
            | RoutingCommand::Present(route)
                if route.path().is_empty() =>
            {
                Err(NavError::InvalidCommand(format!(
                    "{} requires a route with a non-empty path",
                    self.name()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Pause inserted after this command has run.
    pub fn settle_delay(&self, config: &NavigatorConfig) -> Duration {
        match self {
            RoutingCommand::Wait(duration) => *duration,
            _ => config.effective_settle_delay(),
        }
    }

    /// Route path carried by the command, for logging.
    pub fn route_path(&self) -> Option<String> {
        match self {
            RoutingCommand::Push(route)
            | RoutingCommand::Sheet(route)
            | RoutingCommand::Present(route) => Some(route.path()),
            _ => None,
        }
    }
}

/// Outcome of a routing program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramReport {
    pub applied: usize,
    pub skipped: usize,
}

impl ProgramReport {
    pub fn total(&self) -> usize {
        self.applied + self.skipped
    }

    pub fn is_complete(&self) -> bool {
        self.skipped == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::DynamicRoute;

    #[test]
    fn validation_rejects_malformed_arguments() {
        assert!(matches!(
            RoutingCommand::Wait(Duration::ZERO).validate(),
            Err(NavError::InvalidCommand(_))
        ));
        assert!(RoutingCommand::OpenWindow(WindowPayload::new(" ")).validate().is_err());
        assert!(RoutingCommand::push(DynamicRoute::titled("")).validate().is_err());
        assert!(RoutingCommand::Wait(Duration::from_millis(10)).validate().is_ok());
        assert!(RoutingCommand::ResetAll.validate().is_ok());
    }

    #[test]
    fn wait_replaces_settle_delay() {
        let config = NavigatorConfig::default();
        assert_eq!(
            RoutingCommand::Wait(Duration::from_millis(250)).settle_delay(&config),
            Duration::from_millis(250)
        );
        assert_eq!(
            RoutingCommand::SelectTab(1).settle_delay(&config),
            Duration::from_millis(600)
        );
    }
}
