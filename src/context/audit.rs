//! Routing audit hooks.
//!
//! Records capture a stage plus structured details so hosts can log, buffer or
//! replay what the root context did without reaching into its internals.

use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use serde_json::Value;

/// Checkpoints emitted by [`super::RootContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingAuditStage {
    /// A coordinator joined the active list.
    CoordinatorRegistered,
    /// A coordinator left the active list.
    CoordinatorResigned,
    /// A routing program acquired the program lock.
    ProgramStarted,
    /// A command found its target and ran.
    CommandApplied,
    /// A command had no target and was passed over.
    CommandSkipped,
    /// A routing program released the program lock.
    ProgramFinished,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct RoutingAuditEvent {
    pub timestamp: SystemTime,
    pub stage: RoutingAuditStage,
    pub details: Vec<(String, Value)>,
}

impl RoutingAuditEvent {
    fn new(stage: RoutingAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Builder helper to append fields ergonomically.
pub struct RoutingAuditEventBuilder {
    event: RoutingAuditEvent,
}

impl RoutingAuditEventBuilder {
    pub fn new(stage: RoutingAuditStage) -> Self {
        Self {
            event: RoutingAuditEvent::new(stage),
        }
    }

    pub fn detail(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.event.details.push((key.into(), value.into()));
        self
    }

    pub fn finish(self) -> RoutingAuditEvent {
        self.event
    }
}

/// Trait implemented by any audit sink.
pub trait RoutingAudit: Send + Sync {
    fn record(&self, event: RoutingAuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullRoutingAudit;

impl RoutingAudit for NullRoutingAudit {
    fn record(&self, _event: RoutingAuditEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct BufferedRoutingAudit {
    events: Mutex<Vec<RoutingAuditEvent>>,
}

impl BufferedRoutingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RoutingAuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stages(&self) -> Vec<RoutingAuditStage> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.stage)
            .collect()
    }
}

impl RoutingAudit for BufferedRoutingAudit {
    fn record(&self, event: RoutingAuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_details() {
        let mut builder = RoutingAuditEventBuilder::new(RoutingAuditStage::CommandSkipped);
        builder.detail("command", "push").detail("index", 2);
        let event = builder.finish();

        assert_eq!(event.stage, RoutingAuditStage::CommandSkipped);
        assert_eq!(event.detail("command"), Some(&Value::from("push")));
        assert_eq!(event.detail("index"), Some(&Value::from(2)));
        assert!(event.detail("missing").is_none());
    }

    #[test]
    fn buffered_audit_keeps_order() {
        let audit = BufferedRoutingAudit::new();
        audit.record(RoutingAuditEventBuilder::new(RoutingAuditStage::ProgramStarted).finish());
        audit.record(RoutingAuditEventBuilder::new(RoutingAuditStage::ProgramFinished).finish());
        assert_eq!(
            audit.stages(),
            vec![
                RoutingAuditStage::ProgramStarted,
                RoutingAuditStage::ProgramFinished
            ]
        );
    }
}
