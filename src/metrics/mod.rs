use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_METRICS_TARGET: &str = "room_nav::metrics";

#[derive(Debug, Default, Clone)]
pub struct NavigationMetrics {
    transitions: u64,
    pushes: u64,
    pops: u64,
    reconciliations: u64,
    double_taps: u64,
    programs: u64,
    commands_applied: u64,
    commands_skipped: u64,
}

impl NavigationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&mut self) {
        self.transitions = self.transitions.saturating_add(1);
    }

    pub fn record_push(&mut self) {
        self.pushes = self.pushes.saturating_add(1);
    }

    pub fn record_pops(&mut self, count: usize) {
        if count > 0 {
            self.pops = self.pops.saturating_add(count as u64);
        }
    }

    pub fn record_reconciliation(&mut self) {
        self.reconciliations = self.reconciliations.saturating_add(1);
    }

    pub fn record_double_tap(&mut self) {
        self.double_taps = self.double_taps.saturating_add(1);
    }

    pub fn record_program(&mut self, applied: usize, skipped: usize) {
        self.programs = self.programs.saturating_add(1);
        self.commands_applied = self.commands_applied.saturating_add(applied as u64);
        self.commands_skipped = self.commands_skipped.saturating_add(skipped as u64);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            transitions: self.transitions,
            pushes: self.pushes,
            pops: self.pops,
            reconciliations: self.reconciliations,
            double_taps: self.double_taps,
            programs: self.programs,
            commands_applied: self.commands_applied,
            commands_skipped: self.commands_skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub transitions: u64,
    pub pushes: u64,
    pub pops: u64,
    pub reconciliations: u64,
    pub double_taps: u64,
    pub programs: u64,
    pub commands_applied: u64,
    pub commands_skipped: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "navigation_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("transitions".to_string(), json!(self.transitions));
        map.insert("pushes".to_string(), json!(self.pushes));
        map.insert("pops".to_string(), json!(self.pops));
        map.insert("reconciliations".to_string(), json!(self.reconciliations));
        map.insert("double_taps".to_string(), json!(self.double_taps));
        map.insert("programs".to_string(), json!(self.programs));
        map.insert("commands_applied".to_string(), json!(self.commands_applied));
        map.insert("commands_skipped".to_string(), json!(self.commands_skipped));
        map
    }
}
