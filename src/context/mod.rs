//! Root context: the active-coordinator registry and routing programs.

mod audit;
mod command;
mod core;

pub use self::core::RootContext;
pub use audit::{
    BufferedRoutingAudit, NullRoutingAudit, RoutingAudit, RoutingAuditEvent,
    RoutingAuditEventBuilder, RoutingAuditStage,
};
pub use command::{ProgramReport, RoutingCommand};
