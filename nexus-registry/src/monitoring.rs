use std::collections::HashMap;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOp {
    Gt,
    Lt,
    Eq,
}

/// `Metrics`/`Logs` sink contract. The concrete ring buffers live in
/// `nexus-server::monitoring` (it is a room-runtime concern, not an
/// external collaborator), but the tick loop and replication pipeline only
/// depend on this trait, so tests can swap in a recording double without
/// pulling in the whole monitoring core.
#[async_trait]
pub trait Monitoring: Send + Sync {
    fn record_metric(&self, name: &str, value: f64, tags: &HashMap<String, String>);
    fn log(&self, level: LogLevel, message: &str, context: &HashMap<String, String>);
}
