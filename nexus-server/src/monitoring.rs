//! In-memory monitoring core: bounded ring buffers for metrics and logs,
//! plus a small alert evaluator. Implements `nexus_registry::Monitoring` so
//! the room and replication pipeline only ever depend on the trait; every
//! call here also emits a `log` crate record, treating that as ambient
//! integration rather than an optional extra.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nexus_core::constants::{
    ALERT_ESCALATION_AFTER, ALERT_EVALUATION_INTERVAL, ALERT_WINDOW, LOGS_RING_CAP, METRICS_RING_CAP,
};
use nexus_registry::{AlertOp, LogLevel, Monitoring};

#[derive(Debug, Clone)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub tags: HashMap<String, String>,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub context: HashMap<String, String>,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct ErrorAggregate {
    pub message: String,
    pub count: usize,
    pub first_seen: Instant,
    pub last_seen: Instant,
}

#[derive(Debug, Clone)]
pub struct AlertRule {
    pub metric: String,
    pub threshold: f64,
    pub op: AlertOp,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertFiring {
    pub escalated: bool,
}

#[derive(Debug, Default)]
struct AlertState {
    firing_since: Option<Instant>,
    escalated: bool,
}

/// `ALERT_EVALUATION_INTERVAL`-cadenced background check over the last
/// `ALERT_WINDOW` of samples, escalating a still-firing alert after
/// `ALERT_ESCALATION_AFTER`.
pub struct MonitoringCore {
    metrics: Mutex<std::collections::VecDeque<MetricSample>>,
    logs: Mutex<std::collections::VecDeque<LogEntry>>,
    alerts: Mutex<HashMap<String, (AlertRule, AlertState)>>,
}

impl Default for MonitoringCore {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringCore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(std::collections::VecDeque::with_capacity(METRICS_RING_CAP)),
            logs: Mutex::new(std::collections::VecDeque::with_capacity(LOGS_RING_CAP)),
            alerts: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_alert(&self, id: impl Into<String>, rule: AlertRule) {
        self.alerts
            .lock()
            .expect("monitoring alerts mutex poisoned")
            .insert(id.into(), (rule, AlertState::default()));
    }

    #[must_use]
    pub fn get_metrics(&self, name: &str, since: Instant) -> Vec<MetricSample> {
        self.metrics
            .lock()
            .expect("monitoring metrics mutex poisoned")
            .iter()
            .filter(|m| m.name == name && m.at >= since)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get_logs(&self, min_level: Option<LogLevel>, since: Option<Instant>) -> Vec<LogEntry> {
        self.logs
            .lock()
            .expect("monitoring logs mutex poisoned")
            .iter()
            .filter(|entry| min_level.map_or(true, |min| entry.level >= min))
            .filter(|entry| since.map_or(true, |since| entry.at >= since))
            .cloned()
            .collect()
    }

    /// Groups `Error`-level log entries by message, for a basic error
    /// dashboard (`aggregateErrors`).
    #[must_use]
    pub fn aggregate_errors(&self, since: Instant) -> Vec<ErrorAggregate> {
        let logs = self.logs.lock().expect("monitoring logs mutex poisoned");
        let mut by_message: HashMap<&str, ErrorAggregate> = HashMap::new();
        for entry in logs.iter().filter(|e| e.level == LogLevel::Error && e.at >= since) {
            by_message
                .entry(entry.message.as_str())
                .and_modify(|agg| {
                    agg.count += 1;
                    agg.first_seen = agg.first_seen.min(entry.at);
                    agg.last_seen = agg.last_seen.max(entry.at);
                })
                .or_insert_with(|| ErrorAggregate {
                    message: entry.message.clone(),
                    count: 1,
                    first_seen: entry.at,
                    last_seen: entry.at,
                });
        }
        by_message.into_values().collect()
    }

    /// Evaluates every registered alert against the mean of its metric's
    /// samples in the last [`ALERT_WINDOW`]. Returns the alerts currently
    /// firing, each flagged with whether it has been firing long enough to
    /// escalate.
    pub fn evaluate_alerts(&self, now: Instant) -> Vec<(String, AlertFiring)> {
        let window_start = now.checked_sub(ALERT_WINDOW).unwrap_or(now);
        let mut firing = Vec::new();
        let mut alerts = self.alerts.lock().expect("monitoring alerts mutex poisoned");
        for (id, (rule, state)) in alerts.iter_mut() {
            let samples = self.get_metrics(&rule.metric, window_start);
            if samples.is_empty() {
                state.firing_since = None;
                state.escalated = false;
                continue;
            }
            let mean = samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64;
            let breached = match rule.op {
                AlertOp::Gt => mean > rule.threshold,
                AlertOp::Lt => mean < rule.threshold,
                AlertOp::Eq => (mean - rule.threshold).abs() < f64::EPSILON,
            };

            if !breached {
                state.firing_since = None;
                state.escalated = false;
                continue;
            }

            let since = *state.firing_since.get_or_insert(now);
            let escalated = now.duration_since(since) >= ALERT_ESCALATION_AFTER;
            if escalated && !state.escalated {
                log::error!("alert {id} escalated: {} mean={mean:.2}", rule.metric);
            }
            state.escalated = escalated;
            firing.push((id.clone(), AlertFiring { escalated }));
        }
        firing
    }

    #[must_use]
    pub fn evaluation_interval() -> Duration {
        ALERT_EVALUATION_INTERVAL
    }
}

impl Monitoring for MonitoringCore {
    fn record_metric(&self, name: &str, value: f64, tags: &HashMap<String, String>) {
        log::debug!("metric {name}={value} tags={tags:?}");
        let mut metrics = self.metrics.lock().expect("monitoring metrics mutex poisoned");
        if metrics.len() >= METRICS_RING_CAP {
            metrics.pop_front();
        }
        metrics.push_back(MetricSample {
            name: name.to_string(),
            value,
            tags: tags.clone(),
            at: Instant::now(),
        });
    }

    fn log(&self, level: LogLevel, message: &str, context: &HashMap<String, String>) {
        match level {
            LogLevel::Debug => log::debug!("{message} {context:?}"),
            LogLevel::Info => log::info!("{message} {context:?}"),
            LogLevel::Warn => log::warn!("{message} {context:?}"),
            LogLevel::Error => log::error!("{message} {context:?}"),
        }
        let mut logs = self.logs.lock().expect("monitoring logs mutex poisoned");
        if logs.len() >= LOGS_RING_CAP {
            logs.pop_front();
        }
        logs.push_back(LogEntry {
            level,
            message: message.to_string(),
            context: context.clone(),
            at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_fires_once_mean_breaches_threshold() {
        let core = MonitoringCore::new();
        core.register_alert(
            "tick_time_high",
            AlertRule {
                metric: "tick_time_ms".into(),
                threshold: 16.0,
                op: AlertOp::Gt,
            },
        );
        core.record_metric("tick_time_ms", 20.0, &HashMap::new());
        let firing = core.evaluate_alerts(Instant::now());
        assert_eq!(firing.len(), 1);
        assert!(!firing[0].1.escalated);
    }

    #[test]
    fn error_logs_aggregate_by_message() {
        let core = MonitoringCore::new();
        let since = Instant::now();
        core.log(LogLevel::Error, "store unavailable", &HashMap::new());
        core.log(LogLevel::Error, "store unavailable", &HashMap::new());
        core.log(LogLevel::Error, "other failure", &HashMap::new());
        let aggregates = core.aggregate_errors(since);
        let total: usize = aggregates.iter().map(|a| a.count).sum();
        assert_eq!(total, 3);
        assert!(aggregates.iter().any(|a| a.message == "store unavailable" && a.count == 2));
    }
}
