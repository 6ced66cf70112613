//! Component health monitoring (ambient supplement, grounded on
//! `original_source/runtime/risk/health_monitor.py`).
//!
//! Components register, then report heartbeats with optional latency
//! metadata. Periodic evaluation derives a [`ComponentHealth`] from
//! heartbeat recency, latency drift against a baseline, and dependency
//! health, raising cooldown-gated [`AlertSeverity`] alerts on transitions.
//! Timestamps are passed in explicitly (nanoseconds) rather than read from
//! the system clock, keeping evaluation deterministic and testable — the
//! same convention `DegradationManager` uses.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub heartbeat_timeout: Duration,
    pub heartbeat_warning: Duration,
    pub cpu_warning_pct: f64,
    pub cpu_critical_pct: f64,
    pub memory_warning_pct: f64,
    pub memory_critical_pct: f64,
    pub latency_warning_multiplier: f64,
    pub latency_critical_multiplier: f64,
    pub alert_cooldown: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(30),
            heartbeat_warning: Duration::from_secs(15),
            cpu_warning_pct: 80.0,
            cpu_critical_pct: 95.0,
            memory_warning_pct: 75.0,
            memory_critical_pct: 90.0,
            latency_warning_multiplier: 3.0,
            latency_critical_multiplier: 10.0,
            alert_cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComponentStatus {
    pub name: String,
    pub health: ComponentHealth,
    pub last_heartbeat_ns: Option<i64>,
    pub latency_ms: Option<f64>,
    pub error_count: u32,
}

#[derive(Debug, Clone)]
pub struct HealthAlert {
    pub id: u64,
    pub component: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub timestamp_ns: i64,
    pub acknowledged: bool,
}

struct Inner {
    config: HealthConfig,
    components: HashMap<String, ComponentStatus>,
    dependencies: HashMap<String, HashSet<String>>,
    baseline_latencies: HashMap<String, f64>,
    alerts: Vec<HealthAlert>,
    alert_cooldowns: HashMap<String, i64>,
    next_alert_id: u64,
}

/// Heartbeat-based liveness tracker for a set of named components.
pub struct HealthMonitor {
    inner: Mutex<Inner>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                config,
                components: HashMap::new(),
                dependencies: HashMap::new(),
                baseline_latencies: HashMap::new(),
                alerts: Vec::new(),
                alert_cooldowns: HashMap::new(),
                next_alert_id: 1,
            }),
        }
    }

    pub fn register_component(&self, name: &str, dependencies: Vec<String>) {
        let mut inner = self.inner.lock();
        inner.components.insert(
            name.to_string(),
            ComponentStatus {
                name: name.to_string(),
                health: ComponentHealth::Unknown,
                last_heartbeat_ns: None,
                latency_ms: None,
                error_count: 0,
            },
        );
        if !dependencies.is_empty() {
            inner.dependencies.insert(name.to_string(), dependencies.into_iter().collect());
        }
        info!(component = name, "registered component for health monitoring");
    }

    pub fn unregister_component(&self, name: &str) {
        let mut inner = self.inner.lock();
        inner.components.remove(name);
        inner.dependencies.remove(name);
        info!(component = name, "unregistered component");
    }

    pub fn set_baseline_latency(&self, name: &str, latency_ms: f64) {
        self.inner.lock().baseline_latencies.insert(name.to_string(), latency_ms);
    }

    /// Records a heartbeat. A heartbeat from an unregistered component is
    /// logged and dropped rather than silently creating a new registration.
    pub fn heartbeat(&self, name: &str, now_ns: i64, latency_ms: Option<f64>) {
        let mut inner = self.inner.lock();
        if !inner.components.contains_key(name) {
            warn!(component = name, "heartbeat from unregistered component");
            return;
        }
        let status = inner.components.get_mut(name).unwrap();
        status.last_heartbeat_ns = Some(now_ns);
        if let Some(latency) = latency_ms {
            status.latency_ms = Some(latency);
        }
    }

    pub fn record_error(&self, name: &str) {
        let mut inner = self.inner.lock();
        if let Some(status) = inner.components.get_mut(name) {
            status.error_count += 1;
        }
    }

    /// Evaluates every registered component's health at `now_ns`, raising
    /// alerts on state transitions.
    pub fn check_health(&self, now_ns: i64) -> HashMap<String, ComponentStatus> {
        let mut inner = self.inner.lock();
        let mut names: Vec<String> = inner.components.keys().cloned().collect();
        names.sort();

        for name in &names {
            let old_health = inner.components[name].health;
            let new_health = Self::evaluate_health(&inner, name, now_ns);
            inner.components.get_mut(name).unwrap().health = new_health;
            if new_health != old_health {
                Self::handle_transition(&mut inner, name, old_health, new_health, now_ns);
            }
        }

        inner.components.clone()
    }

    fn evaluate_health(inner: &Inner, name: &str, now_ns: i64) -> ComponentHealth {
        let status = &inner.components[name];

        let Some(last_heartbeat_ns) = status.last_heartbeat_ns else {
            return ComponentHealth::Unknown;
        };

        let since_heartbeat = Duration::from_nanos((now_ns - last_heartbeat_ns).max(0) as u64);
        if since_heartbeat > inner.config.heartbeat_timeout {
            return ComponentHealth::Unhealthy;
        }
        if since_heartbeat > inner.config.heartbeat_warning {
            return ComponentHealth::Degraded;
        }

        if let (Some(latency), Some(&baseline)) = (status.latency_ms, inner.baseline_latencies.get(name)) {
            if baseline > 0.0 {
                let multiplier = latency / baseline;
                if multiplier > inner.config.latency_critical_multiplier {
                    return ComponentHealth::Unhealthy;
                }
                if multiplier > inner.config.latency_warning_multiplier {
                    return ComponentHealth::Degraded;
                }
            }
        }

        if let Some(deps) = inner.dependencies.get(name) {
            for dep in deps {
                if inner.components.get(dep).map(|d| d.health) == Some(ComponentHealth::Unhealthy) {
                    return ComponentHealth::Degraded;
                }
            }
        }

        ComponentHealth::Healthy
    }

    fn handle_transition(inner: &mut Inner, name: &str, old: ComponentHealth, new: ComponentHealth, now_ns: i64) {
        let severity = match new {
            ComponentHealth::Unhealthy => AlertSeverity::Critical,
            ComponentHealth::Degraded => AlertSeverity::Warning,
            ComponentHealth::Healthy if old != ComponentHealth::Unknown => AlertSeverity::Info,
            _ => return,
        };
        let message = format!("{name}: {old:?} -> {new:?}");
        Self::create_alert(inner, name, severity, message, now_ns);
    }

    fn create_alert(inner: &mut Inner, component: &str, severity: AlertSeverity, message: String, now_ns: i64) {
        let key = format!("{component}:{severity:?}:{message}");
        let last = inner.alert_cooldowns.get(&key).copied().unwrap_or(0);
        if Duration::from_nanos((now_ns - last).max(0) as u64) < inner.config.alert_cooldown {
            return;
        }

        let id = inner.next_alert_id;
        inner.next_alert_id += 1;
        inner.alerts.push(HealthAlert {
            id,
            component: component.to_string(),
            severity,
            message: message.clone(),
            timestamp_ns: now_ns,
            acknowledged: false,
        });
        inner.alert_cooldowns.insert(key, now_ns);

        match severity {
            AlertSeverity::Critical => error!(%message, "health alert"),
            AlertSeverity::Warning => warn!(%message, "health warning"),
            _ => info!(%message, "health info"),
        }
    }

    pub fn check_resources(&self, cpu_pct: f64, memory_pct: f64, now_ns: i64) {
        let mut inner = self.inner.lock();
        let cfg = inner.config.clone();

        if cpu_pct > cfg.cpu_critical_pct {
            Self::create_alert(&mut inner, "system", AlertSeverity::Critical, format!("CPU critical: {cpu_pct:.1}%"), now_ns);
        } else if cpu_pct > cfg.cpu_warning_pct {
            Self::create_alert(&mut inner, "system", AlertSeverity::Warning, format!("CPU warning: {cpu_pct:.1}%"), now_ns);
        }

        if memory_pct > cfg.memory_critical_pct {
            Self::create_alert(&mut inner, "system", AlertSeverity::Critical, format!("memory critical: {memory_pct:.1}%"), now_ns);
        } else if memory_pct > cfg.memory_warning_pct {
            Self::create_alert(&mut inner, "system", AlertSeverity::Warning, format!("memory warning: {memory_pct:.1}%"), now_ns);
        }
    }

    pub fn get_alerts(&self, severity: Option<AlertSeverity>, unacknowledged_only: bool) -> Vec<HealthAlert> {
        self.inner
            .lock()
            .alerts
            .iter()
            .filter(|a| severity.is_none_or(|s| a.severity == s))
            .filter(|a| !unacknowledged_only || !a.acknowledged)
            .cloned()
            .collect()
    }

    pub fn acknowledge_alert(&self, id: u64) {
        let mut inner = self.inner.lock();
        if let Some(alert) = inner.alerts.iter_mut().find(|a| a.id == id) {
            alert.acknowledged = true;
        }
    }

    pub fn component_status(&self, name: &str) -> Option<ComponentStatus> {
        self.inner.lock().components.get(name).cloned()
    }

    pub fn is_system_healthy(&self) -> bool {
        !self.inner.lock().components.values().any(|s| s.health == ComponentHealth::Unhealthy)
    }

    pub fn unhealthy_components(&self) -> Vec<String> {
        self.inner
            .lock()
            .components
            .values()
            .filter(|s| s.health == ComponentHealth::Unhealthy)
            .map(|s| s.name.clone())
            .collect()
    }
}
