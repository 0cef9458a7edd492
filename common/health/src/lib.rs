use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Liveness tracking for the long-running loops of a process.
///
/// Each loop registers a component and must report healthy more often than
/// its deadline. A loop that wedges (stalled store call, dead subscription)
/// stops reporting, the component is considered stalled, and the liveness
/// probe fails so the process gets restarted instead of idling.

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComponentStatus {
    /// Set when a component is newly registered, before its first report.
    Starting,
    /// Recently reported healthy; must report again before the instant.
    HealthyUntil(Instant),
    /// Reported unhealthy.
    Unhealthy,
}

impl ComponentStatus {
    fn is_healthy(&self) -> bool {
        match self {
            ComponentStatus::HealthyUntil(until) => *until > Instant::now(),
            _ => false,
        }
    }
}

/// Point-in-time view over all registered components. Healthy only if every
/// component is within its reporting deadline.
#[derive(Debug, Default)]
pub struct HealthStatus {
    pub healthy: bool,
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    fn into_response(self) -> Response {
        let body = format!("{self:?}");
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

#[derive(Clone)]
pub struct HealthHandle {
    component: String,
    deadline: Duration,
    components: Arc<RwLock<HashMap<String, ComponentStatus>>>,
}

impl HealthHandle {
    /// Report healthy. Must be called more frequently than the deadline
    /// passed at registration.
    pub fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(
            Instant::now() + self.deadline,
        ));
    }

    pub fn report_status(&self, status: ComponentStatus) {
        match self.components.write() {
            Ok(mut map) => {
                map.insert(self.component.clone(), status);
            }
            // Poisoned lock: warn, the probe will fail and the process restart.
            Err(_) => warn!("poisoned HealthRegistry lock"),
        }
    }
}

#[derive(Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentStatus>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component. The returned handle is passed to the component
    /// so it can report its status as it runs.
    pub fn register(&self, component: impl Into<String>, deadline: Duration) -> HealthHandle {
        let handle = HealthHandle {
            component: component.into(),
            deadline,
            components: self.components.clone(),
        };
        handle.report_status(ComponentStatus::Starting);
        handle
    }

    /// Overall process status, usable as an axum handler.
    pub fn get_status(&self) -> HealthStatus {
        match self.components.read() {
            Ok(components) => HealthStatus {
                healthy: !components.is_empty() && components.values().all(|c| c.is_healthy()),
                components: components.clone(),
            },
            Err(_) => {
                warn!("poisoned HealthRegistry lock");
                HealthStatus::default()
            }
        }
    }
}
