//! Pure health assessment for the uplink

use crate::session::SessionStats;
use crate::state::ConnectivityState;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Quiet period after which an inbound-silent session is reported unhealthy
const MESSAGE_SILENCE_LIMIT: Duration = Duration::from_secs(300);

/// Health metrics for connection monitoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetrics {
    /// Time since the session last became ready
    pub uptime: Option<Duration>,
    /// Time since the last inbound message
    pub time_since_last_message: Option<Duration>,
    /// Successful connects over the process lifetime
    pub connect_count: u64,
    /// Session faults over the process lifetime
    pub fault_count: u64,
    pub is_healthy: bool,
}

/// Connection quality assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionQuality {
    /// Stable connection, recent activity
    Excellent,
    Good,
    /// Some reconnections, but working
    Fair,
    /// Frequent reconnections
    Poor,
    /// Not connected or failing constantly
    Critical,
}

pub struct HealthMonitor;

impl HealthMonitor {
    /// Calculate health metrics (pure function)
    pub fn calculate_health_metrics(
        state: &ConnectivityState,
        stats: &SessionStats,
        now: Instant,
    ) -> HealthMetrics {
        let ready = state.session.is_ready();
        let uptime = if ready {
            stats.last_connected.map(|t| now.saturating_duration_since(t))
        } else {
            None
        };
        let time_since_last_message = stats.last_message.map(|t| now.saturating_duration_since(t));

        HealthMetrics {
            uptime,
            time_since_last_message,
            connect_count: stats.connect_count,
            fault_count: stats.fault_count,
            is_healthy: Self::determine_health_status(uptime, time_since_last_message),
        }
    }

    /// Healthy while connected and, if messages have arrived, recently so
    fn determine_health_status(
        uptime: Option<Duration>,
        time_since_last_message: Option<Duration>,
    ) -> bool {
        match (uptime, time_since_last_message) {
            (Some(_), None) => true,
            (Some(_), Some(last_msg)) => last_msg < MESSAGE_SILENCE_LIMIT,
            _ => false,
        }
    }

    /// Assess connection quality based on metrics (pure function)
    pub fn assess_connection_quality(metrics: &HealthMetrics) -> ConnectionQuality {
        if !metrics.is_healthy {
            return ConnectionQuality::Critical;
        }

        let reconnects = metrics.connect_count.saturating_sub(1);
        match (reconnects, metrics.uptime) {
            (0, Some(uptime)) if uptime > Duration::from_secs(3600) => ConnectionQuality::Excellent,
            (0, Some(_)) => ConnectionQuality::Good,

            (1..=2, Some(uptime)) if uptime > Duration::from_secs(1800) => ConnectionQuality::Good,
            (1..=2, Some(_)) => ConnectionQuality::Fair,

            (3..=5, _) => ConnectionQuality::Fair,
            (6..=10, _) => ConnectionQuality::Poor,

            _ => ConnectionQuality::Critical,
        }
    }
}
