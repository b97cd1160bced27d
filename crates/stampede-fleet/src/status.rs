//! Fleet status and per-state reports

use std::fmt;

use stampede_client::{ConnectionState, ConnectionStatus};

/// What the fleet is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FleetStatus {
    #[default]
    Waiting,
    Creating,
    Running,
    Stopping,
}

impl fmt::Display for FleetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FleetStatus::Waiting => "Waiting",
            FleetStatus::Creating => "Creating clients...",
            FleetStatus::Running => "Stress test running",
            FleetStatus::Stopping => "Stopping...",
        };
        f.write_str(text)
    }
}

/// Snapshot of every tracked client, bucketed by connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FleetReport {
    pub total: usize,
    pub idle: usize,
    pub connecting: usize,
    pub retrying: usize,
    pub connected: usize,
    pub failed: usize,
    pub closed: usize,
    /// Handshake attempts made after a client's first, across the fleet
    pub retries: u64,
}

impl FleetReport {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = ConnectionStatus>,
    {
        let mut report = FleetReport::default();
        for status in statuses {
            report.total += 1;
            // The last timeout of a failed client ends the budget without a retry
            let retries = match status.state {
                ConnectionState::Failed => status.attempts_made.saturating_sub(1),
                _ => status.attempts_made,
            };
            report.retries += u64::from(retries);
            match status.state {
                ConnectionState::Idle => report.idle += 1,
                ConnectionState::Connecting => report.connecting += 1,
                ConnectionState::Retrying => report.retrying += 1,
                ConnectionState::Connected => report.connected += 1,
                ConnectionState::Failed => report.failed += 1,
                ConnectionState::Closed => report.closed += 1,
            }
        }
        report
    }

    /// Clients still working on their handshake
    pub fn pending(&self) -> usize {
        self.idle + self.connecting + self.retrying
    }
}

impl fmt::Display for FleetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} clients: {} connected, {} pending, {} failed, {} closed, {} retries",
            self.total,
            self.connected,
            self.pending(),
            self.failed,
            self.closed,
            self.retries
        )
    }
}
