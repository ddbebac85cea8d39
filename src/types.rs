//! Type definitions and aliases

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Measurement phase of a speed test run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Ping,
    Download,
    Upload,
}

impl Phase {
    /// Phases in the order a run executes them
    pub const ORDER: [Phase; 3] = [Phase::Ping, Phase::Download, Phase::Upload];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ping => "ping",
            Phase::Download => "download",
            Phase::Upload => "upload",
        }
    }

    /// Whether a failure in this phase terminates the run
    pub fn is_fatal_on_failure(&self) -> bool {
        !matches!(self, Phase::Ping)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer lifecycle: `Idle -> InProgress -> {Completed, Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    Idle,
    InProgress,
    Completed,
    Failed,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Failed)
    }

    /// Apply a transition, rejecting moves out of a terminal state or back to idle
    pub fn transition(self, next: TransferState) -> Result<TransferState> {
        let allowed = matches!(
            (self, next),
            (TransferState::Idle, TransferState::InProgress)
                | (TransferState::InProgress, TransferState::InProgress)
                | (TransferState::InProgress, TransferState::Completed)
                | (TransferState::InProgress, TransferState::Failed)
                | (TransferState::Idle, TransferState::Failed)
        );

        if allowed {
            Ok(next)
        } else {
            Err(AppError::internal(format!(
                "Invalid transfer state transition {:?} -> {:?}",
                self, next
            )))
        }
    }
}

/// Throughput classification used for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedLevel {
    /// 100 Mbps and above
    Excellent,
    /// 50-100 Mbps
    Good,
    /// 10-50 Mbps
    Fair,
    /// 1-10 Mbps
    Poor,
    /// Below 1 Mbps
    VeryPoor,
}

impl SpeedLevel {
    pub fn from_mbps(mbps: f64) -> Self {
        if mbps >= 100.0 {
            Self::Excellent
        } else if mbps >= 50.0 {
            Self::Good
        } else if mbps >= 10.0 {
            Self::Fair
        } else if mbps >= 1.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_and_fatality() {
        assert_eq!(Phase::ORDER, [Phase::Ping, Phase::Download, Phase::Upload]);
        assert!(!Phase::Ping.is_fatal_on_failure());
        assert!(Phase::Download.is_fatal_on_failure());
        assert!(Phase::Upload.is_fatal_on_failure());
    }

    #[test]
    fn test_phase_serialization() {
        assert_eq!(serde_json::to_string(&Phase::Download).unwrap(), "\"download\"");
        assert_eq!(Phase::Upload.to_string(), "upload");
    }

    #[test]
    fn test_transfer_state_transitions() {
        let state = TransferState::Idle;
        let state = state.transition(TransferState::InProgress).unwrap();
        let state = state.transition(TransferState::InProgress).unwrap();
        let state = state.transition(TransferState::Completed).unwrap();
        assert!(state.is_terminal());

        assert!(state.transition(TransferState::InProgress).is_err());
        assert!(TransferState::Failed.transition(TransferState::Completed).is_err());
        assert!(TransferState::InProgress.transition(TransferState::Idle).is_err());
    }

    #[test]
    fn test_speed_level_boundaries() {
        assert_eq!(SpeedLevel::from_mbps(250.0), SpeedLevel::Excellent);
        assert_eq!(SpeedLevel::from_mbps(100.0), SpeedLevel::Excellent);
        assert_eq!(SpeedLevel::from_mbps(50.0), SpeedLevel::Good);
        assert_eq!(SpeedLevel::from_mbps(10.0), SpeedLevel::Fair);
        assert_eq!(SpeedLevel::from_mbps(1.0), SpeedLevel::Poor);
        assert_eq!(SpeedLevel::from_mbps(0.3), SpeedLevel::VeryPoor);
    }
}
