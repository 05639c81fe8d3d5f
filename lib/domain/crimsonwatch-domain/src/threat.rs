//! Threat scoring.
//!
//! A [`ThreatLevel`] is the only input to status and color; both are derived
//! on demand so they can never drift from the level they describe.

use serde::{Deserialize, Serialize};

/// Level at or above which the status is [`ThreatStatus::Critical`].
pub const CRITICAL_THRESHOLD: u8 = 70;
/// Level at or above which the status is [`ThreatStatus::Elevated`].
pub const ELEVATED_THRESHOLD: u8 = 40;
/// Points contributed by each blocked call.
pub const BLOCKED_CALL_WEIGHT: f64 = 5.0;
/// Total tool calls above which [`TOOL_VOLUME_BONUS`] applies.
pub const TOOL_VOLUME_THRESHOLD: u64 = 100;
pub const TOOL_VOLUME_BONUS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatStatus {
    Normal,
    Elevated,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatColor {
    Green,
    Yellow,
    Red,
}

impl ThreatStatus {
    pub fn color(self) -> ThreatColor {
        match self {
            ThreatStatus::Normal => ThreatColor::Green,
            ThreatStatus::Elevated => ThreatColor::Yellow,
            ThreatStatus::Critical => ThreatColor::Red,
        }
    }
}

/// Raw counters a threat level can be derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreatCounters {
    pub blocked_calls_total: u64,
    pub total_tool_calls: Option<u64>,
}

/// Threat level clamped to `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreatLevel(u8);

impl ThreatLevel {
    pub const MAX: u8 = 100;

    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    /// Use a level a source reported directly; only clamped and rounded.
    pub fn from_reported(value: f64) -> Self {
        Self::clamp_round(value)
    }

    /// Derive a level from raw counters.
    pub fn from_counters(counters: ThreatCounters) -> Self {
        let bonus = match counters.total_tool_calls {
            Some(calls) if calls > TOOL_VOLUME_THRESHOLD => TOOL_VOLUME_BONUS,
            _ => 0.0,
        };
        Self::clamp_round(counters.blocked_calls_total as f64 * BLOCKED_CALL_WEIGHT + bonus)
    }

    fn clamp_round(value: f64) -> Self {
        if !value.is_finite() {
            return Self(if value > 0.0 { Self::MAX } else { 0 });
        }
        Self(value.round().clamp(0.0, f64::from(Self::MAX)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn status(self) -> ThreatStatus {
        if self.0 >= CRITICAL_THRESHOLD {
            ThreatStatus::Critical
        } else if self.0 >= ELEVATED_THRESHOLD {
            ThreatStatus::Elevated
        } else {
            ThreatStatus::Normal
        }
    }

    pub fn color(self) -> ThreatColor {
        self.status().color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bands_and_boundaries() {
        for level in 0..=39 {
            let level = ThreatLevel::new(level);
            assert_eq!(level.status(), ThreatStatus::Normal);
            assert_eq!(level.color(), ThreatColor::Green);
        }
        for level in 40..=69 {
            let level = ThreatLevel::new(level);
            assert_eq!(level.status(), ThreatStatus::Elevated);
            assert_eq!(level.color(), ThreatColor::Yellow);
        }
        for level in 70..=100 {
            let level = ThreatLevel::new(level);
            assert_eq!(level.status(), ThreatStatus::Critical);
            assert_eq!(level.color(), ThreatColor::Red);
        }

        assert_eq!(ThreatLevel::new(39).status(), ThreatStatus::Normal);
        assert_eq!(ThreatLevel::new(40).status(), ThreatStatus::Elevated);
        assert_eq!(ThreatLevel::new(69).status(), ThreatStatus::Elevated);
        assert_eq!(ThreatLevel::new(70).status(), ThreatStatus::Critical);
    }

    #[test]
    fn test_from_counters_blocked_only() {
        let level = ThreatLevel::from_counters(ThreatCounters {
            blocked_calls_total: 10,
            total_tool_calls: None,
        });
        assert_eq!(level.value(), 50);
        assert_eq!(level.status(), ThreatStatus::Elevated);
        assert_eq!(level.color(), ThreatColor::Yellow);
    }

    #[test]
    fn test_from_counters_tool_volume_bonus() {
        let at_threshold = ThreatLevel::from_counters(ThreatCounters {
            blocked_calls_total: 2,
            total_tool_calls: Some(100),
        });
        assert_eq!(at_threshold.value(), 10);

        let above = ThreatLevel::from_counters(ThreatCounters {
            blocked_calls_total: 2,
            total_tool_calls: Some(101),
        });
        assert_eq!(above.value(), 20);
    }

    #[test]
    fn test_from_counters_clamps_to_max() {
        let level = ThreatLevel::from_counters(ThreatCounters {
            blocked_calls_total: 1_000,
            total_tool_calls: Some(5_000),
        });
        assert_eq!(level.value(), 100);
    }

    #[test]
    fn test_from_reported_clamps_and_rounds() {
        assert_eq!(ThreatLevel::from_reported(-4.0).value(), 0);
        assert_eq!(ThreatLevel::from_reported(69.6).value(), 70);
        assert_eq!(ThreatLevel::from_reported(250.0).value(), 100);
        assert_eq!(ThreatLevel::from_reported(f64::NAN).value(), 0);
        assert_eq!(ThreatLevel::new(180).value(), 100);
    }
}
