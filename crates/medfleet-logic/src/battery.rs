//! Battery estimates: how far a robot can still go, how long it needs on a
//! charger, and a coarse health label for display.

use serde::{Deserialize, Serialize};

use crate::config::EnergyConfig;

const EPSILON: f64 = 1e-9;

/// Coarse battery health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BatteryHealth {
    Critical,
    Low,
    Fair,
    Good,
    Excellent,
}

impl BatteryHealth {
    pub fn of(percent: f64) -> Self {
        if percent >= 80.0 {
            BatteryHealth::Excellent
        } else if percent >= 60.0 {
            BatteryHealth::Good
        } else if percent >= 40.0 {
            BatteryHealth::Fair
        } else if percent >= 20.0 {
            BatteryHealth::Low
        } else {
            BatteryHealth::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BatteryHealth::Critical => "critical",
            BatteryHealth::Low => "low",
            BatteryHealth::Fair => "fair",
            BatteryHealth::Good => "good",
            BatteryHealth::Excellent => "excellent",
        }
    }
}

/// Whole cells the battery still covers. `None` means unlimited (no drain).
pub fn remaining_cells(percent: f64, drain_per_cell: f64) -> Option<u64> {
    if drain_per_cell <= 0.0 {
        return None;
    }
    Some((percent.max(0.0) / drain_per_cell + EPSILON).floor() as u64)
}

/// Ticks of travel the battery still covers at `ticks_per_cell`.
pub fn remaining_ticks(percent: f64, drain_per_cell: f64, ticks_per_cell: u32) -> Option<u64> {
    remaining_cells(percent, drain_per_cell).map(|cells| cells * ticks_per_cell.max(1) as u64)
}

/// Docked ticks needed to reach `target`. `None` when the charger adds
/// nothing.
pub fn charge_ticks(current: f64, target: f64, charge_rate: f64) -> Option<u64> {
    let needed = (target - current).max(0.0);
    if needed == 0.0 {
        return Some(0);
    }
    if charge_rate <= 0.0 {
        return None;
    }
    Some((needed / charge_rate - EPSILON).ceil() as u64)
}

/// Every battery estimate for one robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryOutlook {
    pub health: BatteryHealth,
    pub remaining_cells: Option<u64>,
    pub remaining_ticks: Option<u64>,
    /// Docked ticks until the resume threshold.
    pub ticks_to_resume: Option<u64>,
    /// Below the low-battery threshold.
    pub needs_charging: bool,
}

impl BatteryOutlook {
    pub fn of(percent: f64, ticks_per_cell: u32, energy: &EnergyConfig) -> Self {
        Self {
            health: BatteryHealth::of(percent),
            remaining_cells: remaining_cells(percent, energy.drain_per_cell),
            remaining_ticks: remaining_ticks(percent, energy.drain_per_cell, ticks_per_cell),
            ticks_to_resume: charge_ticks(percent, energy.resume_battery, energy.charge_rate),
            needs_charging: percent < energy.low_battery,
        }
    }
}
