//! Statistics snapshots for an external formatter.
//!
//! The core never formats output. Everything here derives serde so a CLI
//! or a batch driver can dump it as JSON.

use crate::combatant::State;
use crate::world::{CombatantId, Side};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Totals for one named attack (or extra damage source).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStats {
    pub hits: u32,
    pub misses: u32,
    pub criticals: u32,
    pub damage: i32,
}

impl AttackStats {
    pub fn record_hit(&mut self, damage: i32, critical: bool) {
        self.hits += 1;
        if critical {
            self.criticals += 1;
        }
        self.damage += damage;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn attempts(&self) -> u32 {
        self.hits + self.misses
    }

    /// Fraction of attempts that hit, 0 when nothing was attempted.
    pub fn hit_rate(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

/// Vital state and statistics of one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantReport {
    pub id: CombatantId,
    pub name: String,
    pub side: Side,
    pub hp: i32,
    pub max_hp: i32,
    pub state: State,
    /// Human readable state plus conditions, e.g. "OK, Prone".
    pub status: String,
    pub effects: Vec<String>,
    pub attacks: BTreeMap<String, AttackStats>,
}

impl CombatantReport {
    pub fn total_damage(&self) -> i32 {
        self.attacks.values().map(|s| s.damage).sum()
    }
}

/// Snapshot of a whole encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterReport {
    pub rounds: u32,
    pub winner: Option<Side>,
    pub combatants: Vec<CombatantReport>,
}

impl EncounterReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn side(&self, side: &Side) -> impl Iterator<Item = &CombatantReport> + '_ {
        let side = side.clone();
        self.combatants.iter().filter(move |c| c.side == side)
    }
}

/// Win tally across repeated runs of one preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub runs: u32,
    pub wins: BTreeMap<Side, u32>,
    /// Runs that ended without a single side standing.
    pub draws: u32,
    /// Runs aborted by an error such as the round limit.
    pub failures: u32,
    pub total_rounds: u64,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished encounter.
    pub fn record(&mut self, report: &EncounterReport) {
        self.runs += 1;
        self.total_rounds += u64::from(report.rounds);
        match &report.winner {
            Some(side) => *self.wins.entry(side.clone()).or_insert(0) += 1,
            None => self.draws += 1,
        }
        for c in &report.combatants {
            self.wins.entry(c.side.clone()).or_insert(0);
        }
    }

    pub fn record_failure(&mut self) {
        self.runs += 1;
        self.failures += 1;
    }

    /// Runs that produced a result.
    pub fn completed(&self) -> u32 {
        self.runs - self.failures
    }

    pub fn win_rate(&self, side: &Side) -> f64 {
        match self.completed() {
            0 => 0.0,
            n => f64::from(self.wins.get(side).copied().unwrap_or(0)) / f64::from(n),
        }
    }

    pub fn average_rounds(&self) -> f64 {
        match self.completed() {
            0 => 0.0,
            n => self.total_rounds as f64 / f64::from(n),
        }
    }
}
