//! The turn and round scheduler.
//!
//! An [`Encounter`] owns one [`Arena`], rolls initiative once, then runs
//! rounds in that fixed order until at most one side is left standing.
//! The end condition is checked after every individual turn, so a fight
//! can end in the middle of a round.

use crate::arena::{Arena, ArenaError};
use crate::combatant::{BuildError, Combatant, CombatantBuilder, State};
use crate::dice::{Advantage, DiceRoller, SeededDice};
use crate::effects::RollReason;
use crate::report::EncounterReport;
use crate::tactics;
use crate::world::{Ability, CombatantId, Coord, Side};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Error type for encounters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncounterError {
    #[error("Encounter still running after {0} rounds")]
    RoundLimit(u32),

    #[error("Arena error: {0}")]
    Arena(#[from] ArenaError),

    #[error("Invalid combatant: {0}")]
    Build(#[from] BuildError),

    #[error("Encounter has no combatants")]
    Empty,
}

/// Where combatants without explicit coordinates are placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// A uniformly random free cell.
    #[default]
    Random,
    /// The first side along the left edge, the second along the right edge.
    /// Further sides fall back to random cells.
    Lines,
}

/// Configuration for an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterConfig {
    /// Grid width in cells.
    pub width: i32,

    /// Grid height in cells.
    pub height: i32,

    /// Seed for the dice.
    pub seed: u64,

    /// Rounds after which the encounter is aborted.
    pub max_rounds: u32,

    pub placement: Placement,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            width: 12,
            height: 12,
            seed: 0,
            max_rounds: 100,
            placement: Placement::Random,
        }
    }
}

impl EncounterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grid size.
    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the dice seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the round ceiling.
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}

/// How an encounter ended.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterOutcome {
    pub winner: Option<Side>,
    pub rounds: u32,
    pub report: EncounterReport,
}

/// One fight, from placement to the last side standing.
pub struct Encounter {
    config: EncounterConfig,
    arena: Arena,
    order: Vec<CombatantId>,
    round: u32,
}

impl Encounter {
    /// Create an encounter with seeded dice.
    pub fn new(config: EncounterConfig) -> Self {
        let dice = Box::new(SeededDice::new(config.seed));
        Self::with_dice(config, dice)
    }

    /// Create an encounter with a custom dice source.
    pub fn with_dice(config: EncounterConfig, dice: Box<dyn DiceRoller>) -> Self {
        let arena = Arena::new(config.width, config.height, dice);
        Self {
            config,
            arena,
            order: Vec::new(),
            round: 0,
        }
    }

    pub fn config(&self) -> &EncounterConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Initiative order, empty until initiative is rolled.
    pub fn order(&self) -> &[CombatantId] {
        &self.order
    }

    /// Rounds completed or in progress.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Register a combatant, at `at` or wherever the placement policy puts it.
    pub fn add(&mut self, combatant: Combatant, at: Option<Coord>) -> Result<CombatantId, EncounterError> {
        let at = match (at, self.config.placement) {
            (Some(cell), _) => Some(cell),
            (None, Placement::Lines) => self.lane_cell(&combatant.side),
            (None, Placement::Random) => None,
        };
        Ok(self.arena.add_combatant(combatant, at)?)
    }

    /// Build and register a whole side.
    pub fn add_side(
        &mut self,
        side: impl Into<Side>,
        members: impl IntoIterator<Item = CombatantBuilder>,
    ) -> Result<Vec<CombatantId>, EncounterError> {
        let side = side.into();
        members
            .into_iter()
            .map(|builder| {
                let combatant = builder.side(side.clone()).build()?;
                self.add(combatant, None)
            })
            .collect()
    }

    /// The next free cell in a side's lane: columns from the side's edge
    /// inward, rows from the middle outward.
    fn lane_cell(&self, side: &Side) -> Option<Coord> {
        let mut sides: Vec<&Side> = Vec::new();
        for c in self.arena.roster() {
            if !sides.contains(&&c.side) {
                sides.push(&c.side);
            }
        }
        let lane = sides.iter().position(|s| *s == side).unwrap_or(sides.len());
        let (width, height) = (self.config.width, self.config.height);

        let columns: Vec<i32> = match lane {
            0 => (0..width).collect(),
            1 => (0..width).rev().collect(),
            _ => return None,
        };
        let middle = height / 2;
        let mut rows: Vec<i32> = (0..height).collect();
        rows.sort_by_key(|y| ((y - middle).abs(), *y));

        let view = self.arena.view();
        columns
            .into_iter()
            .flat_map(|x| rows.iter().map(move |y| Coord::new(x, *y)))
            .find(|cell| view.is_free(*cell))
    }

    /// Roll initiative for everyone: d20 + DEX modifier, highest first,
    /// ties to the higher DEX score and then to the lower id.
    pub fn do_initiative(&mut self) {
        let mut rolls = Vec::new();
        for id in self.arena.ids() {
            let Some((c, dice)) = self.arena.with_dice(id) else {
                continue;
            };
            let natural = c.roll_natural(Advantage::Normal, RollReason::Initiative, dice);
            let total = natural + c.modifier(Ability::Dexterity);
            c.initiative = Some(total);
            debug!(combatant = %c.name, natural, total, "initiative");
            rolls.push((total, c.abilities.dexterity, id));
        }
        rolls.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        self.order = rolls.into_iter().map(|(_, _, id)| id).collect();

        let names: Vec<&str> = self
            .order
            .iter()
            .filter_map(|id| self.arena.get(*id))
            .map(|c| c.name.as_str())
            .collect();
        info!(order = ?names, "initiative rolled");
    }

    /// Run one full round.
    pub fn turn(&mut self) -> Result<(), EncounterError> {
        if self.order.is_empty() {
            self.do_initiative();
        }
        if self.round >= self.config.max_rounds {
            return Err(EncounterError::RoundLimit(self.config.max_rounds));
        }
        self.round += 1;
        info!(round = self.round, "round starts");

        for id in self.order.clone() {
            if !self.arena.still_going() {
                break;
            }
            self.take_turn(id);
        }
        Ok(())
    }

    /// One combatant's turn.
    ///
    /// Downed combatants only roll their death save. Other incapacitated
    /// combatants lose their turn but still make end-of-turn saves, so a
    /// save-ends paralysis can wear off.
    fn take_turn(&mut self, id: CombatantId) {
        self.arena.reset_once_per_turn();
        let Some(c) = self.arena.get(id) else {
            return;
        };
        let name = c.name.clone();
        match c.state() {
            State::Dead => {
                debug!(combatant = %name, "dead, skipping");
            }
            State::Unconscious if c.hit_points.is_zero() => {
                if c.is_dying() {
                    self.arena.death_save(id);
                } else {
                    debug!(combatant = %name, "stable, skipping");
                }
            }
            State::Unconscious | State::Incapacitated => {
                info!(combatant = %name, status = %c.status(), "loses the turn");
                self.arena.end_turn(id);
            }
            State::Ok => {
                debug!(combatant = %name, "turn starts");
                let start = self.arena.start_turn(id);
                for (effect, tick) in &start.ticks {
                    debug!(combatant = %name, %effect, ?tick, "start of turn");
                }
                let can_act = self.arena.get(id).is_some_and(|c| c.state() == State::Ok);
                if can_act {
                    tactics::take_turn(&mut self.arena, id);
                }
                self.arena.end_turn(id);
            }
        }
    }

    /// Fight until one side remains or the round ceiling is crossed.
    pub fn run(&mut self) -> Result<EncounterOutcome, EncounterError> {
        if self.arena.roster().is_empty() {
            return Err(EncounterError::Empty);
        }
        if self.order.is_empty() {
            self.do_initiative();
        }
        while self.arena.still_going() {
            self.turn()?;
        }
        let report = self.report();
        info!(
            winner = ?report.winner.as_ref().map(Side::as_str),
            rounds = self.round,
            "encounter over"
        );
        Ok(EncounterOutcome {
            winner: report.winner.clone(),
            rounds: self.round,
            report,
        })
    }

    pub fn report(&self) -> EncounterReport {
        EncounterReport {
            rounds: self.round,
            winner: self.arena.try_winning_side(),
            combatants: self.arena.roster().iter().map(Combatant::report).collect(),
        }
    }
}
