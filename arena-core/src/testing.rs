//! Testing utilities for the combat engine.
//!
//! This module provides tools for deterministic scenario tests:
//! - `ScriptedDice` returns queued results, then falls back to a seeded source
//! - `FixedDice` makes every die land on the same face
//! - `ArenaHarness` for building small scripted fights
//! - Assertion helpers for verifying combatant state

use crate::arena::Arena;
use crate::combatant::{Combatant, CombatantBuilder};
use crate::dice::{DiceExpression, DiceRoller, SeededDice};
use crate::world::{CombatantId, Coord, Side};
use std::collections::VecDeque;

/// A dice request seen by [`ScriptedDice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiceRequest {
    D20(i32),
    Roll { expr: String, result: i32 },
    Max { expr: String, result: i32 },
    Choose { len: usize, result: usize },
}

/// A dice source that returns scripted results.
///
/// d20s and expression rolls come from separate queues. A scripted
/// expression roll replaces the dice sum; the flat modifier is still added,
/// so scripting `4` for `1d8+2` yields 6. Once a queue runs dry the seeded
/// fallback takes over.
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    d20s: VecDeque<i32>,
    rolls: VecDeque<i32>,
    choices: VecDeque<usize>,
    fallback: SeededDice,
    log: Vec<DiceRequest>,
}

impl Default for ScriptedDice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self {
            d20s: VecDeque::new(),
            rolls: VecDeque::new(),
            choices: VecDeque::new(),
            fallback: SeededDice::new(0),
            log: Vec::new(),
        }
    }

    /// Queue natural d20 results.
    pub fn with_d20s(mut self, values: impl IntoIterator<Item = i32>) -> Self {
        self.d20s.extend(values);
        self
    }

    /// Queue dice sums for expression rolls.
    pub fn with_rolls(mut self, values: impl IntoIterator<Item = i32>) -> Self {
        self.rolls.extend(values);
        self
    }

    /// Queue results for `choose`.
    pub fn with_choices(mut self, values: impl IntoIterator<Item = usize>) -> Self {
        self.choices.extend(values);
        self
    }

    /// Seed for the fallback source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.fallback = SeededDice::new(seed);
        self
    }

    pub fn push_d20(&mut self, value: i32) {
        self.d20s.push_back(value);
    }

    pub fn push_roll(&mut self, value: i32) {
        self.rolls.push_back(value);
    }

    /// Every request answered so far, in order.
    pub fn log(&self) -> &[DiceRequest] {
        &self.log
    }

    pub fn d20s_remaining(&self) -> usize {
        self.d20s.len()
    }

    pub fn rolls_remaining(&self) -> usize {
        self.rolls.len()
    }

    /// Number of d20s drawn so far.
    pub fn d20_count(&self) -> usize {
        self.log
            .iter()
            .filter(|r| matches!(r, DiceRequest::D20(_)))
            .count()
    }
}

impl DiceRoller for ScriptedDice {
    fn die(&mut self, sides: u32) -> i32 {
        self.fallback.die(sides)
    }

    fn choose(&mut self, len: usize) -> usize {
        let result = match self.choices.pop_front() {
            Some(choice) => choice.min(len.saturating_sub(1)),
            None => self.fallback.choose(len),
        };
        self.log.push(DiceRequest::Choose { len, result });
        result
    }

    fn roll(&mut self, expr: &DiceExpression) -> i32 {
        let result = match self.rolls.pop_front() {
            Some(value) if expr.has_dice() => value + expr.modifier,
            Some(value) => {
                // Flat expressions never consume a scripted value
                self.rolls.push_front(value);
                expr.modifier
            }
            None => self.fallback.roll(expr),
        };
        self.log.push(DiceRequest::Roll {
            expr: expr.to_string(),
            result,
        });
        result
    }

    fn roll_max(&self, expr: &DiceExpression) -> i32 {
        expr.max()
    }

    fn d20(&mut self) -> i32 {
        let value = match self.d20s.pop_front() {
            Some(value) => value,
            None => self.fallback.die(20),
        };
        self.log.push(DiceRequest::D20(value));
        value
    }
}

/// Every die lands on `face` (capped at the die size).
#[derive(Debug, Clone, Copy)]
pub struct FixedDice(pub i32);

impl DiceRoller for FixedDice {
    fn die(&mut self, sides: u32) -> i32 {
        self.0.clamp(1, sides as i32)
    }

    fn choose(&mut self, _len: usize) -> usize {
        0
    }
}

/// Builds small arenas for scripted fights.
pub struct ArenaHarness {
    pub arena: Arena,
}

impl ArenaHarness {
    /// An empty 10x10 arena driven by `dice`.
    pub fn new(dice: ScriptedDice) -> Self {
        Self::sized(10, 10, dice)
    }

    pub fn sized(width: i32, height: i32, dice: ScriptedDice) -> Self {
        Self {
            arena: Arena::new(width, height, Box::new(dice)),
        }
    }

    /// Place a combatant, panicking on a bad cell.
    pub fn place(&mut self, combatant: Combatant, at: Coord) -> CombatantId {
        match self.arena.add_combatant(combatant, Some(at)) {
            Ok(id) => id,
            Err(e) => panic!("cannot place combatant at {at}: {e}"),
        }
    }

    pub fn combatant(&self, id: CombatantId) -> &Combatant {
        self.arena.combatant(id)
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> &mut Combatant {
        self.arena.combatant_mut(id)
    }
}

/// A plain target dummy: 10s everywhere, no actions.
pub fn dummy(name: &str, side: &str, hp: i32, ac: i32) -> Combatant {
    match CombatantBuilder::new(name)
        .side(Side::new(side))
        .max_hp(hp)
        .armor_class(ac)
        .build()
    {
        Ok(c) => c,
        Err(e) => panic!("dummy stat block rejected: {e}"),
    }
}

/// Assert a combatant's current HP.
pub fn assert_hp(combatant: &Combatant, expected: i32) {
    assert_eq!(
        combatant.hit_points.current(),
        expected,
        "{} should have {} HP, has {}",
        combatant.name,
        expected,
        combatant.hit_points.current()
    );
}

/// Assert a combatant carries an effect.
pub fn assert_has_effect(combatant: &Combatant, name: &str) {
    assert!(
        combatant.effects.contains(name),
        "{} should have effect '{}', has {:?}",
        combatant.name,
        name,
        combatant.effects.names()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_queues_then_fallback() {
        let mut dice = ScriptedDice::new().with_d20s([20, 1]).with_rolls([4]);
        assert_eq!(dice.d20(), 20);
        assert_eq!(dice.d20(), 1);
        let expr = DiceExpression::parse("1d8+2").unwrap();
        assert_eq!(dice.roll(&expr), 6);

        let fallback = dice.d20();
        assert!((1..=20).contains(&fallback));
        assert_eq!(dice.d20_count(), 3);
    }

    #[test]
    fn test_flat_rolls_keep_the_queue() {
        let mut dice = ScriptedDice::new().with_rolls([5]);
        assert_eq!(dice.roll(&DiceExpression::flat(3)), 3);
        assert_eq!(dice.rolls_remaining(), 1);
    }

    #[test]
    fn test_fixed_dice() {
        let mut dice = FixedDice(6);
        assert_eq!(dice.die(4), 4);
        assert_eq!(dice.die(20), 6);
        assert_eq!(dice.roll(&DiceExpression::parse("2d8+1").unwrap()), 13);
    }
}
