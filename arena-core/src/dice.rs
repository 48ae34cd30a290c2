//! Dice notation and the injectable randomness source.
//!
//! Supports standard notation: XdY+Z, including several dice groups
//! (`2d6+1d4+3`). Every draw the engine makes goes through a
//! [`DiceRoller`], so a seeded or scripted source can be swapped in and an
//! encounter replayed exactly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Resolve the sources present on a roll.
    ///
    /// Any advantage together with any disadvantage is a normal roll, no
    /// matter how many sources stand on either side.
    pub fn from_sources(advantage: bool, disadvantage: bool) -> Advantage {
        match (advantage, disadvantage) {
            (true, false) => Advantage::Advantage,
            (false, true) => Advantage::Disadvantage,
            _ => Advantage::Normal,
        }
    }
}

/// Standard D&D die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A group of identical dice, e.g. the `2d6` in `2d6+3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceGroup {
    pub count: u32,
    pub die_type: DieType,
}

/// A complete dice expression (e.g., 2d6+3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub groups: Vec<DiceGroup>,
    pub modifier: i32,
}

impl DiceExpression {
    /// `count` dice of one type with no flat bonus.
    pub fn of(count: u32, die_type: DieType) -> Self {
        Self {
            groups: vec![DiceGroup { count, die_type }],
            modifier: 0,
        }
    }

    /// A flat amount with no dice at all.
    pub fn flat(value: i32) -> Self {
        Self {
            groups: Vec::new(),
            modifier: value,
        }
    }

    /// Add a flat bonus to the expression.
    pub fn plus(mut self, bonus: i32) -> Self {
        self.modifier += bonus;
        self
    }

    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut groups = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_term(&current, sign, &mut groups, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_term(&current, sign, &mut groups, &mut modifier)?;
        }

        if groups.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression { groups, modifier })
    }

    fn parse_term(
        s: &str,
        sign: i32,
        groups: &mut Vec<DiceGroup>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            // Subtracted dice have no meaning for damage or checks
            if sign < 0 {
                return Err(DiceError::InvalidNotation(format!("-{s}")));
            }

            let count_str = &s[..d_pos];
            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };

            let sides: u32 = s[d_pos + 1..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

            groups.push(DiceGroup { count, die_type });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier += sign * value;
        }

        Ok(())
    }

    /// The same dice without the flat bonus.
    pub fn dice_only(&self) -> DiceExpression {
        DiceExpression {
            groups: self.groups.clone(),
            modifier: 0,
        }
    }

    /// Smallest possible total.
    pub fn min(&self) -> i32 {
        self.groups.iter().map(|g| g.count as i32).sum::<i32>() + self.modifier
    }

    /// Largest possible total.
    pub fn max(&self) -> i32 {
        self.groups
            .iter()
            .map(|g| (g.count * g.die_type.sides()) as i32)
            .sum::<i32>()
            + self.modifier
    }

    /// Mean total, used by the tactical heuristics.
    pub fn average(&self) -> f64 {
        self.groups
            .iter()
            .map(|g| g.count as f64 * (g.die_type.sides() as f64 + 1.0) / 2.0)
            .sum::<f64>()
            + self.modifier as f64
    }

    pub fn has_dice(&self) -> bool {
        self.groups.iter().any(|g| g.count > 0)
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dice: Vec<String> = self
            .groups
            .iter()
            .map(|g| format!("{}{}", g.count, g.die_type))
            .collect();
        let dice = dice.join("+");

        match (dice.is_empty(), self.modifier) {
            (true, m) => write!(f, "{m}"),
            (false, 0) => write!(f, "{dice}"),
            (false, m) if m > 0 => write!(f, "{dice}+{m}"),
            (false, m) => write!(f, "{dice}-{}", m.abs()),
        }
    }
}

/// Source of every random draw in the engine.
///
/// Implementations must be deterministic for a given construction so that
/// encounters replay exactly.
pub trait DiceRoller {
    /// Roll a single die with `sides` faces.
    fn die(&mut self, sides: u32) -> i32;

    /// Pick an index in `0..len`. `len` must be non-zero.
    fn choose(&mut self, len: usize) -> usize;

    /// Roll a full expression, flat bonus included.
    fn roll(&mut self, expr: &DiceExpression) -> i32 {
        let mut total = expr.modifier;
        for group in &expr.groups {
            for _ in 0..group.count {
                total += self.die(group.die_type.sides());
            }
        }
        total
    }

    /// The maximum the expression can produce, flat bonus included.
    fn roll_max(&self, expr: &DiceExpression) -> i32 {
        expr.max()
    }

    /// A single natural d20.
    fn d20(&mut self) -> i32 {
        self.die(20)
    }
}

/// Seeded source backed by ChaCha8, the default for simulations.
#[derive(Debug, Clone)]
pub struct SeededDice {
    seed: u64,
    rng: ChaCha8Rng,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl DiceRoller for SeededDice {
    fn die(&mut self, sides: u32) -> i32 {
        self.rng.gen_range(1..=sides) as i32
    }

    fn choose(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Outcome of a d20 roll made with or without advantage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct D20Roll {
    /// The die that counts.
    pub natural: i32,
    /// The die thrown away under advantage or disadvantage.
    pub discarded: Option<i32>,
    pub advantage: Advantage,
}

/// Roll a d20, twice when advantage or disadvantage applies.
pub fn roll_d20(dice: &mut dyn DiceRoller, advantage: Advantage) -> D20Roll {
    let first = dice.d20();
    match advantage {
        Advantage::Normal => D20Roll {
            natural: first,
            discarded: None,
            advantage,
        },
        Advantage::Advantage | Advantage::Disadvantage => {
            let second = dice.d20();
            let keep_first = match advantage {
                Advantage::Advantage => first >= second,
                _ => first <= second,
            };
            let (natural, discarded) = if keep_first {
                (first, second)
            } else {
                (second, first)
            };
            D20Roll {
                natural,
                discarded: Some(discarded),
                advantage,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.groups.len(), 1);
        assert_eq!(expr.groups[0].count, 1);
        assert_eq!(expr.groups[0].die_type, DieType::D20);
        assert_eq!(expr.modifier, 0);
    }

    #[test]
    fn test_parse_with_modifier() {
        let expr = DiceExpression::parse("1d12+3").unwrap();
        assert_eq!(expr.modifier, 3);

        let expr = DiceExpression::parse("2d6-2").unwrap();
        assert_eq!(expr.modifier, -2);
    }

    #[test]
    fn test_parse_multiple_dice() {
        let expr = DiceExpression::parse("2d6+1d4+3").unwrap();
        assert_eq!(expr.groups.len(), 2);
        assert_eq!(expr.modifier, 3);
        assert_eq!(expr.to_string(), "2d6+1d4+3");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(DiceExpression::parse(""), Err(DiceError::NoDice));
        assert_eq!(
            DiceExpression::parse("1d7"),
            Err(DiceError::InvalidDieSize(7))
        );
        assert!(matches!(
            DiceExpression::parse("1d6-1d4"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert!(matches!(
            DiceExpression::parse("xd6"),
            Err(DiceError::InvalidNotation(_))
        ));
    }

    #[test]
    fn test_bounds_and_dice_only() {
        let expr = DiceExpression::parse("2d6+3").unwrap();
        assert_eq!(expr.min(), 5);
        assert_eq!(expr.max(), 15);
        assert_eq!(expr.average(), 10.0);
        assert_eq!(expr.dice_only().to_string(), "2d6");
        assert_eq!(DiceExpression::flat(-2).to_string(), "-2");
    }

    #[test]
    fn test_seeded_roll_range_and_replay() {
        let expr = DiceExpression::parse("1d20+5").unwrap();
        let mut a = SeededDice::new(42);
        let mut b = SeededDice::new(42);
        for _ in 0..100 {
            let x = a.roll(&expr);
            assert!((6..=25).contains(&x));
            assert_eq!(x, b.roll(&expr));
        }
    }

    #[test]
    fn test_roll_max_includes_modifier() {
        let dice = SeededDice::new(1);
        let expr = DiceExpression::parse("1d12+3").unwrap();
        assert_eq!(dice.roll_max(&expr), 15);
        assert_eq!(dice.roll_max(&expr.dice_only()), 12);
    }

    #[test]
    fn test_advantage_sources_cancel() {
        assert_eq!(Advantage::from_sources(true, false), Advantage::Advantage);
        assert_eq!(
            Advantage::from_sources(false, true),
            Advantage::Disadvantage
        );
        assert_eq!(Advantage::from_sources(true, true), Advantage::Normal);
        assert_eq!(Advantage::from_sources(false, false), Advantage::Normal);
    }

    #[test]
    fn test_roll_d20_keeps_the_right_die() {
        let mut dice = ScriptedDice::new().with_d20s([4, 17, 4, 17, 9]);
        let adv = roll_d20(&mut dice, Advantage::Advantage);
        assert_eq!(adv.natural, 17);
        assert_eq!(adv.discarded, Some(4));

        let dis = roll_d20(&mut dice, Advantage::Disadvantage);
        assert_eq!(dis.natural, 4);

        let normal = roll_d20(&mut dice, Advantage::Normal);
        assert_eq!(normal.natural, 9);
        assert_eq!(normal.discarded, None);
    }
}
