//! Value types shared across the engine.
//!
//! Identity, sides, grid coordinates, ability scores, conditions, damage
//! and hit points. Nothing here knows about the arena or the effect
//! pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

const COMBATANT_NAMESPACE: Uuid = Uuid::from_u128(0x6b1e_52f0_9d4c_4a3e_8f27_11c5_0e9a_d3b4);

/// Unique identifier for a combatant within an arena.
///
/// Derived from the registration slot and the name, so the ordering of ids
/// is arbitrary but identical on every replay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CombatantId(pub Uuid);

impl CombatantId {
    pub fn derive(slot: usize, name: &str) -> Self {
        Self(Uuid::new_v5(
            &COMBATANT_NAMESPACE,
            format!("{slot}:{name}").as_bytes(),
        ))
    }

    /// Placeholder carried by a combatant that has not been registered yet.
    pub fn unassigned() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_assigned(&self) -> bool {
        !self.0.is_nil()
    }
}

impl Default for CombatantId {
    fn default() -> Self {
        Self::unassigned()
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team tag. Combat ends when fewer than two sides have a living member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Side(pub String);

impl Side {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Side {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Grid coordinates
// ============================================================================

/// A cell on the arena grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Floor of the Euclidean distance, in cells.
    ///
    /// Diagonal neighbours are at distance 1, so melee adjacency is a
    /// plain `distance <= 1` check.
    pub fn distance(self, other: Coord) -> i32 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt().floor() as i32
    }

    /// Unrounded Euclidean distance, used as the pathfinding heuristic.
    pub fn euclidean(self, other: Coord) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// True for the eight surrounding cells (not the cell itself).
    pub fn is_adjacent(self, other: Coord) -> bool {
        self != other && (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }

    pub fn offset(self, dx: i32, dy: i32) -> Coord {
        Coord::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown ability: {0}")]
pub struct UnknownAbility(pub String);

impl FromStr for Ability {
    type Err = UnknownAbility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "str" | "strength" => Ok(Ability::Strength),
            "dex" | "dexterity" => Ok(Ability::Dexterity),
            "con" | "constitution" => Ok(Ability::Constitution),
            "int" | "intelligence" => Ok(Ability::Intelligence),
            "wis" | "wisdom" => Ok(Ability::Wisdom),
            "cha" | "charisma" => Ok(Ability::Charisma),
            _ => Err(UnknownAbility(s.to_string())),
        }
    }
}

/// Ability scores container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub const MIN: u8 = 3;
    pub const MAX: u8 = 30;

    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    /// Score 8-9 = -1, 10-11 = 0, 12-13 = +1, and so on.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.get(ability) as i32 - 10).div_euclid(2)
    }

    /// First score outside 3..=30, if any.
    pub fn out_of_range(&self) -> Option<(Ability, u8)> {
        Ability::all()
            .into_iter()
            .map(|a| (a, self.get(a)))
            .find(|(_, score)| !(Self::MIN..=Self::MAX).contains(score))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Creature types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CreatureType {
    #[default]
    Humanoid,
    Beast,
    Giant,
    Monstrosity,
    Undead,
    Fiend,
}

impl CreatureType {
    pub fn name(&self) -> &'static str {
        match self {
            CreatureType::Humanoid => "humanoid",
            CreatureType::Beast => "beast",
            CreatureType::Giant => "giant",
            CreatureType::Monstrosity => "monstrosity",
            CreatureType::Undead => "undead",
            CreatureType::Fiend => "fiend",
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// D&D 5e conditions, plus `Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
    Exhaustion(u8),
    Dead,
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Blinded => "Blinded",
            Condition::Charmed => "Charmed",
            Condition::Deafened => "Deafened",
            Condition::Frightened => "Frightened",
            Condition::Grappled => "Grappled",
            Condition::Incapacitated => "Incapacitated",
            Condition::Invisible => "Invisible",
            Condition::Paralyzed => "Paralyzed",
            Condition::Petrified => "Petrified",
            Condition::Poisoned => "Poisoned",
            Condition::Prone => "Prone",
            Condition::Restrained => "Restrained",
            Condition::Stunned => "Stunned",
            Condition::Unconscious => "Unconscious",
            Condition::Exhaustion(_) => "Exhaustion",
            Condition::Dead => "Dead",
        }
    }

    /// The creature cannot take actions or reactions.
    pub fn is_incapacitating(&self) -> bool {
        matches!(
            self,
            Condition::Incapacitated
                | Condition::Paralyzed
                | Condition::Petrified
                | Condition::Stunned
                | Condition::Unconscious
                | Condition::Dead
        )
    }

    /// Attack rolls against a creature with this condition have advantage.
    /// Prone is range dependent and handled by the resolver.
    pub fn exposes_to_attacks(&self) -> bool {
        matches!(
            self,
            Condition::Blinded
                | Condition::Paralyzed
                | Condition::Petrified
                | Condition::Restrained
                | Condition::Stunned
                | Condition::Unconscious
        )
    }

    /// The creature's own attack rolls have disadvantage.
    pub fn hampers_attacks(&self) -> bool {
        matches!(
            self,
            Condition::Blinded
                | Condition::Frightened
                | Condition::Poisoned
                | Condition::Prone
                | Condition::Restrained
        ) || matches!(self, Condition::Exhaustion(level) if *level >= 3)
    }

    /// Strength and Dexterity saves fail automatically.
    pub fn fails_physical_saves(&self) -> bool {
        matches!(
            self,
            Condition::Paralyzed | Condition::Petrified | Condition::Stunned | Condition::Unconscious
        )
    }

    /// Any hit from within 5 feet is a critical hit.
    pub fn melee_hits_are_critical(&self) -> bool {
        matches!(self, Condition::Paralyzed | Condition::Unconscious)
    }

    /// Speed becomes zero.
    pub fn roots(&self) -> bool {
        matches!(
            self,
            Condition::Grappled
                | Condition::Restrained
                | Condition::Paralyzed
                | Condition::Petrified
                | Condition::Stunned
                | Condition::Unconscious
        ) || matches!(self, Condition::Exhaustion(level) if *level >= 5)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Exhaustion(level) => write!(f, "Exhaustion ({level})"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// A condition applied to a creature, tagged with whatever granted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub condition: Condition,
    pub source: String,
}

impl ActiveCondition {
    pub fn new(condition: Condition, source: impl Into<String>) -> Self {
        Self {
            condition,
            source: source.into(),
        }
    }
}

// ============================================================================
// Damage
// ============================================================================

/// Common D&D damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Force => "force",
            DamageType::Psychic => "psychic",
        }
    }

    pub fn is_physical(&self) -> bool {
        matches!(
            self,
            DamageType::Slashing | DamageType::Piercing | DamageType::Bludgeoning
        )
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An amount of damage of one type. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Damage {
    pub amount: i32,
    pub kind: DamageType,
}

impl Damage {
    pub fn new(amount: i32, kind: DamageType) -> Self {
        Self {
            amount: amount.max(0),
            kind,
        }
    }

    pub fn none(kind: DamageType) -> Self {
        Self { amount: 0, kind }
    }

    /// Half the amount, rounded down.
    pub fn halved(self) -> Self {
        Self::new(self.amount / 2, self.kind)
    }

    pub fn doubled(self) -> Self {
        Self::new(self.amount * 2, self.kind)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl Add<i32> for Damage {
    type Output = Damage;

    fn add(self, rhs: i32) -> Damage {
        Damage::new(self.amount + rhs, self.kind)
    }
}

/// Sums amounts; the result keeps the left operand's type.
impl Add for Damage {
    type Output = Damage;

    fn add(self, rhs: Damage) -> Damage {
        Damage::new(self.amount + rhs.amount, self.kind)
    }
}

impl fmt::Display for Damage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.kind)
    }
}

// ============================================================================
// Hit Points and Health
// ============================================================================

/// Hit points, always within `0..=maximum`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    current: i32,
    maximum: i32,
}

/// Result of taking damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    /// HP actually lost.
    pub lost: i32,
    /// Damage left over after HP reached zero.
    pub overflow: i32,
    pub dropped_to_zero: bool,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        let maximum = maximum.max(1);
        Self {
            current: maximum,
            maximum,
        }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn maximum(&self) -> i32 {
        self.maximum
    }

    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        let amount = amount.max(0);
        let before = self.current;
        self.current = (self.current - amount).max(0);
        DamageResult {
            lost: before - self.current,
            overflow: amount - (before - self.current),
            dropped_to_zero: before > 0 && self.current == 0,
        }
    }

    /// Returns the HP actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount.max(0)).min(self.maximum);
        self.current - old
    }

    pub fn set_current(&mut self, value: i32) {
        self.current = value.clamp(0, self.maximum);
    }

    /// Change the maximum; current HP is clamped down if it now exceeds it.
    pub fn set_maximum(&mut self, maximum: i32) {
        self.maximum = maximum.max(1);
        self.current = self.current.min(self.maximum);
    }

    pub fn is_zero(&self) -> bool {
        self.current == 0
    }

    pub fn ratio(&self) -> f64 {
        self.current as f64 / self.maximum as f64
    }
}

/// Death saving throws.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
    pub stable: bool,
}

impl DeathSaves {
    /// Returns true once three successes are reached.
    pub fn add_success(&mut self) -> bool {
        self.successes = (self.successes + 1).min(3);
        if self.successes >= 3 {
            self.stable = true;
        }
        self.stable
    }

    /// Returns true once three failures are reached.
    pub fn add_failures(&mut self, count: u8) -> bool {
        self.failures = (self.failures + count).min(3);
        self.failures >= 3
    }

    pub fn reset(&mut self) {
        self.successes = 0;
        self.failures = 0;
        self.stable = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_distance() {
        assert_eq!(Coord::new(0, 0).distance(Coord::new(3, 4)), 5);
        assert_eq!(Coord::new(0, 0).distance(Coord::new(1, 1)), 1);
        assert_eq!(Coord::new(0, 0).distance(Coord::new(2, 2)), 2);
        assert_eq!(Coord::new(5, 5).distance(Coord::new(5, 5)), 0);
    }

    #[test]
    fn test_adjacency() {
        let c = Coord::new(3, 3);
        assert!(c.is_adjacent(Coord::new(4, 4)));
        assert!(!c.is_adjacent(c));
        assert!(!c.is_adjacent(Coord::new(5, 3)));
    }

    #[test]
    fn test_modifier_floor() {
        let scores = AbilityScores::new(8, 9, 10, 11, 12, 30);
        assert_eq!(scores.modifier(Ability::Strength), -1);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
        assert_eq!(scores.modifier(Ability::Constitution), 0);
        assert_eq!(scores.modifier(Ability::Intelligence), 0);
        assert_eq!(scores.modifier(Ability::Wisdom), 1);
        assert_eq!(scores.modifier(Ability::Charisma), 10);
        assert_eq!(AbilityScores::new(3, 10, 10, 10, 10, 10).modifier(Ability::Strength), -4);
    }

    #[test]
    fn test_score_range_validation() {
        assert_eq!(AbilityScores::default().out_of_range(), None);
        let bad = AbilityScores::new(10, 2, 10, 10, 10, 31);
        assert_eq!(bad.out_of_range(), Some((Ability::Dexterity, 2)));
    }

    #[test]
    fn test_ability_from_str() {
        assert_eq!("dex".parse::<Ability>(), Ok(Ability::Dexterity));
        assert_eq!("Wisdom".parse::<Ability>(), Ok(Ability::Wisdom));
        assert!("luck".parse::<Ability>().is_err());
    }

    #[test]
    fn test_damage_arithmetic() {
        let d = Damage::new(7, DamageType::Fire);
        assert_eq!(d.halved().amount, 3);
        assert_eq!(d.doubled().amount, 14);
        assert_eq!((d + 3).amount, 10);
        assert_eq!((d + -20).amount, 0);
        assert_eq!(Damage::new(-4, DamageType::Cold).amount, 0);
        assert_eq!((d + Damage::new(2, DamageType::Cold)).kind, DamageType::Fire);
    }

    #[test]
    fn test_hit_points_clamp() {
        let mut hp = HitPoints::new(10);
        let result = hp.take_damage(14);
        assert_eq!(hp.current(), 0);
        assert_eq!(result.lost, 10);
        assert_eq!(result.overflow, 4);
        assert!(result.dropped_to_zero);

        assert_eq!(hp.heal(25), 10);
        assert_eq!(hp.current(), 10);

        hp.set_maximum(6);
        assert_eq!(hp.current(), 6);
        hp.set_maximum(12);
        assert_eq!(hp.current(), 6);
    }

    #[test]
    fn test_death_saves() {
        let mut saves = DeathSaves::default();
        assert!(!saves.add_failures(2));
        assert!(saves.add_failures(2));
        assert_eq!(saves.failures, 3);

        saves.reset();
        saves.add_success();
        saves.add_success();
        assert!(saves.add_success());
        assert!(saves.stable);
    }

    #[test]
    fn test_ids_are_stable() {
        let a = CombatantId::derive(0, "Goblin");
        assert_eq!(a, CombatantId::derive(0, "Goblin"));
        assert_ne!(a, CombatantId::derive(1, "Goblin"));
        assert!(a.is_assigned());
        assert!(!CombatantId::unassigned().is_assigned());
    }
}
