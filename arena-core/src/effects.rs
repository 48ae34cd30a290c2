//! The effect pipeline.
//!
//! An [`Effect`] is a named, temporary modifier attached to one combatant
//! (its owner). Effects expose a fixed table of hooks, all with neutral
//! defaults; the rules resolver consults them at every decision point
//! without knowing about any particular ability.
//!
//! Every hook receives its owner explicitly. Effects never store a pointer
//! back to the combatant they live on; `cause` is a plain id used only for
//! attribution.
//!
//! [`EffectSet`] keeps effects in insertion order and aggregates hook
//! results in that order, which makes replays exact.

use crate::arena::ArenaView;
use crate::combatant::Combatant;
use crate::dice::{Advantage, DiceExpression, DiceRoller};
use crate::world::{Ability, CombatantId, Condition, Damage, DamageType};
use std::fmt;

/// Why a d20 is being rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollReason {
    Attack,
    SavingThrow(Ability),
    DeathSave,
    Initiative,
}

/// A saving throw a creature must make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveDc {
    pub ability: Ability,
    pub dc: i32,
}

impl SaveDc {
    pub fn new(ability: Ability, dc: i32) -> Self {
        Self { ability, dc }
    }
}

/// What a single attack looks like to the hooks.
#[derive(Debug, Clone, Copy)]
pub struct Strike<'a> {
    pub name: &'a str,
    pub damage_type: DamageType,
    pub ranged: bool,
    pub spell: bool,
    pub distance: i32,
    pub advantage: Advantage,
    /// Only meaningful once the attack has hit.
    pub critical: bool,
    /// Another living ally of the attacker stands next to the target.
    pub flanked: bool,
}

/// Saving-throw adjustments from one effect. Merging sums the bonuses and
/// ORs the flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveModifier {
    pub bonus: i32,
    pub advantage: bool,
    pub disadvantage: bool,
}

impl SaveModifier {
    pub fn bonus(bonus: i32) -> Self {
        Self {
            bonus,
            ..Self::default()
        }
    }

    pub fn advantage() -> Self {
        Self {
            advantage: true,
            ..Self::default()
        }
    }

    pub fn merge(self, other: SaveModifier) -> SaveModifier {
        SaveModifier {
            bonus: self.bonus + other.bonus,
            advantage: self.advantage || other.advantage,
            disadvantage: self.disadvantage || other.disadvantage,
        }
    }
}

/// A separate damage instance an effect adds to a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraDamage {
    /// Name the instance is recorded under in the statistics.
    pub label: String,
    pub dice: DiceExpression,
    /// `None` inherits the type of the triggering attack.
    pub kind: Option<DamageType>,
    /// Applies at most once per turn of the attacker, keyed by `label`.
    pub once_per_turn: bool,
}

impl ExtraDamage {
    pub fn new(label: impl Into<String>, dice: DiceExpression, kind: Option<DamageType>) -> Self {
        Self {
            label: label.into(),
            dice,
            kind,
            once_per_turn: false,
        }
    }

    pub fn once_per_turn(mut self) -> Self {
        self.once_per_turn = true;
        self
    }
}

/// Outcome of a start-of-turn hook, applied to the owner by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTick {
    Heal(i32),
    Damage(Damage),
    /// The effect ends now.
    Expire,
}

/// A temporary modifier attached to one combatant.
///
/// Implementors override only the hooks they need.
pub trait Effect: fmt::Debug {
    /// Unique key on the owner. Adding an effect with the same name replaces
    /// the existing one.
    fn name(&self) -> &str;

    /// Who created the effect, for attribution and concentration.
    fn cause(&self) -> Option<CombatantId> {
        None
    }

    /// Lifetime in rounds, counted down at the end of each of the owner's
    /// turns.
    fn duration(&self) -> Option<u32> {
        None
    }

    /// Runs when the effect is attached.
    fn initial(&self, _owner: &mut Combatant) {}

    /// Runs after the effect is detached, for whatever reason.
    fn on_removed(&self, _owner: &mut Combatant) {}

    /// Bonus to the owner's attack rolls.
    fn attack_to_hit(
        &self,
        _owner: &Combatant,
        _target: &Combatant,
        _strike: &Strike<'_>,
        _dice: &mut dyn DiceRoller,
    ) -> i32 {
        0
    }

    /// Flat bonus to the owner's damage rolls.
    fn damage_bonus(&self, _owner: &Combatant, _target: &Combatant, _strike: &Strike<'_>) -> i32 {
        0
    }

    /// Transform damage the owner is about to take.
    fn being_hit(&self, _owner: &Combatant, damage: Damage) -> Damage {
        damage
    }

    fn saving_throw(
        &self,
        _owner: &Combatant,
        _ability: Ability,
        _dice: &mut dyn DiceRoller,
    ) -> SaveModifier {
        SaveModifier::default()
    }

    fn ac_modifier(&self, _owner: &Combatant) -> i32 {
        0
    }

    /// The owner attacks `target` with advantage.
    fn gives_advantage(
        &self,
        _owner: &Combatant,
        _target: &Combatant,
        _strike: &Strike<'_>,
        _view: &ArenaView<'_>,
    ) -> bool {
        false
    }

    /// The owner attacks `target` with disadvantage.
    fn gives_disadvantage(
        &self,
        _owner: &Combatant,
        _target: &Combatant,
        _strike: &Strike<'_>,
        _view: &ArenaView<'_>,
    ) -> bool {
        false
    }

    /// Attacks against the owner have advantage.
    fn gives_advantage_against(
        &self,
        _owner: &Combatant,
        _attacker: &Combatant,
        _view: &ArenaView<'_>,
    ) -> bool {
        false
    }

    /// Attacks against the owner have disadvantage.
    fn gives_disadvantage_against(
        &self,
        _owner: &Combatant,
        _attacker: &Combatant,
        _view: &ArenaView<'_>,
    ) -> bool {
        false
    }

    /// Extra damage the owner deals when hitting `target`.
    fn source_additional_damage(
        &self,
        _owner: &Combatant,
        _target: &Combatant,
        _strike: &Strike<'_>,
    ) -> Option<ExtraDamage> {
        None
    }

    /// Extra damage the owner takes when hit by `source`.
    fn target_additional_damage(
        &self,
        _owner: &Combatant,
        _source: &Combatant,
        _strike: &Strike<'_>,
    ) -> Option<ExtraDamage> {
        None
    }

    fn start_turn(&self, _owner: &Combatant, _dice: &mut dyn DiceRoller) -> Option<TurnTick> {
        None
    }

    /// Polled at the end of the owner's turn; `true` removes the effect.
    fn ends_at_turn_end(&self, _owner: &Combatant, _dice: &mut dyn DiceRoller) -> bool {
        false
    }

    /// Removed once the owner has made an attack.
    fn ends_after_attacking(&self, _owner: &Combatant, _strike: &Strike<'_>) -> bool {
        false
    }

    /// Removed once the owner has been attacked.
    fn ends_after_attacked(&self, _owner: &Combatant, _strike: &Strike<'_>) -> bool {
        false
    }

    /// Adjust a natural d20; may reroll.
    fn d20(
        &self,
        _owner: &Combatant,
        value: i32,
        _reason: RollReason,
        _dice: &mut dyn DiceRoller,
    ) -> i32 {
        value
    }

    /// Keep the owner at 1 HP instead of dropping to 0. The effect is
    /// consumed when it triggers.
    fn prevents_fall(&self, _owner: &Combatant, _damage: &Damage) -> bool {
        false
    }
}

#[derive(Debug)]
struct ActiveEffect {
    effect: Box<dyn Effect>,
    remaining_rounds: Option<u32>,
}

/// Insertion-ordered effects, keyed by name.
#[derive(Debug, Default)]
pub struct EffectSet {
    entries: Vec<ActiveEffect>,
}

impl EffectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Effect> {
        self.position(name).map(|i| self.entries[i].effect.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Effect> + '_ {
        self.entries.iter().map(|e| e.effect.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn remaining_rounds(&self, name: &str) -> Option<u32> {
        self.position(name)
            .and_then(|i| self.entries[i].remaining_rounds)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.effect.name() == name)
    }

    /// Take an effect out, remembering the slot it occupied.
    pub(crate) fn detach(&mut self, name: &str) -> Option<(usize, Box<dyn Effect>)> {
        let index = self.position(name)?;
        Some((index, self.entries.remove(index).effect))
    }

    /// Put an effect into `slot`, or at the end when there is none.
    pub(crate) fn attach(&mut self, slot: Option<usize>, effect: Box<dyn Effect>) {
        let entry = ActiveEffect {
            remaining_rounds: effect.duration(),
            effect,
        };
        match slot {
            Some(index) if index <= self.entries.len() => self.entries.insert(index, entry),
            _ => self.entries.push(entry),
        }
    }

    /// Count down durations; returns the names that ran out.
    pub(crate) fn tick(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for entry in &mut self.entries {
            if let Some(rounds) = entry.remaining_rounds.as_mut() {
                *rounds = rounds.saturating_sub(1);
                if *rounds == 0 {
                    expired.push(entry.effect.name().to_string());
                }
            }
        }
        expired
    }

    // ------------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------------

    pub fn to_hit_bonus(
        &self,
        owner: &Combatant,
        target: &Combatant,
        strike: &Strike<'_>,
        dice: &mut dyn DiceRoller,
    ) -> i32 {
        self.iter()
            .map(|e| e.attack_to_hit(owner, target, strike, dice))
            .sum()
    }

    pub fn damage_bonus(&self, owner: &Combatant, target: &Combatant, strike: &Strike<'_>) -> i32 {
        self.iter()
            .map(|e| e.damage_bonus(owner, target, strike))
            .sum()
    }

    /// Fold incoming damage through every effect in order.
    pub fn transform_incoming(&self, owner: &Combatant, damage: Damage) -> Damage {
        self.iter().fold(damage, |d, e| e.being_hit(owner, d))
    }

    pub fn save_modifier(
        &self,
        owner: &Combatant,
        ability: Ability,
        dice: &mut dyn DiceRoller,
    ) -> SaveModifier {
        self.iter().fold(SaveModifier::default(), |acc, e| {
            acc.merge(e.saving_throw(owner, ability, dice))
        })
    }

    pub fn ac_modifier(&self, owner: &Combatant) -> i32 {
        self.iter().map(|e| e.ac_modifier(owner)).sum()
    }

    pub fn advantage_on_attack(
        &self,
        owner: &Combatant,
        target: &Combatant,
        strike: &Strike<'_>,
        view: &ArenaView<'_>,
    ) -> bool {
        self.iter()
            .any(|e| e.gives_advantage(owner, target, strike, view))
    }

    pub fn disadvantage_on_attack(
        &self,
        owner: &Combatant,
        target: &Combatant,
        strike: &Strike<'_>,
        view: &ArenaView<'_>,
    ) -> bool {
        self.iter()
            .any(|e| e.gives_disadvantage(owner, target, strike, view))
    }

    pub fn advantage_for_attackers(
        &self,
        owner: &Combatant,
        attacker: &Combatant,
        view: &ArenaView<'_>,
    ) -> bool {
        self.iter()
            .any(|e| e.gives_advantage_against(owner, attacker, view))
    }

    pub fn disadvantage_for_attackers(
        &self,
        owner: &Combatant,
        attacker: &Combatant,
        view: &ArenaView<'_>,
    ) -> bool {
        self.iter()
            .any(|e| e.gives_disadvantage_against(owner, attacker, view))
    }

    pub fn extra_damage_dealt(
        &self,
        owner: &Combatant,
        target: &Combatant,
        strike: &Strike<'_>,
    ) -> Vec<ExtraDamage> {
        self.iter()
            .filter_map(|e| e.source_additional_damage(owner, target, strike))
            .filter(|extra| extra.dice.has_dice() || extra.dice.modifier != 0)
            .collect()
    }

    pub fn extra_damage_taken(
        &self,
        owner: &Combatant,
        source: &Combatant,
        strike: &Strike<'_>,
    ) -> Vec<ExtraDamage> {
        self.iter()
            .filter_map(|e| e.target_additional_damage(owner, source, strike))
            .filter(|extra| extra.dice.has_dice() || extra.dice.modifier != 0)
            .collect()
    }

    /// Start-of-turn outcomes, tagged with the effect that produced them.
    pub fn start_turn(&self, owner: &Combatant, dice: &mut dyn DiceRoller) -> Vec<(String, TurnTick)> {
        self.iter()
            .filter_map(|e| e.start_turn(owner, dice).map(|t| (e.name().to_string(), t)))
            .collect()
    }

    /// Names of effects whose turn-end predicate fires.
    pub fn ending_at_turn_end(&self, owner: &Combatant, dice: &mut dyn DiceRoller) -> Vec<String> {
        self.iter()
            .filter(|e| e.ends_at_turn_end(owner, dice))
            .map(|e| e.name().to_string())
            .collect()
    }

    pub fn ending_after_attacking(&self, owner: &Combatant, strike: &Strike<'_>) -> Vec<String> {
        self.iter()
            .filter(|e| e.ends_after_attacking(owner, strike))
            .map(|e| e.name().to_string())
            .collect()
    }

    pub fn ending_after_attacked(&self, owner: &Combatant, strike: &Strike<'_>) -> Vec<String> {
        self.iter()
            .filter(|e| e.ends_after_attacked(owner, strike))
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Each effect sees the previous effect's output.
    pub fn adjust_d20(
        &self,
        owner: &Combatant,
        value: i32,
        reason: RollReason,
        dice: &mut dyn DiceRoller,
    ) -> i32 {
        self.iter()
            .fold(value, |v, e| e.d20(owner, v, reason, dice))
    }

    /// First effect willing to keep the owner standing.
    pub fn fall_preventer(&self, owner: &Combatant, damage: &Damage) -> Option<String> {
        self.iter()
            .find(|e| e.prevents_fall(owner, damage))
            .map(|e| e.name().to_string())
    }
}

// ============================================================================
// Conditions granted by an effect
// ============================================================================

/// Grants one or more conditions until a saving throw or a duration ends it.
///
/// This is the standard shape for "save or be paralyzed, repeat the save at
/// the end of each turn" riders.
#[derive(Debug, Clone)]
pub struct ConditionEffect {
    name: String,
    conditions: Vec<Condition>,
    cause: Option<CombatantId>,
    save_ends: Option<SaveDc>,
    duration: Option<u32>,
}

impl ConditionEffect {
    pub fn new(name: impl Into<String>, condition: Condition) -> Self {
        Self {
            name: name.into(),
            conditions: vec![condition],
            cause: None,
            save_ends: None,
            duration: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn caused_by(mut self, cause: CombatantId) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Repeat the save at the end of each of the owner's turns.
    pub fn save_ends(mut self, save: SaveDc) -> Self {
        self.save_ends = Some(save);
        self
    }

    pub fn lasting(mut self, rounds: u32) -> Self {
        self.duration = Some(rounds);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl Effect for ConditionEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn cause(&self) -> Option<CombatantId> {
        self.cause
    }

    fn duration(&self) -> Option<u32> {
        self.duration
    }

    fn initial(&self, owner: &mut Combatant) {
        for condition in &self.conditions {
            owner.add_condition(*condition, &self.name);
        }
    }

    fn on_removed(&self, owner: &mut Combatant) {
        owner.clear_conditions_from(&self.name);
    }

    fn ends_at_turn_end(&self, owner: &Combatant, dice: &mut dyn DiceRoller) -> bool {
        match self.save_ends {
            Some(save) => owner.saving_throw(save.ability, save.dc, dice).success,
            None => false,
        }
    }
}
