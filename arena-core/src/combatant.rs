//! The combatant aggregate.
//!
//! A [`Combatant`] holds everything the engine knows about one creature:
//! stats, hit points, conditions, its actions and reactions, the active
//! effect set and per-encounter bookkeeping. It is created through
//! [`CombatantBuilder`], registered into an arena, and never removed; a dead
//! combatant stays in the roster but drops out of alive-queries.

use crate::actions::{Action, ActionCategory};
use crate::dice::{roll_d20, Advantage, DiceExpression, DiceRoller};
use crate::effects::{Effect, EffectSet, RollReason, TurnTick};
use crate::report::{AttackStats, CombatantReport};
use crate::tactics::{ClosestEnemy, TargetPolicy};
use crate::world::{
    Ability, AbilityScores, ActiveCondition, CombatantId, Condition, Coord, CreatureType, Damage,
    DamageType, DeathSaves, HitPoints, Side,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

/// Source tag for the unconscious condition applied at 0 HP.
pub const FALLEN: &str = "0 HP";

// ============================================================================
// Turn economy
// ============================================================================

/// What a combatant may still do this turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnEconomy {
    pub action: bool,
    pub bonus_action: bool,
    pub reaction: bool,
    /// Grid cells of movement left.
    pub movement: i32,
    /// Once-per-turn features already used.
    spent: BTreeSet<String>,
}

impl TurnEconomy {
    /// Everything back, as at the start of the owner's turn.
    pub fn refresh(&mut self, movement: i32) {
        self.action = true;
        self.bonus_action = true;
        self.reaction = true;
        self.movement = movement;
        self.spent.clear();
    }

    pub fn has(&self, category: ActionCategory) -> bool {
        match category {
            ActionCategory::Action => self.action,
            ActionCategory::BonusAction => self.bonus_action,
            ActionCategory::Reaction => self.reaction,
            ActionCategory::Movement => self.movement > 0,
        }
    }

    /// Use up a slot. Returns false when it was already gone.
    pub fn spend(&mut self, category: ActionCategory) -> bool {
        let slot = match category {
            ActionCategory::Action => &mut self.action,
            ActionCategory::BonusAction => &mut self.bonus_action,
            ActionCategory::Reaction => &mut self.reaction,
            ActionCategory::Movement => {
                let had = self.movement > 0;
                self.movement = 0;
                return had;
            }
        };
        std::mem::replace(slot, false)
    }

    pub fn spend_movement(&mut self, cells: i32) {
        self.movement = (self.movement - cells).max(0);
    }

    /// Mark a once-per-turn feature used. Returns false if it already was.
    pub fn mark_spent(&mut self, tag: &str) -> bool {
        self.spent.insert(tag.to_string())
    }

    pub fn is_spent(&self, tag: &str) -> bool {
        self.spent.contains(tag)
    }

    /// Forget once-per-turn features. Slots and movement are untouched.
    pub fn clear_spent(&mut self) {
        self.spent.clear();
    }

    /// Nothing left to do.
    pub fn clear(&mut self) {
        *self = TurnEconomy::default();
    }
}

// ============================================================================
// State
// ============================================================================

/// Whether a combatant can act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum State {
    Ok,
    Incapacitated,
    Unconscious,
    Dead,
}

impl State {
    pub fn label(&self) -> &'static str {
        match self {
            State::Ok => "ok",
            State::Incapacitated => "incapacitated",
            State::Unconscious => "unconscious",
            State::Dead => "dead",
        }
    }
}

/// A spell the combatant is concentrating on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concentration {
    pub spell: String,
    /// Name of the effect the spell placed.
    pub effect: String,
    pub targets: Vec<CombatantId>,
}

/// What a single instance of damage did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitReport {
    /// Damage after mitigation and effect transforms.
    pub dealt: i32,
    pub hp_after: i32,
    pub dropped: bool,
    pub died: bool,
    /// Set when the hit broke concentration; the caller ends the spell.
    pub lost_concentration: Option<Concentration>,
}

/// Outcome of a saving throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// `None` when the save failed automatically.
    pub natural: Option<i32>,
    pub total: i32,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathSaveOutcome {
    Success,
    Failure,
    Stabilized,
    Died,
    /// Natural 20: back up with 1 HP.
    Revived,
}

/// What happened at the start of a turn.
#[derive(Debug, Clone, Default)]
pub struct TurnStart {
    pub ticks: Vec<(String, TurnTick)>,
    pub died: bool,
    pub lost_concentration: Option<Concentration>,
}

// ============================================================================
// Combatant
// ============================================================================

#[derive(Debug)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub side: Side,
    pub creature_type: CreatureType,
    pub abilities: AbilityScores,
    pub proficiency: i32,
    pub save_proficiencies: Vec<Ability>,
    pub hit_points: HitPoints,
    pub base_armor_class: i32,
    /// Speed in feet.
    pub speed: i32,
    pub position: Option<Coord>,
    /// Natural roll at or above which an attack is critical.
    pub critical_threshold: i32,
    pub economy: TurnEconomy,
    pub actions: Vec<Box<dyn Action>>,
    pub reactions: Vec<Box<dyn Action>>,
    pub effects: EffectSet,
    pub conditions: Vec<ActiveCondition>,
    pub resistances: BTreeSet<DamageType>,
    pub vulnerabilities: BTreeSet<DamageType>,
    pub immunities: BTreeSet<DamageType>,
    pub condition_immunities: Vec<Condition>,
    /// `Some` for creatures that make death saving throws at 0 HP.
    pub death_saves: Option<DeathSaves>,
    pub concentration: Option<Concentration>,
    pub policy: Box<dyn TargetPolicy>,
    pub stats: BTreeMap<String, AttackStats>,
    pub damage_this_turn: Vec<Damage>,
    pub damage_last_turn: Vec<Damage>,
    pub initiative: Option<i32>,
}

impl Combatant {
    pub fn modifier(&self, ability: Ability) -> i32 {
        self.abilities.modifier(ability)
    }

    pub fn save_bonus(&self, ability: Ability) -> i32 {
        let proficient = self.save_proficiencies.contains(&ability);
        self.modifier(ability) + if proficient { self.proficiency } else { 0 }
    }

    /// Base AC plus every effect's modifier.
    pub fn armor_class(&self) -> i32 {
        self.base_armor_class + self.effects.ac_modifier(self)
    }

    /// Movement per turn in grid cells.
    pub fn movement_cells(&self) -> i32 {
        if self.conditions.iter().any(|c| c.condition.roots()) {
            0
        } else {
            self.speed / 5
        }
    }

    pub fn is_dead(&self) -> bool {
        self.has_condition(Condition::Dead)
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead() && !self.hit_points.is_zero()
    }

    /// At 0 HP, rolling death saves.
    pub fn is_dying(&self) -> bool {
        !self.is_dead()
            && self.hit_points.is_zero()
            && self.death_saves.as_ref().is_some_and(|s| !s.stable)
    }

    pub fn state(&self) -> State {
        if self.is_dead() {
            State::Dead
        } else if self.hit_points.is_zero() || self.has_condition(Condition::Unconscious) {
            State::Unconscious
        } else if self
            .conditions
            .iter()
            .any(|c| c.condition.is_incapacitating())
        {
            State::Incapacitated
        } else {
            State::Ok
        }
    }

    // ------------------------------------------------------------------
    // Conditions
    // ------------------------------------------------------------------

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.iter().any(|c| c.condition == condition)
    }

    /// Returns false when the creature is immune.
    pub fn add_condition(&mut self, condition: Condition, source: &str) -> bool {
        if self.condition_immunities.contains(&condition) {
            debug!(combatant = %self.name, %condition, "immune to condition");
            return false;
        }
        let already = self
            .conditions
            .iter()
            .any(|c| c.condition == condition && c.source == source);
        if !already {
            self.conditions.push(ActiveCondition::new(condition, source));
        }
        true
    }

    pub fn remove_condition(&mut self, condition: Condition) {
        self.conditions.retain(|c| c.condition != condition);
    }

    pub fn clear_conditions_from(&mut self, source: &str) {
        self.conditions.retain(|c| c.source != source);
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Attach an effect. An effect with the same name is replaced in its
    /// slot: the old one's `on_removed` runs, then the new one's `initial`.
    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        let slot = match self.effects.detach(effect.name()) {
            Some((slot, old)) => {
                old.on_removed(self);
                Some(slot)
            }
            None => None,
        };
        debug!(combatant = %self.name, effect = effect.name(), "effect added");
        effect.initial(self);
        self.effects.attach(slot, effect);
    }

    pub fn remove_effect(&mut self, name: &str) -> bool {
        match self.effects.detach(name) {
            Some((_, effect)) => {
                debug!(combatant = %self.name, effect = name, "effect removed");
                effect.on_removed(self);
                true
            }
            None => false,
        }
    }

    /// Remove an effect only if `cause` created it.
    pub fn remove_effect_from(&mut self, name: &str, cause: CombatantId) -> bool {
        let owned = self
            .effects
            .get(name)
            .is_some_and(|e| e.cause() == Some(cause));
        owned && self.remove_effect(name)
    }

    // ------------------------------------------------------------------
    // Damage and healing
    // ------------------------------------------------------------------

    /// Immunity, then vulnerability, then resistance.
    pub fn mitigate(&self, damage: Damage) -> Damage {
        if self.immunities.contains(&damage.kind) {
            Damage::none(damage.kind)
        } else if self.vulnerabilities.contains(&damage.kind) {
            damage.doubled()
        } else if self.resistances.contains(&damage.kind) {
            damage.halved()
        } else {
            damage
        }
    }

    /// Take one instance of damage.
    ///
    /// Mitigation runs first, then every effect's `being_hit` transform in
    /// order. Reaching 0 HP gives effects a chance to keep the creature up,
    /// otherwise it falls unconscious (death saves) or dies.
    pub fn hit(
        &mut self,
        damage: Damage,
        source: Option<CombatantId>,
        critical: bool,
        attack_name: &str,
        dice: &mut dyn DiceRoller,
    ) -> HitReport {
        if self.is_dead() {
            return HitReport {
                hp_after: 0,
                ..HitReport::default()
            };
        }

        let mitigated = self.mitigate(damage);
        let transformed = self.effects.transform_incoming(self, mitigated);
        let amount = transformed.amount;
        let mut report = HitReport {
            dealt: amount,
            ..HitReport::default()
        };

        if amount > 0 {
            self.damage_this_turn.push(transformed);
        }
        debug!(
            target = %self.name,
            attack = attack_name,
            ?source,
            raw = damage.amount,
            dealt = amount,
            kind = %damage.kind,
            critical,
            "damage"
        );

        if amount == 0 {
            report.hp_after = self.hit_points.current();
            return report;
        }

        if self.hit_points.is_zero() {
            // Already down: massive damage kills, anything else is a failed save
            let dead = amount >= self.hit_points.maximum()
                || match self.death_saves.as_mut() {
                    Some(saves) => saves.add_failures(if critical { 2 } else { 1 }),
                    None => true,
                };
            if dead {
                self.die();
                report.died = true;
            }
            report.lost_concentration = self.concentration.take();
            return report;
        }

        let result = self.hit_points.take_damage(amount);
        if result.dropped_to_zero {
            if let Some(name) = self.effects.fall_preventer(self, &transformed) {
                info!(combatant = %self.name, effect = %name, "stays up at 1 HP");
                self.hit_points.set_current(1);
                self.remove_effect(&name);
            } else if self.death_saves.is_some() && result.overflow < self.hit_points.maximum() {
                self.fall_unconscious();
                report.dropped = true;
            } else {
                self.die();
                report.dropped = true;
                report.died = true;
            }
        }

        report.hp_after = self.hit_points.current();
        if self.concentration.is_some() {
            let broken = if self.state() != State::Ok {
                true
            } else {
                let dc = (amount / 2).max(10);
                !self.saving_throw(Ability::Constitution, dc, dice).success
            };
            if broken {
                report.lost_concentration = self.concentration.take();
            }
        }
        report
    }

    fn fall_unconscious(&mut self) {
        info!(combatant = %self.name, "falls unconscious");
        self.add_condition(Condition::Unconscious, FALLEN);
        self.add_condition(Condition::Prone, FALLEN);
        if let Some(saves) = self.death_saves.as_mut() {
            saves.reset();
        }
    }

    fn die(&mut self) {
        info!(combatant = %self.name, "dies");
        self.hit_points.set_current(0);
        self.clear_conditions_from(FALLEN);
        self.conditions
            .push(ActiveCondition::new(Condition::Dead, "death"));
        self.economy.clear();
    }

    /// Returns the HP restored. The dead stay dead.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if self.is_dead() {
            return 0;
        }
        let was_down = self.hit_points.is_zero();
        let restored = self.hit_points.heal(amount);
        if was_down && restored > 0 {
            info!(combatant = %self.name, "back on their feet");
            self.clear_conditions_from(FALLEN);
            if let Some(saves) = self.death_saves.as_mut() {
                saves.reset();
            }
        }
        restored
    }

    // ------------------------------------------------------------------
    // Rolls
    // ------------------------------------------------------------------

    /// A natural d20 passed through every effect's `d20` hook.
    pub fn roll_natural(
        &self,
        advantage: Advantage,
        reason: RollReason,
        dice: &mut dyn DiceRoller,
    ) -> i32 {
        let roll = roll_d20(dice, advantage);
        self.effects.adjust_d20(self, roll.natural, reason, dice)
    }

    pub fn saving_throw(&self, ability: Ability, dc: i32, dice: &mut dyn DiceRoller) -> SaveOutcome {
        let physical = matches!(ability, Ability::Strength | Ability::Dexterity);
        if physical
            && self
                .conditions
                .iter()
                .any(|c| c.condition.fails_physical_saves())
        {
            return SaveOutcome {
                natural: None,
                total: 0,
                success: false,
            };
        }

        let modifier = self.effects.save_modifier(self, ability, dice);
        let advantage = Advantage::from_sources(modifier.advantage, modifier.disadvantage);
        let natural = self.roll_natural(advantage, RollReason::SavingThrow(ability), dice);
        let total = natural + self.save_bonus(ability) + modifier.bonus;
        let success = total >= dc;
        debug!(
            combatant = %self.name,
            %ability,
            natural,
            total,
            dc,
            success,
            "saving throw"
        );
        SaveOutcome {
            natural: Some(natural),
            total,
            success,
        }
    }

    /// One death saving throw.
    pub fn roll_death_save(&mut self, dice: &mut dyn DiceRoller) -> Option<DeathSaveOutcome> {
        if !self.is_dying() {
            return None;
        }
        let natural = self.roll_natural(Advantage::Normal, RollReason::DeathSave, dice);
        let saves = self.death_saves.as_mut()?;
        let outcome = match natural {
            20 => {
                saves.reset();
                self.heal(1);
                DeathSaveOutcome::Revived
            }
            1 => {
                if saves.add_failures(2) {
                    self.die();
                    DeathSaveOutcome::Died
                } else {
                    DeathSaveOutcome::Failure
                }
            }
            n if n >= 10 => {
                if saves.add_success() {
                    DeathSaveOutcome::Stabilized
                } else {
                    DeathSaveOutcome::Success
                }
            }
            _ => {
                if saves.add_failures(1) {
                    self.die();
                    DeathSaveOutcome::Died
                } else {
                    DeathSaveOutcome::Failure
                }
            }
        };
        info!(combatant = %self.name, natural, ?outcome, "death save");
        Some(outcome)
    }

    // ------------------------------------------------------------------
    // Turn lifecycle
    // ------------------------------------------------------------------

    /// Refresh the economy, rotate the damage ledgers and run every
    /// effect's start-of-turn hook.
    pub fn start_turn(&mut self, dice: &mut dyn DiceRoller) -> TurnStart {
        self.economy.refresh(self.movement_cells());
        self.damage_last_turn = std::mem::take(&mut self.damage_this_turn);

        let ticks = self.effects.start_turn(self, dice);
        let mut start = TurnStart::default();
        for (name, tick) in &ticks {
            match tick {
                TurnTick::Heal(amount) => {
                    let restored = self.heal(*amount);
                    debug!(combatant = %self.name, effect = %name, restored, "start of turn heal");
                }
                TurnTick::Damage(damage) => {
                    let report = self.hit(*damage, None, false, name, dice);
                    start.died |= report.died;
                    if report.lost_concentration.is_some() {
                        start.lost_concentration = report.lost_concentration;
                    }
                }
                TurnTick::Expire => {
                    self.remove_effect(name);
                }
            }
        }
        start.ticks = ticks;
        start
    }

    /// Poll removal predicates and count down durations. Returns the names
    /// of the effects removed.
    pub fn end_turn(&mut self, dice: &mut dyn DiceRoller) -> Vec<String> {
        let mut removed = self.effects.ending_at_turn_end(self, dice);
        for name in self.effects.tick() {
            if !removed.contains(&name) {
                removed.push(name);
            }
        }
        for name in &removed {
            self.remove_effect(name);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub fn record_miss(&mut self, attack: &str) {
        self.stats.entry(attack.to_string()).or_default().record_miss();
    }

    pub fn record_hit(&mut self, attack: &str, damage: i32, critical: bool) {
        self.stats
            .entry(attack.to_string())
            .or_default()
            .record_hit(damage, critical);
    }

    pub fn status(&self) -> String {
        let mut parts = vec![self.state().label().to_string()];
        parts.extend(
            self.conditions
                .iter()
                .filter(|c| c.source != FALLEN && c.condition != Condition::Dead)
                .map(|c| c.condition.to_string()),
        );
        parts.join(", ")
    }

    pub fn report(&self) -> CombatantReport {
        CombatantReport {
            id: self.id,
            name: self.name.clone(),
            side: self.side.clone(),
            hp: self.hit_points.current(),
            max_hp: self.hit_points.maximum(),
            state: self.state(),
            status: self.status(),
            effects: self.effects.names(),
            attacks: self.stats.clone(),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Error type for combatant construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Combatant needs a name")]
    MissingName,
    #[error("{0} has no side")]
    MissingSide(String),
    #[error("{0} has neither max HP nor hit dice")]
    MissingHitPoints(String),
    #[error("Max HP must be at least 1, got {0}")]
    InvalidHitPoints(i32),
    #[error("{ability} score {score} is outside 3..=30")]
    AbilityOutOfRange { ability: Ability, score: u8 },
    #[error("Armor class {0} is out of range")]
    InvalidArmorClass(i32),
    #[error("Critical threshold {0} must be within 2..=20")]
    InvalidCriticalThreshold(i32),
    #[error("Speed {0} must be a non-negative multiple of 5")]
    InvalidSpeed(i32),
    #[error("'{name}' is a {found}, expected {expected}")]
    WrongCategory {
        name: String,
        expected: ActionCategory,
        found: ActionCategory,
    },
}

/// Builder for creating combatants step by step.
///
/// This is the factory boundary: catalogs and tests describe a creature
/// here, and every value is validated once in [`CombatantBuilder::build`].
#[derive(Debug)]
pub struct CombatantBuilder {
    name: String,
    side: Option<Side>,
    creature_type: CreatureType,
    abilities: AbilityScores,
    proficiency: i32,
    save_proficiencies: Vec<Ability>,
    max_hp: Option<i32>,
    hit_dice: Option<DiceExpression>,
    armor_class: i32,
    speed: i32,
    critical_threshold: i32,
    actions: Vec<Box<dyn Action>>,
    reactions: Vec<Box<dyn Action>>,
    effects: Vec<Box<dyn Effect>>,
    resistances: BTreeSet<DamageType>,
    vulnerabilities: BTreeSet<DamageType>,
    immunities: BTreeSet<DamageType>,
    condition_immunities: Vec<Condition>,
    death_saves: bool,
    policy: Option<Box<dyn TargetPolicy>>,
}

impl CombatantBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            side: None,
            creature_type: CreatureType::default(),
            abilities: AbilityScores::default(),
            proficiency: 2,
            save_proficiencies: Vec::new(),
            max_hp: None,
            hit_dice: None,
            armor_class: 10,
            speed: 30,
            critical_threshold: 20,
            actions: Vec::new(),
            reactions: Vec::new(),
            effects: Vec::new(),
            resistances: BTreeSet::new(),
            vulnerabilities: BTreeSet::new(),
            immunities: BTreeSet::new(),
            condition_immunities: Vec::new(),
            death_saves: false,
            policy: None,
        }
    }

    pub fn side(mut self, side: impl Into<Side>) -> Self {
        self.side = Some(side.into());
        self
    }

    pub fn creature_type(mut self, creature_type: CreatureType) -> Self {
        self.creature_type = creature_type;
        self
    }

    pub fn abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn proficiency(mut self, bonus: i32) -> Self {
        self.proficiency = bonus;
        self
    }

    pub fn save_proficiency(mut self, ability: Ability) -> Self {
        if !self.save_proficiencies.contains(&ability) {
            self.save_proficiencies.push(ability);
        }
        self
    }

    pub fn max_hp(mut self, hp: i32) -> Self {
        self.max_hp = Some(hp);
        self
    }

    /// Hit dice; max HP is their average unless rolled.
    pub fn hit_dice(mut self, dice: DiceExpression) -> Self {
        self.hit_dice = Some(dice);
        self
    }

    /// Roll the hit dice for max HP instead of taking the average.
    pub fn roll_hit_points(mut self, dice: &mut dyn DiceRoller) -> Self {
        if let Some(expr) = &self.hit_dice {
            self.max_hp = Some(dice.roll(expr).max(1));
        }
        self
    }

    pub fn armor_class(mut self, ac: i32) -> Self {
        self.armor_class = ac;
        self
    }

    pub fn speed(mut self, feet: i32) -> Self {
        self.speed = feet;
        self
    }

    pub fn critical_threshold(mut self, threshold: i32) -> Self {
        self.critical_threshold = threshold;
        self
    }

    pub fn action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn reaction(mut self, reaction: impl Action + 'static) -> Self {
        self.reactions.push(Box::new(reaction));
        self
    }

    pub fn effect(mut self, effect: impl Effect + 'static) -> Self {
        self.effects.push(Box::new(effect));
        self
    }

    pub fn resistant(mut self, kind: DamageType) -> Self {
        self.resistances.insert(kind);
        self
    }

    pub fn vulnerable(mut self, kind: DamageType) -> Self {
        self.vulnerabilities.insert(kind);
        self
    }

    pub fn immune(mut self, kind: DamageType) -> Self {
        self.immunities.insert(kind);
        self
    }

    pub fn condition_immunity(mut self, condition: Condition) -> Self {
        self.condition_immunities.push(condition);
        self
    }

    /// Fall unconscious and roll death saves at 0 HP instead of dying.
    pub fn death_saves(mut self) -> Self {
        self.death_saves = true;
        self
    }

    pub fn policy(mut self, policy: impl TargetPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Build the combatant, returning an error if any value is invalid.
    pub fn build(self) -> Result<Combatant, BuildError> {
        if self.name.trim().is_empty() {
            return Err(BuildError::MissingName);
        }
        let side = self.side.ok_or_else(|| BuildError::MissingSide(self.name.clone()))?;
        if let Some((ability, score)) = self.abilities.out_of_range() {
            return Err(BuildError::AbilityOutOfRange { ability, score });
        }

        let max_hp = match (self.max_hp, &self.hit_dice) {
            (Some(hp), _) => hp,
            (None, Some(dice)) => dice.average().floor() as i32,
            (None, None) => return Err(BuildError::MissingHitPoints(self.name)),
        };
        if max_hp < 1 {
            return Err(BuildError::InvalidHitPoints(max_hp));
        }
        if !(1..=40).contains(&self.armor_class) {
            return Err(BuildError::InvalidArmorClass(self.armor_class));
        }
        if !(2..=20).contains(&self.critical_threshold) {
            return Err(BuildError::InvalidCriticalThreshold(self.critical_threshold));
        }
        if self.speed < 0 || self.speed % 5 != 0 {
            return Err(BuildError::InvalidSpeed(self.speed));
        }

        for action in &self.actions {
            if action.category() == ActionCategory::Reaction {
                return Err(BuildError::WrongCategory {
                    name: action.name().to_string(),
                    expected: ActionCategory::Action,
                    found: ActionCategory::Reaction,
                });
            }
        }
        for reaction in &self.reactions {
            if reaction.category() != ActionCategory::Reaction {
                return Err(BuildError::WrongCategory {
                    name: reaction.name().to_string(),
                    expected: ActionCategory::Reaction,
                    found: reaction.category(),
                });
            }
        }

        let mut combatant = Combatant {
            id: CombatantId::unassigned(),
            name: self.name,
            side,
            creature_type: self.creature_type,
            abilities: self.abilities,
            proficiency: self.proficiency,
            save_proficiencies: self.save_proficiencies,
            hit_points: HitPoints::new(max_hp),
            base_armor_class: self.armor_class,
            speed: self.speed,
            position: None,
            critical_threshold: self.critical_threshold,
            economy: TurnEconomy::default(),
            actions: self.actions,
            reactions: self.reactions,
            effects: EffectSet::new(),
            conditions: Vec::new(),
            resistances: self.resistances,
            vulnerabilities: self.vulnerabilities,
            immunities: self.immunities,
            condition_immunities: self.condition_immunities,
            death_saves: self.death_saves.then(DeathSaves::default),
            concentration: None,
            policy: self.policy.unwrap_or_else(|| Box::new(ClosestEnemy)),
            stats: BTreeMap::new(),
            damage_this_turn: Vec::new(),
            damage_last_turn: Vec::new(),
            initiative: None,
        };
        for effect in self.effects {
            combatant.add_effect(effect);
        }
        combatant.economy.refresh(combatant.movement_cells());
        Ok(combatant)
    }
}
