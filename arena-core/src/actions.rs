//! Things a combatant can do on its turn.
//!
//! An [`Action`] is owned by exactly one combatant and is parameterized per
//! call with its target. [`Attack`] covers weapons and natural attacks,
//! [`Spell`] covers attack-roll, saving-throw, healing and buff spells.
//! Side effects on a hit are data ([`OnHit`]), not closures, so an action
//! never holds a reference into the arena.

use crate::arena::{Arena, ArenaView};
use crate::combatant::Combatant;
use crate::dice::DiceExpression;
use crate::effects::{Effect, SaveDc};
use crate::rules::AttackResult;
use crate::world::{Ability, CombatantId, Condition, CreatureType, DamageType};
use std::fmt;

/// Which slot of the turn economy an action consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Action,
    BonusAction,
    Reaction,
    Movement,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionCategory::Action => "action",
            ActionCategory::BonusAction => "bonus action",
            ActionCategory::Reaction => "reaction",
            ActionCategory::Movement => "movement",
        };
        write!(f, "{name}")
    }
}

/// Range of an action in grid cells.
///
/// Beyond `good` and up to `max`, attack rolls have disadvantage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reach {
    pub good: i32,
    pub max: i32,
}

impl Reach {
    pub const fn melee() -> Self {
        Self { good: 1, max: 1 }
    }

    /// Normal and long range in feet, converted to cells.
    pub const fn feet(normal: i32, long: i32) -> Self {
        Self {
            good: normal / 5,
            max: long / 5,
        }
    }

    pub fn contains(&self, distance: i32) -> bool {
        distance <= self.max
    }

    pub fn is_melee(&self) -> bool {
        self.max <= 1
    }
}

/// What happened when an action was performed.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Attack(AttackResult),
    /// A spell resolved against the listed creatures.
    Cast { affected: Vec<CombatantId> },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OutOfRange,
    TargetGone,
    NoUsesLeft,
    Unavailable,
}

/// Where an effect created by an action came from.
#[derive(Debug, Clone)]
pub struct EffectOrigin {
    pub caster: CombatantId,
    pub source: String,
    pub save: Option<SaveDc>,
}

/// Builds the effect an action applies. A plain function pointer keeps
/// actions free of captured state.
pub type EffectFactory = fn(&EffectOrigin) -> Box<dyn Effect>;

/// One thing a combatant can do.
pub trait Action: fmt::Debug {
    fn name(&self) -> &str;

    fn category(&self) -> ActionCategory;

    fn reach(&self) -> Reach;

    /// Remaining uses or ammunition. `None` is unlimited.
    fn uses_left(&self) -> Option<u32> {
        None
    }

    /// Aimed at allies (healing, buffs) rather than enemies.
    fn targets_allies(&self) -> bool {
        false
    }

    /// Only ever aimed at the owner itself.
    fn self_only(&self) -> bool {
        false
    }

    /// Action-specific precondition.
    fn is_available(&self, _owner: &Combatant) -> bool {
        true
    }

    /// Ammunition left, the economy slot is free, and the precondition holds.
    fn ready(&self, owner: &Combatant) -> bool {
        self.uses_left() != Some(0)
            && owner.economy.has(self.category())
            && self.is_available(owner)
    }

    /// Heuristic value of using this action on `target`. Zero or less means
    /// not worth doing.
    fn score(&self, owner: &Combatant, target: &Combatant, view: &ArenaView<'_>) -> f64;

    fn perform(&mut self, arena: &mut Arena, actor: CombatantId, target: CombatantId)
        -> ActionOutcome;
}

/// Chance that a d20 plus `bonus` beats `ac`, counting natural 1s and 20s.
pub fn hit_chance(bonus: i32, ac: i32) -> f64 {
    let hits = (2..=19).filter(|n| n + bonus > ac).count() + 1;
    hits as f64 / 20.0
}

/// Chance that a d20 plus `bonus` meets `dc`.
pub fn save_chance(bonus: i32, dc: i32) -> f64 {
    let passes = (1..=20).filter(|n| n + bonus >= dc).count();
    passes as f64 / 20.0
}

// ============================================================================
// Attacks
// ============================================================================

/// A rider applied after an attack's damage lands.
#[derive(Debug, Clone)]
pub enum OnHit {
    /// The target saves or gains the condition. With `repeat_save` the save
    /// is repeated at the end of each of the target's turns.
    Condition {
        condition: Condition,
        save: Option<SaveDc>,
        repeat_save: bool,
    },
    /// The target saves or gains the effect.
    Effect {
        save: Option<SaveDc>,
        factory: EffectFactory,
    },
    /// Extra damage, halved on a successful save.
    Damage {
        dice: DiceExpression,
        damage_type: DamageType,
        save: Option<SaveDc>,
    },
}

/// A weapon or natural attack.
#[derive(Debug, Clone)]
pub struct Attack {
    pub name: String,
    pub category: ActionCategory,
    pub reach: Reach,
    /// Ability the attack keys off. Its modifier plus proficiency is added
    /// to hit, and the modifier to damage.
    pub ability: Option<Ability>,
    /// Flat to-hit bonus on top of the ability.
    pub to_hit: i32,
    pub damage: DiceExpression,
    pub damage_type: DamageType,
    pub ranged: bool,
    pub spell: bool,
    pub ammo: Option<u32>,
    pub on_hit: Option<OnHit>,
}

impl Attack {
    pub fn melee(name: impl Into<String>, damage: DiceExpression, damage_type: DamageType) -> Self {
        Self {
            name: name.into(),
            category: ActionCategory::Action,
            reach: Reach::melee(),
            ability: None,
            to_hit: 0,
            damage,
            damage_type,
            ranged: false,
            spell: false,
            ammo: None,
            on_hit: None,
        }
    }

    pub fn ranged(
        name: impl Into<String>,
        damage: DiceExpression,
        damage_type: DamageType,
        reach: Reach,
    ) -> Self {
        Self {
            reach,
            ranged: true,
            ..Self::melee(name, damage, damage_type)
        }
    }

    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.ability = Some(ability);
        self
    }

    pub fn with_to_hit(mut self, bonus: i32) -> Self {
        self.to_hit = bonus;
        self
    }

    pub fn with_category(mut self, category: ActionCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_ammo(mut self, ammo: u32) -> Self {
        self.ammo = Some(ammo);
        self
    }

    pub fn with_on_hit(mut self, on_hit: OnHit) -> Self {
        self.on_hit = Some(on_hit);
        self
    }

    pub fn as_spell(mut self) -> Self {
        self.spell = true;
        self
    }

    /// The attack's fixed to-hit modifier for this attacker.
    pub fn static_to_hit(&self, attacker: &Combatant) -> i32 {
        let from_ability = self
            .ability
            .map(|a| attacker.modifier(a) + attacker.proficiency)
            .unwrap_or(0);
        self.to_hit + from_ability
    }

    /// The ability modifier added to each damage roll.
    pub fn stat_damage_bonus(&self, attacker: &Combatant) -> i32 {
        self.ability.map(|a| attacker.modifier(a)).unwrap_or(0)
    }

    /// Hit chance times average damage, plus a little for the rider.
    pub fn expected_damage(&self, attacker: &Combatant, target: &Combatant) -> f64 {
        let chance = hit_chance(self.static_to_hit(attacker), target.armor_class());
        let average = (self.damage.average() + self.stat_damage_bonus(attacker) as f64).max(0.0);
        let rider = match &self.on_hit {
            Some(OnHit::Damage { dice, .. }) => dice.average(),
            Some(_) => 2.0,
            None => 0.0,
        };
        chance * (average + rider)
    }
}

impl Action for Attack {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ActionCategory {
        self.category
    }

    fn reach(&self) -> Reach {
        self.reach
    }

    fn uses_left(&self) -> Option<u32> {
        self.ammo
    }

    fn score(&self, owner: &Combatant, target: &Combatant, _view: &ArenaView<'_>) -> f64 {
        self.expected_damage(owner, target)
    }

    fn perform(
        &mut self,
        arena: &mut Arena,
        actor: CombatantId,
        target: CombatantId,
    ) -> ActionOutcome {
        if self.ammo == Some(0) {
            return ActionOutcome::Skipped(SkipReason::NoUsesLeft);
        }
        let result = arena.resolve_attack(actor, target, self);
        // A shot that never left the bow costs nothing
        if result.was_rolled() {
            if let Some(ammo) = self.ammo.as_mut() {
                *ammo -= 1;
            }
        }
        ActionOutcome::Attack(result)
    }
}

// ============================================================================
// Spells
// ============================================================================

/// Creatures a spell catches around a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    /// Radius in cells.
    pub radius: i32,
    /// Centred on the caster instead of the target.
    pub on_caster: bool,
    /// Only creatures of this type are affected.
    pub creature_type: Option<CreatureType>,
}

#[derive(Debug, Clone)]
pub enum SpellKind {
    /// A spell attack roll, resolved like a weapon attack.
    Attack {
        damage: DiceExpression,
        damage_type: DamageType,
        on_hit: Option<OnHit>,
    },
    /// Targets save against the caster's spell DC.
    Save {
        save: Ability,
        damage: Option<(DiceExpression, DamageType)>,
        half_on_success: bool,
        on_fail: Option<EffectFactory>,
    },
    /// Heals the dice plus the casting modifier.
    Heal { dice: DiceExpression },
    /// Puts an effect on up to `max_targets` allies.
    Buff {
        factory: EffectFactory,
        max_targets: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Spell {
    pub name: String,
    pub category: ActionCategory,
    pub reach: Reach,
    pub casting_ability: Ability,
    pub kind: SpellKind,
    pub concentration: bool,
    pub uses: Option<u32>,
    pub area: Option<Area>,
    /// Cast on the caster only (rage, a self ward).
    pub on_self: bool,
}

impl Spell {
    pub fn new(name: impl Into<String>, casting_ability: Ability, reach: Reach, kind: SpellKind) -> Self {
        Self {
            name: name.into(),
            category: ActionCategory::Action,
            reach,
            casting_ability,
            kind,
            concentration: false,
            uses: None,
            area: None,
            on_self: false,
        }
    }

    pub fn with_category(mut self, category: ActionCategory) -> Self {
        self.category = category;
        self
    }

    pub fn concentration(mut self) -> Self {
        self.concentration = true;
        self
    }

    pub fn with_uses(mut self, uses: u32) -> Self {
        self.uses = Some(uses);
        self
    }

    pub fn with_area(mut self, area: Area) -> Self {
        self.area = Some(area);
        self
    }

    pub fn targeting_self(mut self) -> Self {
        self.on_self = true;
        self
    }

    /// 8 + proficiency + casting modifier.
    pub fn save_dc(&self, caster: &Combatant) -> i32 {
        8 + caster.proficiency + caster.modifier(self.casting_ability)
    }

    pub fn attack_bonus(&self, caster: &Combatant) -> i32 {
        caster.proficiency + caster.modifier(self.casting_ability)
    }

    /// The weapon-style attack an attack-roll spell resolves as.
    pub fn as_attack(&self) -> Option<Attack> {
        match &self.kind {
            SpellKind::Attack {
                damage,
                damage_type,
                on_hit,
            } => {
                let mut attack = Attack::ranged(&*self.name, damage.clone(), *damage_type, self.reach)
                    .with_ability(self.casting_ability)
                    .with_category(self.category)
                    .as_spell();
                attack.ranged = !self.reach.is_melee();
                attack.on_hit = on_hit.clone();
                Some(attack)
            }
            _ => None,
        }
    }

    pub fn harmful(&self) -> bool {
        matches!(self.kind, SpellKind::Attack { .. } | SpellKind::Save { .. })
    }

    fn origin(&self, caster: &Combatant) -> EffectOrigin {
        EffectOrigin {
            caster: caster.id,
            source: self.name.clone(),
            save: match self.kind {
                SpellKind::Save { save, .. } => Some(SaveDc::new(save, self.save_dc(caster))),
                _ => None,
            },
        }
    }

    /// The effect this spell would place, built for inspection only.
    pub fn preview_effect(&self, caster: &Combatant) -> Option<Box<dyn Effect>> {
        let origin = self.origin(caster);
        match &self.kind {
            SpellKind::Save {
                on_fail: Some(factory),
                ..
            } => Some(factory(&origin)),
            SpellKind::Buff { factory, .. } => Some(factory(&origin)),
            _ => None,
        }
    }

    pub fn effect_origin(&self, caster: &Combatant) -> EffectOrigin {
        self.origin(caster)
    }
}

impl Action for Spell {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ActionCategory {
        self.category
    }

    fn reach(&self) -> Reach {
        self.reach
    }

    fn uses_left(&self) -> Option<u32> {
        self.uses
    }

    fn targets_allies(&self) -> bool {
        !self.harmful()
    }

    fn self_only(&self) -> bool {
        self.on_self
    }

    fn is_available(&self, owner: &Combatant) -> bool {
        // Recasting the spell already held only wastes the slot
        !(self.concentration
            && owner
                .concentration
                .as_ref()
                .is_some_and(|c| c.spell == self.name))
    }

    fn score(&self, owner: &Combatant, target: &Combatant, view: &ArenaView<'_>) -> f64 {
        let affected = match self.area {
            Some(area) => {
                let center = if area.on_caster {
                    owner.position
                } else {
                    target.position
                };
                center
                    .map(|c| {
                        view.creatures_within(c, area.radius, area.creature_type)
                            .into_iter()
                            .filter_map(|id| view.get(id))
                            .filter(|c| (c.side != owner.side) == self.harmful())
                            .count()
                    })
                    .unwrap_or(0)
            }
            None => 1,
        } as f64;

        match &self.kind {
            SpellKind::Attack {
                damage,
                damage_type,
                ..
            } => {
                if target.immunities.contains(damage_type) {
                    return 0.0;
                }
                let chance = hit_chance(self.attack_bonus(owner), target.armor_class());
                chance * damage.average() * affected.max(1.0)
            }
            SpellKind::Save {
                save,
                damage,
                half_on_success,
                on_fail,
            } => {
                let fail = 1.0 - save_chance(target.save_bonus(*save), self.save_dc(owner));
                let mut value = 0.0;
                if let Some((dice, _)) = damage {
                    let full = dice.average();
                    let on_success = if *half_on_success { full / 2.0 } else { 0.0 };
                    value += fail * full + (1.0 - fail) * on_success;
                }
                if on_fail.is_some() {
                    let already = self
                        .preview_effect(owner)
                        .is_some_and(|e| target.effects.contains(e.name()));
                    if !already {
                        value += fail * 8.0;
                    }
                }
                value * affected
            }
            SpellKind::Heal { dice } => {
                let missing = target.hit_points.maximum() - target.hit_points.current();
                if target.is_dead() || missing == 0 {
                    return 0.0;
                }
                if target.hit_points.is_zero() {
                    // Getting a downed ally back up beats anything else
                    return 50.0;
                }
                if target.hit_points.ratio() > 0.5 {
                    return 0.0;
                }
                let amount = dice.average() + owner.modifier(self.casting_ability) as f64;
                amount.min(missing as f64)
            }
            SpellKind::Buff { .. } => {
                if self.on_self && target.id != owner.id {
                    return 0.0;
                }
                let already = self
                    .preview_effect(owner)
                    .is_some_and(|e| target.effects.contains(e.name()));
                if already || !target.is_alive() {
                    0.0
                } else {
                    4.0
                }
            }
        }
    }

    fn perform(
        &mut self,
        arena: &mut Arena,
        actor: CombatantId,
        target: CombatantId,
    ) -> ActionOutcome {
        if self.uses == Some(0) {
            return ActionOutcome::Skipped(SkipReason::NoUsesLeft);
        }
        let outcome = arena.cast_spell(actor, target, self);
        if !matches!(outcome, ActionOutcome::Skipped(_)) {
            if let Some(uses) = self.uses.as_mut() {
                *uses -= 1;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::DieType;

    #[test]
    fn test_hit_chance() {
        // +5 against AC 13 hits on 9 or better
        assert_eq!(hit_chance(5, 13), 0.6);
        // Natural 20 always hits
        assert_eq!(hit_chance(0, 30), 0.05);
        // Natural 1 always misses
        assert_eq!(hit_chance(30, 10), 0.95);
    }

    #[test]
    fn test_save_chance() {
        assert_eq!(save_chance(0, 11), 0.5);
        assert_eq!(save_chance(0, 21), 0.0);
    }

    #[test]
    fn test_reach_in_feet() {
        let bow = Reach::feet(80, 320);
        assert_eq!(bow, Reach { good: 16, max: 64 });
        assert!(!bow.is_melee());
        assert!(Reach::melee().contains(1));
        assert!(!Reach::melee().contains(2));
    }

    #[test]
    fn test_attack_modifiers_from_ability() {
        let fighter = crate::catalog::creatures::fighter().build().unwrap();
        let sword = Attack::melee(
            "Longsword",
            DiceExpression::of(1, DieType::D8),
            DamageType::Slashing,
        )
        .with_ability(Ability::Strength);
        // STR 16 and proficiency +2
        assert_eq!(sword.static_to_hit(&fighter), 5);
        assert_eq!(sword.stat_damage_bonus(&fighter), 3);
        assert_eq!(sword.with_to_hit(1).static_to_hit(&fighter), 6);
    }

    #[test]
    fn test_spell_as_attack() {
        let bolt = Spell::new(
            "Fire Bolt",
            Ability::Intelligence,
            Reach::feet(120, 120),
            SpellKind::Attack {
                damage: DiceExpression::of(1, DieType::D10),
                damage_type: DamageType::Fire,
                on_hit: None,
            },
        );
        let attack = bolt.as_attack().unwrap();
        assert!(attack.ranged);
        assert!(attack.spell);
        assert_eq!(attack.ability, Some(Ability::Intelligence));
        assert!(bolt.harmful());
        assert!(!bolt.targets_allies());
    }
}
