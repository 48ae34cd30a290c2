//! Effects used by the sample stat blocks and spells.
//!
//! Each one overrides only the hooks it needs. The free functions at the
//! bottom are [`EffectFactory`](crate::actions::EffectFactory) values that
//! spells and attack riders use to build an effect at the moment it lands.

use crate::actions::EffectOrigin;
use crate::arena::ArenaView;
use crate::combatant::Combatant;
use crate::dice::{Advantage, DiceExpression, DiceRoller, DieType};
use crate::effects::{ConditionEffect, Effect, ExtraDamage, SaveDc, SaveModifier, Strike, TurnTick};
use crate::world::{Ability, CombatantId, Condition, Damage, DamageType};

/// +1d4 to attack rolls and saving throws.
#[derive(Debug, Clone)]
pub struct Bless {
    pub cause: Option<CombatantId>,
}

impl Effect for Bless {
    fn name(&self) -> &str {
        "Bless"
    }

    fn cause(&self) -> Option<CombatantId> {
        self.cause
    }

    fn duration(&self) -> Option<u32> {
        Some(10)
    }

    fn attack_to_hit(
        &self,
        _owner: &Combatant,
        _target: &Combatant,
        _strike: &Strike<'_>,
        dice: &mut dyn DiceRoller,
    ) -> i32 {
        dice.roll(&DiceExpression::of(1, DieType::D4))
    }

    fn saving_throw(&self, _owner: &Combatant, _ability: Ability, dice: &mut dyn DiceRoller) -> SaveModifier {
        SaveModifier::bonus(dice.roll(&DiceExpression::of(1, DieType::D4)))
    }
}

/// Heals at the start of each turn unless the owner took one of the
/// suppressing damage types since its last turn.
#[derive(Debug, Clone)]
pub struct Regeneration {
    pub amount: i32,
    pub suppressed_by: Vec<DamageType>,
}

impl Regeneration {
    pub fn new(amount: i32) -> Self {
        Self {
            amount,
            suppressed_by: Vec::new(),
        }
    }

    pub fn suppressed_by(mut self, kind: DamageType) -> Self {
        self.suppressed_by.push(kind);
        self
    }
}

impl Effect for Regeneration {
    fn name(&self) -> &str {
        "Regeneration"
    }

    fn start_turn(&self, owner: &Combatant, _dice: &mut dyn DiceRoller) -> Option<TurnTick> {
        let suppressed = owner
            .damage_last_turn
            .iter()
            .any(|d| self.suppressed_by.contains(&d.kind));
        let hurt = owner.hit_points.current() < owner.hit_points.maximum();
        (!suppressed && hurt && !owner.is_dead()).then_some(TurnTick::Heal(self.amount))
    }
}

/// Advantage when an ally stands next to the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackTactics;

impl Effect for PackTactics {
    fn name(&self) -> &str {
        "Pack Tactics"
    }

    fn gives_advantage(
        &self,
        _owner: &Combatant,
        _target: &Combatant,
        strike: &Strike<'_>,
        _view: &ArenaView<'_>,
    ) -> bool {
        strike.flanked
    }
}

/// Extra dice once per turn, with advantage or an ally next to the target.
#[derive(Debug, Clone)]
pub struct SneakAttack {
    pub dice: DiceExpression,
}

impl SneakAttack {
    pub fn new(d6s: u32) -> Self {
        Self {
            dice: DiceExpression::of(d6s, DieType::D6),
        }
    }
}

impl Effect for SneakAttack {
    fn name(&self) -> &str {
        "Sneak Attack"
    }

    fn source_additional_damage(
        &self,
        _owner: &Combatant,
        _target: &Combatant,
        strike: &Strike<'_>,
    ) -> Option<ExtraDamage> {
        let eligible = match strike.advantage {
            Advantage::Advantage => true,
            Advantage::Normal => strike.flanked,
            Advantage::Disadvantage => false,
        };
        (eligible && !strike.spell)
            .then(|| ExtraDamage::new("Sneak Attack", self.dice.clone(), None).once_per_turn())
    }
}

/// Melee damage bonus, half damage from weapons, advantage on STR saves.
#[derive(Debug, Clone)]
pub struct Rage {
    pub damage: i32,
}

impl Effect for Rage {
    fn name(&self) -> &str {
        "Rage"
    }

    fn duration(&self) -> Option<u32> {
        Some(10)
    }

    fn damage_bonus(&self, _owner: &Combatant, _target: &Combatant, strike: &Strike<'_>) -> i32 {
        if strike.ranged || strike.spell {
            0
        } else {
            self.damage
        }
    }

    fn being_hit(&self, _owner: &Combatant, damage: Damage) -> Damage {
        if damage.kind.is_physical() {
            damage.halved()
        } else {
            damage
        }
    }

    fn saving_throw(&self, _owner: &Combatant, ability: Ability, _dice: &mut dyn DiceRoller) -> SaveModifier {
        if ability == Ability::Strength {
            SaveModifier::advantage()
        } else {
            SaveModifier::default()
        }
    }
}

/// Attacks against the owner have disadvantage until its next turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dodge;

impl Effect for Dodge {
    fn name(&self) -> &str {
        "Dodge"
    }

    fn gives_disadvantage_against(
        &self,
        _owner: &Combatant,
        _attacker: &Combatant,
        _view: &ArenaView<'_>,
    ) -> bool {
        true
    }

    fn saving_throw(&self, _owner: &Combatant, ability: Ability, _dice: &mut dyn DiceRoller) -> SaveModifier {
        if ability == Ability::Dexterity {
            SaveModifier::advantage()
        } else {
            SaveModifier::default()
        }
    }

    fn start_turn(&self, _owner: &Combatant, _dice: &mut dyn DiceRoller) -> Option<TurnTick> {
        Some(TurnTick::Expire)
    }
}

/// +2 AC.
#[derive(Debug, Clone)]
pub struct ShieldOfFaith {
    pub cause: Option<CombatantId>,
}

impl Effect for ShieldOfFaith {
    fn name(&self) -> &str {
        "Shield of Faith"
    }

    fn cause(&self) -> Option<CombatantId> {
        self.cause
    }

    fn duration(&self) -> Option<u32> {
        Some(100)
    }

    fn ac_modifier(&self, _owner: &Combatant) -> i32 {
        2
    }
}

/// Natural 1s on any d20 are rerolled once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lucky;

impl Effect for Lucky {
    fn name(&self) -> &str {
        "Lucky"
    }

    fn d20(
        &self,
        _owner: &Combatant,
        value: i32,
        _reason: crate::effects::RollReason,
        dice: &mut dyn DiceRoller,
    ) -> i32 {
        if value == 1 {
            dice.d20()
        } else {
            value
        }
    }
}

/// Drop to 1 HP instead of 0, once.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelentlessEndurance;

impl Effect for RelentlessEndurance {
    fn name(&self) -> &str {
        "Relentless Endurance"
    }

    fn prevents_fall(&self, _owner: &Combatant, _damage: &Damage) -> bool {
        true
    }
}

/// Raises current and maximum HP while it lasts.
#[derive(Debug, Clone)]
pub struct Aid {
    pub cause: Option<CombatantId>,
    pub amount: i32,
}

impl Effect for Aid {
    fn name(&self) -> &str {
        "Aid"
    }

    fn cause(&self) -> Option<CombatantId> {
        self.cause
    }

    fn initial(&self, owner: &mut Combatant) {
        let maximum = owner.hit_points.maximum() + self.amount;
        owner.hit_points.set_maximum(maximum);
        owner.heal(self.amount);
    }

    fn on_removed(&self, owner: &mut Combatant) {
        let maximum = (owner.hit_points.maximum() - self.amount).max(1);
        owner.hit_points.set_maximum(maximum);
    }
}

/// Damage at the start of each of the owner's turns until a save ends it.
#[derive(Debug, Clone)]
pub struct OngoingDamage {
    pub name: String,
    pub cause: Option<CombatantId>,
    pub dice: DiceExpression,
    pub kind: DamageType,
    pub save: Option<SaveDc>,
}

impl Effect for OngoingDamage {
    fn name(&self) -> &str {
        &self.name
    }

    fn cause(&self) -> Option<CombatantId> {
        self.cause
    }

    fn start_turn(&self, _owner: &Combatant, dice: &mut dyn DiceRoller) -> Option<TurnTick> {
        Some(TurnTick::Damage(Damage::new(dice.roll(&self.dice), self.kind)))
    }

    fn ends_at_turn_end(&self, owner: &Combatant, dice: &mut dyn DiceRoller) -> bool {
        self.save
            .is_some_and(|s| owner.saving_throw(s.ability, s.dc, dice).success)
    }
}

/// Turned undead: frightened and incapacitated until a WIS save succeeds,
/// the duration runs out, or somebody attacks it.
#[derive(Debug, Clone)]
pub struct Turned {
    inner: ConditionEffect,
}

impl Turned {
    pub fn new(cause: CombatantId, save: SaveDc) -> Self {
        Self {
            inner: ConditionEffect::new("Turned", Condition::Frightened)
                .with_condition(Condition::Incapacitated)
                .caused_by(cause)
                .save_ends(save)
                .lasting(10),
        }
    }
}

impl Effect for Turned {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn cause(&self) -> Option<CombatantId> {
        self.inner.cause()
    }

    fn duration(&self) -> Option<u32> {
        self.inner.duration()
    }

    fn initial(&self, owner: &mut Combatant) {
        self.inner.initial(owner);
    }

    fn on_removed(&self, owner: &mut Combatant) {
        self.inner.on_removed(owner);
    }

    fn ends_at_turn_end(&self, owner: &Combatant, dice: &mut dyn DiceRoller) -> bool {
        self.inner.ends_at_turn_end(owner, dice)
    }

    fn ends_after_attacked(&self, _owner: &Combatant, _strike: &Strike<'_>) -> bool {
        true
    }
}

// ============================================================================
// Factories
// ============================================================================

pub fn bless(origin: &EffectOrigin) -> Box<dyn Effect> {
    Box::new(Bless {
        cause: Some(origin.caster),
    })
}

pub fn shield_of_faith(origin: &EffectOrigin) -> Box<dyn Effect> {
    Box::new(ShieldOfFaith {
        cause: Some(origin.caster),
    })
}

pub fn aid(origin: &EffectOrigin) -> Box<dyn Effect> {
    Box::new(Aid {
        cause: Some(origin.caster),
        amount: 5,
    })
}

pub fn rage(_origin: &EffectOrigin) -> Box<dyn Effect> {
    Box::new(Rage { damage: 2 })
}

pub fn hold_person(origin: &EffectOrigin) -> Box<dyn Effect> {
    let mut effect = ConditionEffect::new(origin.source.clone(), Condition::Paralyzed)
        .caused_by(origin.caster)
        .lasting(10);
    if let Some(save) = origin.save {
        effect = effect.save_ends(save);
    }
    Box::new(effect)
}

pub fn turned(origin: &EffectOrigin) -> Box<dyn Effect> {
    let save = origin
        .save
        .unwrap_or_else(|| SaveDc::new(Ability::Wisdom, 10));
    Box::new(Turned::new(origin.caster, save))
}

/// Giant-spider style venom: 1d6 poison each turn, CON 11 ends it.
pub fn venom(origin: &EffectOrigin) -> Box<dyn Effect> {
    Box::new(OngoingDamage {
        name: "Venom".to_string(),
        cause: Some(origin.caster),
        dice: DiceExpression::of(1, DieType::D6),
        kind: DamageType::Poison,
        save: Some(SaveDc::new(Ability::Constitution, 11)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::CombatantBuilder;
    use crate::testing::{dummy, ScriptedDice};

    #[test]
    fn test_regeneration_suppressed_after_fire() {
        let mut troll = CombatantBuilder::new("Troll")
            .side("monsters")
            .max_hp(30)
            .effect(Regeneration::new(10).suppressed_by(DamageType::Fire))
            .build()
            .unwrap();
        let mut dice = ScriptedDice::new();

        troll.hit(Damage::new(12, DamageType::Fire), None, false, "Fire Bolt", &mut dice);
        troll.start_turn(&mut dice);
        assert_eq!(troll.hit_points.current(), 18);

        // A quiet turn later it heals again
        troll.start_turn(&mut dice);
        assert_eq!(troll.hit_points.current(), 28);
    }

    #[test]
    fn test_rage_halves_physical_damage() {
        let mut barbarian = dummy("Barbarian", "heroes", 30, 12);
        barbarian.add_effect(Box::new(Rage { damage: 2 }));
        let mut dice = ScriptedDice::new();
        barbarian.hit(Damage::new(9, DamageType::Slashing), None, false, "Axe", &mut dice);
        barbarian.hit(Damage::new(9, DamageType::Fire), None, false, "Fire", &mut dice);
        assert_eq!(barbarian.hit_points.current(), 30 - 4 - 9);
    }

    #[test]
    fn test_relentless_endurance_is_consumed() {
        let mut orc = dummy("Orc", "heroes", 10, 12);
        orc.add_effect(Box::new(RelentlessEndurance));
        let mut dice = ScriptedDice::new();

        orc.hit(Damage::new(15, DamageType::Slashing), None, false, "Axe", &mut dice);
        assert_eq!(orc.hit_points.current(), 1);
        assert!(!orc.effects.contains("Relentless Endurance"));

        orc.hit(Damage::new(5, DamageType::Slashing), None, false, "Axe", &mut dice);
        assert!(orc.is_dead());
    }

    #[test]
    fn test_lucky_rerolls_ones() {
        let mut halfling = dummy("Halfling", "heroes", 10, 12);
        halfling.add_effect(Box::new(Lucky));
        let mut dice = ScriptedDice::new().with_d20s([1, 14]);
        let natural = halfling.roll_natural(
            Advantage::Normal,
            crate::effects::RollReason::Attack,
            &mut dice,
        );
        assert_eq!(natural, 14);
    }

    #[test]
    fn test_aid_raises_and_restores_maximum() {
        let mut fighter = dummy("Fighter", "heroes", 20, 12);
        let origin = EffectOrigin {
            caster: fighter.id,
            source: "Aid".to_string(),
            save: None,
        };
        fighter.add_effect(aid(&origin));
        assert_eq!(fighter.hit_points.maximum(), 25);
        assert_eq!(fighter.hit_points.current(), 25);

        fighter.remove_effect("Aid");
        assert_eq!(fighter.hit_points.maximum(), 20);
        assert_eq!(fighter.hit_points.current(), 20);
    }

    #[test]
    fn test_ongoing_damage_ticks_until_saved() {
        let mut victim = dummy("Victim", "heroes", 20, 12);
        let origin = EffectOrigin {
            caster: CombatantId::unassigned(),
            source: "Bite".to_string(),
            save: None,
        };
        victim.add_effect(venom(&origin));
        let mut dice = ScriptedDice::new().with_rolls([4]).with_d20s([15]);

        victim.start_turn(&mut dice);
        assert_eq!(victim.hit_points.current(), 16);
        let removed = victim.end_turn(&mut dice);
        assert_eq!(removed, vec!["Venom".to_string()]);
    }
}
