//! Weapons, natural attacks and spells.

use super::effects;
use crate::actions::{
    Action, ActionCategory, ActionOutcome, Area, Attack, OnHit, Reach, SkipReason, Spell, SpellKind,
};
use crate::arena::{Arena, ArenaView};
use crate::combatant::Combatant;
use crate::dice::{DiceExpression, DieType};
use crate::effects::SaveDc;
use crate::world::{Ability, CombatantId, Condition, CreatureType, DamageType};

fn d(count: u32, die: DieType) -> DiceExpression {
    DiceExpression::of(count, die)
}

// ============================================================================
// Weapons
// ============================================================================

pub fn longsword() -> Attack {
    Attack::melee("Longsword", d(1, DieType::D8), DamageType::Slashing).with_ability(Ability::Strength)
}

pub fn greataxe() -> Attack {
    Attack::melee("Greataxe", d(1, DieType::D12), DamageType::Slashing).with_ability(Ability::Strength)
}

pub fn mace() -> Attack {
    Attack::melee("Mace", d(1, DieType::D6), DamageType::Bludgeoning).with_ability(Ability::Strength)
}

pub fn shortsword() -> Attack {
    Attack::melee("Shortsword", d(1, DieType::D6), DamageType::Piercing).with_ability(Ability::Dexterity)
}

pub fn shortbow() -> Attack {
    Attack::ranged(
        "Shortbow",
        d(1, DieType::D6),
        DamageType::Piercing,
        Reach::feet(80, 320),
    )
    .with_ability(Ability::Dexterity)
    .with_ammo(20)
}

/// A counterattack after being hit in melee.
pub fn riposte() -> Attack {
    Attack::melee("Riposte", d(1, DieType::D8), DamageType::Slashing)
        .with_ability(Ability::Strength)
        .with_category(ActionCategory::Reaction)
}

// ============================================================================
// Monster attacks
// ============================================================================

/// Stat-block attacks carry their to-hit and damage bonus directly.
pub fn natural(
    name: &str,
    to_hit: i32,
    dice: DiceExpression,
    damage_type: DamageType,
) -> Attack {
    Attack::melee(name, dice, damage_type).with_to_hit(to_hit)
}

pub fn scimitar() -> Attack {
    natural("Scimitar", 4, d(1, DieType::D6).plus(2), DamageType::Slashing)
}

pub fn goblin_shortbow() -> Attack {
    Attack::ranged(
        "Shortbow",
        d(1, DieType::D6).plus(2),
        DamageType::Piercing,
        Reach::feet(80, 320),
    )
    .with_to_hit(4)
    .with_ammo(12)
}

/// Knocks the target prone on a failed DC 11 STR save.
pub fn wolf_bite() -> Attack {
    natural("Bite", 4, d(2, DieType::D4).plus(2), DamageType::Piercing).with_on_hit(OnHit::Condition {
        condition: Condition::Prone,
        save: Some(SaveDc::new(Ability::Strength, 11)),
        repeat_save: false,
    })
}

pub fn spider_bite() -> Attack {
    natural("Bite", 5, d(1, DieType::D8).plus(3), DamageType::Piercing).with_on_hit(OnHit::Effect {
        save: Some(SaveDc::new(Ability::Constitution, 11)),
        factory: effects::venom,
    })
}

/// Several attacks against one target as a single action.
#[derive(Debug, Clone)]
pub struct Multiattack {
    pub attacks: Vec<Attack>,
}

impl Multiattack {
    pub fn new(attacks: impl IntoIterator<Item = Attack>) -> Self {
        Self {
            attacks: attacks.into_iter().collect(),
        }
    }
}

impl Action for Multiattack {
    fn name(&self) -> &str {
        "Multiattack"
    }

    fn category(&self) -> ActionCategory {
        ActionCategory::Action
    }

    /// The shortest reach among the attacks.
    fn reach(&self) -> Reach {
        self.attacks
            .iter()
            .map(|a| a.reach)
            .min_by_key(|r| r.max)
            .unwrap_or(Reach::melee())
    }

    fn score(&self, owner: &Combatant, target: &Combatant, _view: &ArenaView<'_>) -> f64 {
        self.attacks
            .iter()
            .map(|a| a.expected_damage(owner, target))
            .sum()
    }

    fn perform(&mut self, arena: &mut Arena, actor: CombatantId, target: CombatantId) -> ActionOutcome {
        let mut last = None;
        let mut damage = 0;
        for attack in &self.attacks {
            if !arena.get(target).is_some_and(|t| t.is_alive()) {
                break;
            }
            let result = arena.resolve_attack(actor, target, attack);
            damage += result.damage;
            last = Some(result);
        }
        match last {
            Some(mut result) => {
                result.damage = damage;
                ActionOutcome::Attack(result)
            }
            None => ActionOutcome::Skipped(SkipReason::TargetGone),
        }
    }
}

pub fn troll_multiattack() -> Multiattack {
    Multiattack::new([
        natural("Bite", 7, d(1, DieType::D6).plus(4), DamageType::Piercing),
        natural("Claw", 7, d(2, DieType::D6).plus(4), DamageType::Slashing),
        natural("Claw", 7, d(2, DieType::D6).plus(4), DamageType::Slashing),
    ])
}

// ============================================================================
// Spells
// ============================================================================

pub fn fire_bolt() -> Spell {
    Spell::new(
        "Fire Bolt",
        Ability::Intelligence,
        Reach::feet(120, 120),
        SpellKind::Attack {
            damage: d(1, DieType::D10),
            damage_type: DamageType::Fire,
            on_hit: None,
        },
    )
}

pub fn sacred_flame() -> Spell {
    Spell::new(
        "Sacred Flame",
        Ability::Wisdom,
        Reach::feet(60, 60),
        SpellKind::Save {
            save: Ability::Dexterity,
            damage: Some((d(1, DieType::D8), DamageType::Radiant)),
            half_on_success: false,
            on_fail: None,
        },
    )
}

/// Everyone in a 20 ft radius, DEX save for half.
pub fn burning_hands() -> Spell {
    Spell::new(
        "Burning Hands",
        Ability::Intelligence,
        Reach::feet(15, 15),
        SpellKind::Save {
            save: Ability::Dexterity,
            damage: Some((d(3, DieType::D6), DamageType::Fire)),
            half_on_success: true,
            on_fail: None,
        },
    )
    .with_area(Area {
        radius: 1,
        on_caster: false,
        creature_type: None,
    })
    .with_uses(2)
}

pub fn cure_wounds() -> Spell {
    Spell::new(
        "Cure Wounds",
        Ability::Wisdom,
        Reach::melee(),
        SpellKind::Heal {
            dice: d(1, DieType::D8),
        },
    )
    .with_uses(2)
}

pub fn healing_word() -> Spell {
    Spell::new(
        "Healing Word",
        Ability::Wisdom,
        Reach::feet(60, 60),
        SpellKind::Heal {
            dice: d(1, DieType::D4),
        },
    )
    .with_category(ActionCategory::BonusAction)
    .with_uses(2)
}

pub fn bless() -> Spell {
    Spell::new(
        "Bless",
        Ability::Wisdom,
        Reach::feet(30, 30),
        SpellKind::Buff {
            factory: effects::bless,
            max_targets: 3,
        },
    )
    .concentration()
    .with_uses(1)
}

pub fn shield_of_faith() -> Spell {
    Spell::new(
        "Shield of Faith",
        Ability::Wisdom,
        Reach::feet(60, 60),
        SpellKind::Buff {
            factory: effects::shield_of_faith,
            max_targets: 1,
        },
    )
    .with_category(ActionCategory::BonusAction)
    .concentration()
    .with_uses(1)
}

pub fn aid() -> Spell {
    Spell::new(
        "Aid",
        Ability::Wisdom,
        Reach::feet(30, 30),
        SpellKind::Buff {
            factory: effects::aid,
            max_targets: 3,
        },
    )
    .with_uses(1)
}

pub fn hold_person() -> Spell {
    Spell::new(
        "Hold Person",
        Ability::Wisdom,
        Reach::feet(60, 60),
        SpellKind::Save {
            save: Ability::Wisdom,
            damage: None,
            half_on_success: false,
            on_fail: Some(effects::hold_person),
        },
    )
    .concentration()
    .with_uses(1)
}

/// Every undead within 30 ft of the caster.
pub fn turn_undead() -> Spell {
    Spell::new(
        "Turn Undead",
        Ability::Wisdom,
        Reach::feet(30, 30),
        SpellKind::Save {
            save: Ability::Wisdom,
            damage: None,
            half_on_success: false,
            on_fail: Some(effects::turned),
        },
    )
    .with_area(Area {
        radius: 6,
        on_caster: true,
        creature_type: Some(CreatureType::Undead),
    })
    .with_uses(1)
}

/// Rage as a self-targeted bonus action.
pub fn rage() -> Spell {
    Spell::new(
        "Rage",
        Ability::Strength,
        Reach { good: 0, max: 0 },
        SpellKind::Buff {
            factory: effects::rage,
            max_targets: 1,
        },
    )
    .with_category(ActionCategory::BonusAction)
    .with_uses(2)
    .targeting_self()
}
