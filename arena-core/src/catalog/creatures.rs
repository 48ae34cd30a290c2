//! Stat blocks.
//!
//! Heroes default to the "heroes" side and monsters to "monsters";
//! [`Encounter::add_side`](crate::encounter::Encounter::add_side) overrides
//! either.

use super::arsenal;
use super::effects::{Lucky, PackTactics, Regeneration, RelentlessEndurance, SneakAttack};
use crate::combatant::CombatantBuilder;
use crate::dice::{DiceExpression, DieType};
use crate::tactics::{LowestHp, Marked};
use crate::world::{Ability, AbilityScores, Condition, CreatureType, DamageType};

pub const HEROES: &str = "heroes";
pub const MONSTERS: &str = "monsters";

// ============================================================================
// Heroes
// ============================================================================

/// Level 3 champion: crits on 19, ripostes.
pub fn fighter() -> CombatantBuilder {
    CombatantBuilder::new("Fighter")
        .side(HEROES)
        .abilities(AbilityScores::new(16, 14, 14, 10, 12, 8))
        .proficiency(2)
        .save_proficiency(Ability::Strength)
        .save_proficiency(Ability::Constitution)
        .max_hp(28)
        .armor_class(18)
        .critical_threshold(19)
        .action(arsenal::longsword())
        .reaction(arsenal::riposte())
        .death_saves()
}

/// Halfling rogue.
pub fn rogue() -> CombatantBuilder {
    CombatantBuilder::new("Rogue")
        .side(HEROES)
        .abilities(AbilityScores::new(8, 16, 14, 12, 10, 14))
        .save_proficiency(Ability::Dexterity)
        .save_proficiency(Ability::Intelligence)
        .max_hp(21)
        .armor_class(14)
        .speed(25)
        .action(arsenal::shortsword())
        .action(arsenal::shortbow())
        .effect(SneakAttack::new(2))
        .effect(Lucky)
        .policy(LowestHp)
        .death_saves()
}

pub fn cleric() -> CombatantBuilder {
    CombatantBuilder::new("Cleric")
        .side(HEROES)
        .abilities(AbilityScores::new(14, 10, 14, 10, 16, 12))
        .save_proficiency(Ability::Wisdom)
        .save_proficiency(Ability::Charisma)
        .max_hp(24)
        .armor_class(18)
        .speed(25)
        .action(arsenal::mace())
        .action(arsenal::sacred_flame())
        .action(arsenal::bless())
        .action(arsenal::hold_person())
        .action(arsenal::turn_undead())
        .action(arsenal::cure_wounds())
        .action(arsenal::aid())
        .action(arsenal::healing_word())
        .action(arsenal::shield_of_faith())
        .death_saves()
}

pub fn wizard() -> CombatantBuilder {
    CombatantBuilder::new("Wizard")
        .side(HEROES)
        .abilities(AbilityScores::new(8, 14, 14, 16, 12, 10))
        .save_proficiency(Ability::Intelligence)
        .save_proficiency(Ability::Wisdom)
        .max_hp(16)
        .armor_class(12)
        .action(arsenal::fire_bolt())
        .action(arsenal::burning_hands())
        .death_saves()
}

/// Half-orc barbarian.
pub fn barbarian() -> CombatantBuilder {
    CombatantBuilder::new("Barbarian")
        .side(HEROES)
        .abilities(AbilityScores::new(16, 14, 16, 8, 12, 10))
        .save_proficiency(Ability::Strength)
        .save_proficiency(Ability::Constitution)
        .max_hp(32)
        .armor_class(15)
        .speed(40)
        .action(arsenal::greataxe())
        .action(arsenal::rage())
        .effect(RelentlessEndurance)
        .death_saves()
}

// ============================================================================
// Monsters
// ============================================================================

pub fn goblin() -> CombatantBuilder {
    CombatantBuilder::new("Goblin")
        .side(MONSTERS)
        .abilities(AbilityScores::new(8, 14, 10, 10, 8, 8))
        .hit_dice(DiceExpression::of(2, DieType::D6))
        .armor_class(15)
        .action(arsenal::scimitar())
        .action(arsenal::goblin_shortbow())
}

pub fn wolf() -> CombatantBuilder {
    CombatantBuilder::new("Wolf")
        .side(MONSTERS)
        .creature_type(CreatureType::Beast)
        .abilities(AbilityScores::new(12, 15, 12, 3, 12, 6))
        .hit_dice(DiceExpression::of(2, DieType::D8).plus(2))
        .armor_class(13)
        .speed(40)
        .action(arsenal::wolf_bite())
        .effect(PackTactics)
}

pub fn skeleton() -> CombatantBuilder {
    CombatantBuilder::new("Skeleton")
        .side(MONSTERS)
        .creature_type(CreatureType::Undead)
        .abilities(AbilityScores::new(10, 14, 15, 6, 8, 5))
        .hit_dice(DiceExpression::of(2, DieType::D8).plus(4))
        .armor_class(13)
        .action(arsenal::natural(
            "Shortsword",
            4,
            DiceExpression::of(1, DieType::D6).plus(2),
            DamageType::Piercing,
        ))
        .action(arsenal::goblin_shortbow())
        .vulnerable(DamageType::Bludgeoning)
        .immune(DamageType::Poison)
        .condition_immunity(Condition::Poisoned)
}

pub fn giant_spider() -> CombatantBuilder {
    CombatantBuilder::new("Giant Spider")
        .side(MONSTERS)
        .creature_type(CreatureType::Beast)
        .abilities(AbilityScores::new(14, 16, 12, 2, 11, 4))
        .hit_dice(DiceExpression::of(4, DieType::D10).plus(4))
        .armor_class(14)
        .action(arsenal::spider_bite())
        .policy(Marked::new("Venom"))
}

/// Regenerates 10 a turn unless burned or splashed with acid.
pub fn troll() -> CombatantBuilder {
    CombatantBuilder::new("Troll")
        .side(MONSTERS)
        .creature_type(CreatureType::Giant)
        .abilities(AbilityScores::new(18, 13, 20, 7, 9, 7))
        .hit_dice(DiceExpression::of(8, DieType::D10).plus(40))
        .armor_class(15)
        .action(arsenal::troll_multiattack())
        .effect(
            Regeneration::new(10)
                .suppressed_by(DamageType::Fire)
                .suppressed_by(DamageType::Acid),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_stat_block_builds() {
        let all = [
            fighter(),
            rogue(),
            cleric(),
            wizard(),
            barbarian(),
            goblin(),
            wolf(),
            skeleton(),
            giant_spider(),
            troll(),
        ];
        for builder in all {
            let c = builder.build().unwrap();
            assert!(c.hit_points.maximum() > 0, "{} has no HP", c.name);
        }
    }

    #[test]
    fn test_monster_hit_points_are_averages() {
        assert_eq!(goblin().build().unwrap().hit_points.maximum(), 7);
        assert_eq!(troll().build().unwrap().hit_points.maximum(), 84);
    }
}
