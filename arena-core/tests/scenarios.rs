//! Scripted combat scenarios.
//!
//! Every roll that matters is queued on a `ScriptedDice`, so each test
//! replays exactly.

use arena_core::actions::Action;
use arena_core::catalog::{arsenal, creatures};
use arena_core::combatant::DeathSaveOutcome;
use arena_core::dice::{roll_d20, DiceRoller};
use arena_core::rules::roll_damage;
use arena_core::testing::{assert_has_effect, assert_hp, dummy};
use arena_core::*;

fn spear() -> Attack {
    Attack::melee("Spear", DiceExpression::of(1, DieType::D8), DamageType::Piercing).with_to_hit(5)
}

fn build(builder: CombatantBuilder) -> Combatant {
    builder.build().expect("stat block should build")
}

// =============================================================================
// Attack resolution
// =============================================================================

#[test]
fn test_basic_melee_exchange() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([10]).with_rolls([4]));
    let attacker = h.place(dummy("Attacker", "a", 10, 10), Coord::new(0, 0));
    let target = h.place(dummy("Target", "b", 20, 13), Coord::new(1, 0));

    let result = h.arena.resolve_attack(attacker, target, &spear());

    assert_eq!(result.outcome, AttackOutcome::Hit);
    assert_eq!(result.total, Some(15));
    assert_eq!(result.damage, 4);
    assert_hp(h.combatant(target), 16);
}

#[test]
fn test_natural_one_misses_whatever_the_total() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([1]));
    let attacker = h.place(dummy("Attacker", "a", 10, 10), Coord::new(0, 0));
    let target = h.place(dummy("Target", "b", 20, 13), Coord::new(1, 0));

    let result = h.arena.resolve_attack(attacker, target, &spear().with_to_hit(30));

    assert_eq!(result.outcome, AttackOutcome::CriticalMiss);
    assert!(result.total.unwrap() > 13);
    assert_hp(h.combatant(target), 20);
    assert_eq!(h.combatant(attacker).stats["Spear"].misses, 1);
}

#[test]
fn test_critical_damage_is_max_dice_plus_roll() {
    let mut dice = ScriptedDice::new().with_rolls([3]);
    let expr = DiceExpression::parse("1d12+3").unwrap();
    assert_eq!(dice.roll_max(&expr.dice_only()), 12);
    assert_eq!(roll_damage(&mut dice, &expr, true), 18);
}

#[test]
fn test_critical_hit_through_the_arena() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([20]).with_rolls([3]));
    let attacker = h.place(dummy("Attacker", "a", 10, 10), Coord::new(0, 0));
    let target = h.place(dummy("Target", "b", 40, 30), Coord::new(1, 0));
    let axe = Attack::melee("Greataxe", DiceExpression::parse("1d12+3").unwrap(), DamageType::Slashing);

    let result = h.arena.resolve_attack(attacker, target, &axe);

    assert_eq!(result.outcome, AttackOutcome::CriticalHit);
    assert_eq!(result.damage, 18);
    assert_eq!(h.combatant(attacker).stats["Greataxe"].criticals, 1);
}

#[test]
fn test_advantage_and_disadvantage_cancel() {
    assert_eq!(Advantage::from_sources(true, true), Advantage::Normal);

    let mut dice = ScriptedDice::new().with_d20s([5, 19]);
    let roll = roll_d20(&mut dice, Advantage::from_sources(true, true));
    assert_eq!(roll.natural, 5);
    assert_eq!(roll.discarded, None);
    assert_eq!(dice.d20_count(), 1);

    // Prone target in melee (advantage) while the attacker is poisoned
    let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([5, 19]));
    let attacker = h.place(dummy("Attacker", "a", 10, 10), Coord::new(0, 0));
    let target = h.place(dummy("Target", "b", 20, 13), Coord::new(1, 0));
    h.combatant_mut(target).add_condition(Condition::Prone, "Trip");
    h.combatant_mut(attacker).add_condition(Condition::Poisoned, "Venom");

    let result = h.arena.resolve_attack(attacker, target, &spear());
    assert_eq!(result.advantage, Advantage::Normal);
    assert_eq!(result.natural, Some(5));
}

#[test]
fn test_paralyzed_target_takes_critical_melee_hits() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([8, 3]).with_rolls([2]));
    let attacker = h.place(dummy("Attacker", "a", 10, 10), Coord::new(0, 0));
    let target = h.place(dummy("Target", "b", 40, 10), Coord::new(1, 0));
    h.combatant_mut(target).add_condition(Condition::Paralyzed, "Hold Person");

    let result = h.arena.resolve_attack(attacker, target, &spear());

    // Advantage keeps the 8; a melee hit on a paralyzed creature is critical
    assert_eq!(result.advantage, Advantage::Advantage);
    assert_eq!(result.outcome, AttackOutcome::CriticalHit);
    assert_eq!(result.damage, 10);
}

#[test]
fn test_once_per_turn_extra_damage() {
    let mut h = ArenaHarness::new(
        ScriptedDice::new()
            .with_d20s([15, 15])
            .with_rolls([4, 6, 2]),
    );
    let rogue = h.place(build(creatures::rogue().side("a")), Coord::new(0, 0));
    h.place(build(creatures::fighter().side("a")), Coord::new(2, 0));
    let ogre = h.place(dummy("Ogre", "b", 100, 10), Coord::new(1, 0));

    let sword = arsenal::shortsword();
    let first = h.arena.resolve_attack(rogue, ogre, &sword);
    let second = h.arena.resolve_attack(rogue, ogre, &sword);

    // 1d6+3 plus 2d6 sneak attack, then 1d6+3 alone
    assert_eq!(first.damage, 13);
    assert_eq!(second.damage, 5);
    assert_hp(h.combatant(ogre), 82);
    assert_eq!(h.combatant(rogue).stats["Sneak Attack"].hits, 1);
}

#[test]
fn test_reaction_fires_once_per_round() {
    let mut h = ArenaHarness::new(
        ScriptedDice::new()
            .with_d20s([18, 15, 18])
            .with_rolls([3, 2, 3]),
    );
    let fighter = h.place(build(creatures::fighter()), Coord::new(0, 0));
    let goblin = h.place(build(creatures::goblin()), Coord::new(1, 0));
    let scimitar = arsenal::scimitar();

    h.arena.resolve_attack(goblin, fighter, &scimitar);
    h.arena.resolve_attack(goblin, fighter, &scimitar);

    assert_hp(h.combatant(fighter), 18);
    assert_hp(h.combatant(goblin), 2);
    assert_eq!(h.combatant(fighter).stats["Riposte"].hits, 1);
}

#[test]
fn test_multiattack_resolves_each_attack() {
    let mut h = ArenaHarness::new(
        ScriptedDice::new()
            .with_d20s([15, 15, 15])
            .with_rolls([3, 5, 5]),
    );
    let troll = h.place(build(creatures::troll()), Coord::new(0, 0));
    let target = h.place(dummy("Target", "heroes", 100, 10), Coord::new(1, 0));

    let mut multiattack = arsenal::troll_multiattack();
    let outcome = multiattack.perform(&mut h.arena, troll, target);

    match outcome {
        ActionOutcome::Attack(result) => assert_eq!(result.damage, 25),
        other => panic!("expected an attack, got {other:?}"),
    }
    assert_eq!(h.combatant(troll).stats["Claw"].hits, 2);
    assert_hp(h.combatant(target), 75);
}

#[test]
fn test_attacking_a_removed_target_is_a_no_op() {
    let mut h = ArenaHarness::new(ScriptedDice::new());
    let attacker = h.place(dummy("Attacker", "a", 10, 10), Coord::new(0, 0));
    let target = h.place(dummy("Target", "b", 5, 10), Coord::new(1, 0));
    h.arena
        .apply_damage(None, target, Damage::new(50, DamageType::Force), false, "Disintegrate");

    let result = h.arena.resolve_attack(attacker, target, &spear());
    assert_eq!(result.outcome, AttackOutcome::NoTarget);
    assert!(!result.is_hit());
}

// =============================================================================
// Spells, effects and concentration
// =============================================================================

#[test]
fn test_new_concentration_spell_ends_the_old_one() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([5, 3]));
    let cleric = h.place(build(creatures::cleric()), Coord::new(0, 0));
    let fighter = h.place(build(creatures::fighter()), Coord::new(1, 0));
    let goblin = h.place(build(creatures::goblin()), Coord::new(3, 0));

    h.arena.cast_spell(cleric, cleric, &arsenal::bless());
    assert_has_effect(h.combatant(cleric), "Bless");
    assert_has_effect(h.combatant(fighter), "Bless");

    // Goblin rolls 5 - 1 against DC 13
    h.arena.cast_spell(cleric, goblin, &arsenal::hold_person());
    assert!(!h.combatant(fighter).effects.contains("Bless"));
    assert!(h.combatant(goblin).has_condition(Condition::Paralyzed));
    let held = h.combatant(cleric).concentration.clone().unwrap();
    assert_eq!(held.spell, "Hold Person");
    assert_eq!(held.targets, vec![goblin]);

    // Damage forces a CON save: 3 + 2 misses DC 10
    let report = h.arena.apply_damage(
        Some(goblin),
        cleric,
        Damage::new(10, DamageType::Slashing),
        false,
        "Scimitar",
    );
    assert!(report.lost_concentration.is_some());
    assert!(h.combatant(cleric).concentration.is_none());
    assert!(!h.combatant(goblin).has_condition(Condition::Paralyzed));
    assert!(h.combatant(goblin).effects.is_empty());
}

#[test]
fn test_turn_undead_ends_on_a_successful_save() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([4, 20]));
    let cleric = h.place(build(creatures::cleric()), Coord::new(0, 0));
    let skeleton = h.place(build(creatures::skeleton()), Coord::new(2, 0));
    let zombie_friend = h.place(dummy("Cultist", "monsters", 9, 12), Coord::new(3, 0));

    let outcome = h.arena.cast_spell(cleric, skeleton, &arsenal::turn_undead());
    assert_eq!(outcome, ActionOutcome::Cast { affected: vec![skeleton] });
    assert_has_effect(h.combatant(skeleton), "Turned");
    assert!(h.combatant(skeleton).has_condition(Condition::Frightened));
    assert_eq!(h.combatant(skeleton).state(), State::Incapacitated);
    assert!(h.combatant(zombie_friend).effects.is_empty());

    let removed = h.arena.end_turn(skeleton);
    assert_eq!(removed, vec!["Turned".to_string()]);
    let skeleton = h.combatant(skeleton);
    assert!(skeleton.effects.is_empty());
    assert!(!skeleton.has_condition(Condition::Frightened));
    assert!(!skeleton.has_condition(Condition::Incapacitated));
    assert_eq!(skeleton.state(), State::Ok);
}

#[test]
fn test_healing_word_brings_an_ally_back() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_rolls([2]));
    let cleric = h.place(build(creatures::cleric()), Coord::new(0, 0));
    let fighter = h.place(build(creatures::fighter()), Coord::new(4, 0));
    h.arena
        .apply_damage(None, fighter, Damage::new(28, DamageType::Slashing), false, "Axe");
    assert_eq!(h.combatant(fighter).state(), State::Unconscious);

    h.arena.cast_spell(cleric, fighter, &arsenal::healing_word());
    // 1d4 rolled 2, plus WIS 3
    assert_hp(h.combatant(fighter), 5);
    assert_eq!(h.combatant(fighter).state(), State::Ok);
    assert!(!h.combatant(fighter).has_condition(Condition::Prone));
}

#[test]
fn test_save_for_half_area_spell() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_rolls([10]).with_d20s([2, 20]));
    let wizard = h.place(build(creatures::wizard()), Coord::new(0, 0));
    let a = h.place(dummy("A", "monsters", 30, 10), Coord::new(3, 0));
    let b = h.place(dummy("B", "monsters", 30, 10), Coord::new(3, 1));
    let far = h.place(dummy("Far", "monsters", 30, 10), Coord::new(6, 0));

    h.arena.cast_spell(wizard, a, &arsenal::burning_hands());

    assert_hp(h.combatant(a), 20);
    assert_hp(h.combatant(b), 25);
    assert_hp(h.combatant(far), 30);
}

// =============================================================================
// Hit points, death and the end of the fight
// =============================================================================

#[test]
fn test_death_saves_until_death() {
    let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([12, 1, 5]));
    let fighter = h.place(build(creatures::fighter()), Coord::new(0, 0));
    h.arena
        .apply_damage(None, fighter, Damage::new(30, DamageType::Slashing), false, "Maul");
    assert!(h.combatant(fighter).is_dying());
    assert!(h.combatant(fighter).has_condition(Condition::Prone));

    assert_eq!(h.arena.death_save(fighter), Some(DeathSaveOutcome::Success));
    assert_eq!(h.arena.death_save(fighter), Some(DeathSaveOutcome::Failure));
    assert_eq!(h.arena.death_save(fighter), Some(DeathSaveOutcome::Died));
    assert!(h.combatant(fighter).is_dead());
    assert_eq!(h.combatant(fighter).position, None);
    assert_eq!(h.arena.death_save(fighter), None);
}

#[test]
fn test_massive_damage_kills_outright() {
    let mut h = ArenaHarness::new(ScriptedDice::new());
    let fighter = h.place(build(creatures::fighter()), Coord::new(0, 0));
    let report = h.arena.apply_damage(
        None,
        fighter,
        Damage::new(56, DamageType::Necrotic),
        false,
        "Finger of Death",
    );
    assert!(report.died);
    assert_eq!(h.combatant(fighter).state(), State::Dead);
}

#[test]
fn test_encounter_ends_when_one_side_falls() {
    let mut h = ArenaHarness::new(ScriptedDice::new());
    h.place(dummy("A1", "a", 10, 10), Coord::new(0, 0));
    h.place(dummy("A2", "a", 10, 10), Coord::new(0, 1));
    let b = h.place(dummy("B", "b", 10, 10), Coord::new(5, 5));
    assert!(h.arena.still_going());

    h.arena
        .apply_damage(None, b, Damage::new(10, DamageType::Fire), false, "Fireball");

    assert!(!h.arena.still_going());
    assert_eq!(h.arena.winning_side(), Side::new("a"));
    let remaining = h.arena.remaining_participants();
    assert_eq!(remaining[&Side::new("a")], 2);
    assert_eq!(remaining[&Side::new("b")], 0);
}

#[test]
#[should_panic(expected = "winning_side called while 2 sides are standing")]
fn test_winning_side_while_fighting_panics() {
    let mut h = ArenaHarness::new(ScriptedDice::new());
    h.place(dummy("A", "a", 10, 10), Coord::new(0, 0));
    h.place(dummy("B", "b", 10, 10), Coord::new(5, 5));
    h.arena.winning_side();
}
