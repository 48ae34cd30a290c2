//! Property tests for the arithmetic every fight leans on: mitigation,
//! hit point bounds, d20 selection, grid distance and hook ordering.

use arena_core::dice::roll_d20;
use arena_core::testing::dummy;
use arena_core::*;
use proptest::prelude::*;

fn with_defenses(
    immune: &[DamageType],
    vulnerable: &[DamageType],
    resistant: &[DamageType],
) -> Combatant {
    let mut builder = CombatantBuilder::new("Subject").side("test").max_hp(50);
    for kind in immune {
        builder = builder.immune(*kind);
    }
    for kind in vulnerable {
        builder = builder.vulnerable(*kind);
    }
    for kind in resistant {
        builder = builder.resistant(*kind);
    }
    builder.build().expect("valid stat block")
}

#[derive(Debug)]
struct Halve;

impl Effect for Halve {
    fn name(&self) -> &str {
        "Halve"
    }

    fn being_hit(&self, _owner: &Combatant, damage: Damage) -> Damage {
        damage.halved()
    }
}

#[derive(Debug)]
struct Bruise(i32);

impl Effect for Bruise {
    fn name(&self) -> &str {
        "Bruise"
    }

    fn being_hit(&self, _owner: &Combatant, damage: Damage) -> Damage {
        Damage::new(damage.amount + self.0, damage.kind)
    }
}

// =============================================================================
// Mitigation
// =============================================================================

proptest! {
    #[test]
    fn immunity_wins_over_vulnerability(amount in 0i32..500) {
        let c = with_defenses(&[DamageType::Fire], &[DamageType::Fire], &[DamageType::Fire]);
        prop_assert_eq!(c.mitigate(Damage::new(amount, DamageType::Fire)).amount, 0);
    }

    #[test]
    fn resistance_halves_rounding_down(amount in 0i32..500) {
        let c = with_defenses(&[], &[], &[DamageType::Cold]);
        prop_assert_eq!(c.mitigate(Damage::new(amount, DamageType::Cold)).amount, amount / 2);
        prop_assert_eq!(c.mitigate(Damage::new(amount, DamageType::Fire)).amount, amount);
    }

    #[test]
    fn vulnerability_doubles(amount in 0i32..500) {
        let c = with_defenses(&[], &[DamageType::Radiant], &[]);
        prop_assert_eq!(c.mitigate(Damage::new(amount, DamageType::Radiant)).amount, amount * 2);
    }
}

// =============================================================================
// Hit points
// =============================================================================

proptest! {
    #[test]
    fn hit_points_stay_in_bounds(
        maximum in 1i32..200,
        steps in prop::collection::vec((any::<bool>(), -20i32..300), 0..40),
    ) {
        let mut hp = world::HitPoints::new(maximum);
        for (is_damage, amount) in steps {
            if is_damage {
                hp.take_damage(amount);
            } else {
                let restored = hp.heal(amount);
                prop_assert!(restored >= 0);
            }
            prop_assert!(hp.current() >= 0);
            prop_assert!(hp.current() <= hp.maximum());
        }
    }

    #[test]
    fn combatant_never_goes_negative(
        seed in any::<u64>(),
        steps in prop::collection::vec((any::<bool>(), 0i32..40), 0..30),
    ) {
        let mut dice = SeededDice::new(seed);
        let mut c = CombatantBuilder::new("Hero")
            .side("test")
            .max_hp(30)
            .death_saves()
            .build()
            .expect("valid stat block");
        for (is_damage, amount) in steps {
            if is_damage {
                c.hit(Damage::new(amount, DamageType::Slashing), None, false, "Sword", &mut dice);
            } else {
                c.heal(amount);
            }
            prop_assert!(c.hit_points.current() >= 0);
            prop_assert!(c.hit_points.current() <= c.hit_points.maximum());
            if c.is_dead() {
                prop_assert_eq!(c.hit_points.current(), 0);
            }
        }
    }
}

// =============================================================================
// d20 selection
// =============================================================================

proptest! {
    #[test]
    fn advantage_keeps_the_higher_die(a in 1i32..=20, b in 1i32..=20) {
        let mut dice = ScriptedDice::new().with_d20s([a, b]);
        let roll = roll_d20(&mut dice, Advantage::Advantage);
        prop_assert_eq!(roll.natural, a.max(b));
        prop_assert_eq!(dice.d20_count(), 2);

        let mut dice = ScriptedDice::new().with_d20s([a, b]);
        let roll = roll_d20(&mut dice, Advantage::Disadvantage);
        prop_assert_eq!(roll.natural, a.min(b));
    }

    #[test]
    fn cancelled_advantage_draws_one_die(a in 1i32..=20, b in 1i32..=20) {
        let mut dice = ScriptedDice::new().with_d20s([a, b]);
        let roll = roll_d20(&mut dice, Advantage::from_sources(true, true));
        prop_assert_eq!(roll.natural, a);
        prop_assert_eq!(dice.d20_count(), 1);
    }
}

// =============================================================================
// Grid distance
// =============================================================================

#[test]
fn test_distance_examples() {
    assert_eq!(Coord::new(0, 0).distance(Coord::new(3, 4)), 5);
    assert_eq!(Coord::new(0, 0).distance(Coord::new(1, 1)), 1);
    assert_eq!(Coord::new(0, 0).distance(Coord::new(2, 2)), 2);
}

proptest! {
    #[test]
    fn distance_is_symmetric_and_bounded(
        x1 in -50i32..50, y1 in -50i32..50, x2 in -50i32..50, y2 in -50i32..50,
    ) {
        let a = Coord::new(x1, y1);
        let b = Coord::new(x2, y2);
        let d = a.distance(b);
        prop_assert_eq!(d, b.distance(a));
        prop_assert!(d >= (x1 - x2).abs().max((y1 - y2).abs()));
        prop_assert!(d <= (x1 - x2).abs() + (y1 - y2).abs());
    }
}

// =============================================================================
// Hook ordering
// =============================================================================

#[test]
fn test_incoming_transforms_run_in_insertion_order() {
    let mut first = dummy("First", "test", 100, 10);
    first.add_effect(Box::new(Halve));
    first.add_effect(Box::new(Bruise(3)));
    let dealt = first.effects.transform_incoming(&first, Damage::new(10, DamageType::Fire));
    assert_eq!(dealt.amount, 8);

    let mut second = dummy("Second", "test", 100, 10);
    second.add_effect(Box::new(Bruise(3)));
    second.add_effect(Box::new(Halve));
    let dealt = second.effects.transform_incoming(&second, Damage::new(10, DamageType::Fire));
    assert_eq!(dealt.amount, 6);
}

#[test]
fn test_replacing_an_effect_keeps_one_copy() {
    let mut c = dummy("Subject", "test", 100, 10);
    c.add_effect(Box::new(Bruise(1)));
    c.add_effect(Box::new(Bruise(5)));
    assert_eq!(c.effects.names(), vec!["Bruise".to_string()]);
    let dealt = c.effects.transform_incoming(&c, Damage::new(10, DamageType::Fire));
    assert_eq!(dealt.amount, 15);
}
