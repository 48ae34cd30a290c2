//! Whole-encounter tests: placement, scheduling, termination, replay and
//! the preset line-ups.

use arena_core::catalog::{self, creatures};
use arena_core::testing::dummy;
use arena_core::*;

fn run_preset(name: &str, seed: u64) -> Result<EncounterOutcome, EncounterError> {
    let preset = catalog::preset(name).expect("preset exists");
    let mut encounter = preset.encounter(EncounterConfig::default().with_seed(seed))?;
    encounter.run()
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_same_seed_same_fight() {
    let first = run_preset("goblin-ambush", 7);
    let second = run_preset("goblin-ambush", 7);
    assert_eq!(first, second);
}

#[test]
fn test_replayed_report_serializes_identically() {
    let a = run_preset("crypt", 11).map(|o| o.report.to_json().expect("report serializes"));
    let b = run_preset("crypt", 11).map(|o| o.report.to_json().expect("report serializes"));
    assert_eq!(a, b);
}

// =============================================================================
// Termination
// =============================================================================

#[test]
fn test_every_preset_finishes() {
    for preset in catalog::PRESETS {
        for seed in 0..3 {
            let mut encounter = preset
                .encounter(EncounterConfig::default().with_seed(seed))
                .expect("preset builds");
            match encounter.run() {
                Ok(outcome) => {
                    let winner = outcome.winner.expect("a finished fight has a winner");
                    assert!(outcome.rounds >= 1);
                    assert!(outcome.rounds <= encounter.config().max_rounds);
                    for c in &outcome.report.combatants {
                        if c.side != winner {
                            assert_ne!(c.state, State::Ok, "{} survived on the losing side", c.name);
                        }
                    }
                    assert!(outcome.report.side(&winner).any(|c| c.hp > 0));
                }
                Err(EncounterError::RoundLimit(limit)) => {
                    assert_eq!(limit, encounter.config().max_rounds);
                }
                Err(e) => panic!("{} with seed {seed} failed: {e}", preset.name),
            }
        }
    }
}

#[test]
fn test_round_limit_is_reported() {
    // Nobody on either side can hurt the other
    let mut encounter = Encounter::new(EncounterConfig::default().with_seed(3).with_max_rounds(4));
    encounter.add(dummy("Left", "a", 10, 10), Some(Coord::new(0, 0))).unwrap();
    encounter.add(dummy("Right", "b", 10, 10), Some(Coord::new(11, 11))).unwrap();

    assert_eq!(encounter.run(), Err(EncounterError::RoundLimit(4)));
    assert_eq!(encounter.round(), 4);
}

#[test]
fn test_already_decided_fight_takes_no_rounds() {
    let mut encounter = Encounter::new(EncounterConfig::default());
    encounter.add_side("heroes", [creatures::fighter()]).unwrap();

    let outcome = encounter.run().unwrap();
    assert_eq!(outcome.rounds, 0);
    assert_eq!(outcome.winner, Some(Side::new("heroes")));
}

// =============================================================================
// Placement
// =============================================================================

#[test]
fn test_lines_placement_faces_off() {
    let config = EncounterConfig::default()
        .with_size(10, 8)
        .with_placement(Placement::Lines);
    let mut encounter = Encounter::new(config);
    let heroes = encounter
        .add_side("heroes", [creatures::fighter(), creatures::cleric()])
        .unwrap();
    let goblins = encounter
        .add_side("goblins", (0..3).map(|_| creatures::goblin()))
        .unwrap();

    for id in heroes {
        assert_eq!(encounter.arena().combatant(id).position.map(|p| p.x), Some(0));
    }
    for id in goblins {
        assert_eq!(encounter.arena().combatant(id).position.map(|p| p.x), Some(9));
    }
}

#[test]
fn test_random_placement_fills_distinct_cells() {
    let mut encounter = Encounter::new(EncounterConfig::default().with_size(4, 4).with_seed(5));
    encounter
        .add_side("goblins", (0..16).map(|_| creatures::goblin()))
        .unwrap();

    let mut cells: Vec<Coord> = encounter
        .arena()
        .roster()
        .iter()
        .filter_map(|c| c.position)
        .collect();
    cells.sort();
    cells.dedup();
    assert_eq!(cells.len(), 16);

    let overflow = encounter.add_side("goblins", [creatures::goblin()]);
    assert!(matches!(overflow, Err(EncounterError::Arena(_))));
}

#[test]
fn test_invalid_stat_block_is_rejected() {
    let mut encounter = Encounter::new(EncounterConfig::default());
    let broken = CombatantBuilder::new("Nobody").armor_class(12);
    assert!(matches!(
        encounter.add_side("heroes", [broken]),
        Err(EncounterError::Build(_))
    ));
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_batch_summary_accounts_for_every_run() {
    let mut summary = BatchSummary::new();
    for seed in 0..5 {
        match run_preset("wolf-pack", seed) {
            Ok(outcome) => summary.record(&outcome.report),
            Err(_) => summary.record_failure(),
        }
    }

    assert_eq!(summary.runs, 5);
    assert_eq!(summary.completed() + summary.failures, 5);
    let rates: f64 = summary.wins.keys().map(|side| summary.win_rate(side)).sum();
    if summary.completed() > summary.draws {
        assert!(rates > 0.0 && rates <= 1.0 + f64::EPSILON);
    }
}
