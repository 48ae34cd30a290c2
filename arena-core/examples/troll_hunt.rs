//! A single logged fight: the party against a troll.
//!
//! Run with `RUST_LOG=arena_core=debug` to see every roll.

use arena_core::catalog::creatures;
use arena_core::{Encounter, EncounterConfig, EncounterError, Placement};

fn main() -> Result<(), EncounterError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arena_core=info".into()),
        )
        .init();

    println!("=== Troll Hunt ===\n");

    let config = EncounterConfig::default()
        .with_size(10, 6)
        .with_seed(2024)
        .with_placement(Placement::Lines);
    let mut encounter = Encounter::new(config);
    encounter.add_side("heroes", [creatures::fighter(), creatures::wizard(), creatures::cleric()])?;
    encounter.add_side("troll", [creatures::troll()])?;

    encounter.do_initiative();
    for id in encounter.order() {
        let c = encounter.arena().combatant(*id);
        println!("{:<10} initiative {:>3}", c.name, c.initiative.unwrap_or(0));
    }

    while encounter.arena().still_going() {
        encounter.turn()?;
        println!("\n--- after round {} ---", encounter.round());
        for c in encounter.arena().roster() {
            println!(
                "{:<10} {:>3}/{:<3} {}",
                c.name,
                c.hit_points.current(),
                c.hit_points.maximum(),
                c.status()
            );
        }
    }

    let outcome = encounter.report();
    match &outcome.winner {
        Some(side) => println!("\n{side} win after {} rounds", outcome.rounds),
        None => println!("\nNobody is left standing"),
    }
    Ok(())
}
