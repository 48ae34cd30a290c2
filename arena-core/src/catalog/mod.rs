//! A small sample content library.
//!
//! Nothing in the engine depends on this module; it only uses the public
//! builder, action and effect contracts. The CLI presets, the demo and the
//! scenario tests are built from it.

pub mod arsenal;
pub mod creatures;
pub mod effects;

use crate::combatant::CombatantBuilder;
use crate::encounter::{Encounter, EncounterConfig, EncounterError};

/// A named line-up of two or more sides.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    sides: fn() -> Vec<(&'static str, Vec<CombatantBuilder>)>,
}

impl Preset {
    /// Register every side in `encounter`.
    pub fn populate(&self, encounter: &mut Encounter) -> Result<(), EncounterError> {
        for (side, members) in (self.sides)() {
            encounter.add_side(side, members)?;
        }
        Ok(())
    }

    /// A fresh encounter with this line-up.
    pub fn encounter(&self, config: EncounterConfig) -> Result<Encounter, EncounterError> {
        let mut encounter = Encounter::new(config);
        self.populate(&mut encounter)?;
        Ok(encounter)
    }
}

fn party() -> Vec<CombatantBuilder> {
    vec![creatures::fighter(), creatures::rogue(), creatures::cleric()]
}

fn repeat(count: usize, make: fn() -> CombatantBuilder) -> Vec<CombatantBuilder> {
    (0..count).map(|_| make()).collect()
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "duel",
        description: "Fighter against barbarian",
        sides: || {
            vec![
                ("blue", vec![creatures::fighter()]),
                ("red", vec![creatures::barbarian()]),
            ]
        },
    },
    Preset {
        name: "goblin-ambush",
        description: "Fighter, rogue and cleric against six goblins",
        sides: || vec![("heroes", party()), ("goblins", repeat(6, creatures::goblin))],
    },
    Preset {
        name: "crypt",
        description: "The party against five skeletons",
        sides: || vec![("heroes", party()), ("undead", repeat(5, creatures::skeleton))],
    },
    Preset {
        name: "wolf-pack",
        description: "Barbarian and rogue against four wolves",
        sides: || {
            vec![
                ("heroes", vec![creatures::barbarian(), creatures::rogue()]),
                ("wolves", repeat(4, creatures::wolf)),
            ]
        },
    },
    Preset {
        name: "troll-hunt",
        description: "Fighter, wizard and cleric against a troll",
        sides: || {
            vec![
                (
                    "heroes",
                    vec![creatures::fighter(), creatures::wizard(), creatures::cleric()],
                ),
                ("troll", vec![creatures::troll()]),
            ]
        },
    },
    Preset {
        name: "spider-nest",
        description: "The party against two giant spiders",
        sides: || vec![("heroes", party()), ("spiders", repeat(2, creatures::giant_spider))],
    },
];

pub fn preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_populate() {
        for preset in PRESETS {
            let encounter = preset.encounter(EncounterConfig::default()).unwrap();
            assert!(encounter.arena().still_going(), "{} is one-sided", preset.name);
        }
    }

    #[test]
    fn test_lookup() {
        assert!(preset("crypt").is_some());
        assert!(preset("tarrasque").is_none());
    }
}
