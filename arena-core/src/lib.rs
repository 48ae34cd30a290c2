//! D&D 5e tactical combat engine for grid encounters.
//!
//! This crate provides:
//! - A grid arena with A* movement and targeting queries
//! - Combatants with hit points, conditions, death saves and concentration
//! - An effect hook pipeline that lets abilities compose without the
//!   resolver knowing about any of them
//! - Attack, saving-throw and healing resolution
//! - An initiative scheduler that runs an encounter to its end
//!
//! Every random draw goes through an injectable [`DiceRoller`], so a fixed
//! seed replays a fight exactly and tests can script individual rolls.
//!
//! # Quick Start
//!
//! ```no_run
//! use arena_core::catalog::creatures;
//! use arena_core::{Encounter, EncounterConfig};
//!
//! let mut encounter = Encounter::new(EncounterConfig::default().with_seed(42));
//! encounter.add_side("heroes", [creatures::fighter(), creatures::cleric()])?;
//! encounter.add_side("goblins", (0..4).map(|_| creatures::goblin()))?;
//!
//! let outcome = encounter.run()?;
//! println!("{:?} won after {} rounds", outcome.winner, outcome.rounds);
//! # Ok::<(), arena_core::EncounterError>(())
//! ```

pub mod actions;
pub mod arena;
pub mod catalog;
pub mod combatant;
pub mod dice;
pub mod effects;
pub mod encounter;
pub mod report;
pub mod rules;
pub mod tactics;
pub mod testing;
pub mod world;

// Primary public API
pub use actions::{Action, ActionCategory, ActionOutcome, Attack, OnHit, Reach, Spell, SpellKind};
pub use arena::{Arena, ArenaError, ArenaView};
pub use combatant::{BuildError, Combatant, CombatantBuilder, State};
pub use dice::{Advantage, DiceExpression, DiceRoller, DieType, SeededDice};
pub use effects::{ConditionEffect, Effect, EffectSet};
pub use encounter::{Encounter, EncounterConfig, EncounterError, EncounterOutcome, Placement};
pub use report::{AttackStats, BatchSummary, CombatantReport, EncounterReport};
pub use rules::{AttackOutcome, AttackResult};
pub use tactics::{ClosestEnemy, LowestHp, Marked, TargetPolicy};
pub use testing::{ArenaHarness, ScriptedDice};
pub use world::{Ability, AbilityScores, CombatantId, Condition, Coord, Damage, DamageType, Side};
