//! Per-combatant turn AI.
//!
//! A turn is a greedy one-step lookahead: the target policy names an enemy,
//! every ready action is scored against the candidates it can reach this
//! turn, the best one wins (ties go to the earlier declared action), and
//! the mover closes to the distance that action wants before using it.

use crate::actions::{ActionCategory, ActionOutcome, Reach, SkipReason};
use crate::arena::{Arena, ArenaView};
use crate::combatant::{Combatant, State};
use crate::rules::ActionSlot;
use crate::world::{CombatantId, Coord};
use std::fmt;
use tracing::{debug, info, warn};

// ============================================================================
// Target policies
// ============================================================================

/// Picks the enemy a combatant focuses on this turn.
pub trait TargetPolicy: fmt::Debug {
    fn name(&self) -> &str;

    fn choose(&self, me: &Combatant, view: &ArenaView<'_>) -> Option<CombatantId>;
}

/// The nearest living enemy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestEnemy;

impl TargetPolicy for ClosestEnemy {
    fn name(&self) -> &str {
        "closest enemy"
    }

    fn choose(&self, me: &Combatant, view: &ArenaView<'_>) -> Option<CombatantId> {
        view.pick_closest_enemy(me.id).into_iter().next()
    }
}

/// The living enemy with the fewest hit points, nearest on ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestHp;

impl TargetPolicy for LowestHp {
    fn name(&self) -> &str {
        "lowest hp"
    }

    fn choose(&self, me: &Combatant, view: &ArenaView<'_>) -> Option<CombatantId> {
        // Stable sort keeps the distance order among equals
        let mut enemies: Vec<&Combatant> = view
            .pick_closest_enemy(me.id)
            .into_iter()
            .filter_map(|id| view.get(id))
            .collect();
        enemies.sort_by_key(|c| c.hit_points.current());
        enemies.first().map(|c| c.id)
    }
}

/// Enemies carrying the named effect first (a hunter's quarry, a hexed
/// foe), otherwise the nearest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marked(pub String);

impl Marked {
    pub fn new(effect: impl Into<String>) -> Self {
        Self(effect.into())
    }
}

impl TargetPolicy for Marked {
    fn name(&self) -> &str {
        "marked"
    }

    fn choose(&self, me: &Combatant, view: &ArenaView<'_>) -> Option<CombatantId> {
        let enemies = view.pick_closest_enemy(me.id);
        enemies
            .iter()
            .copied()
            .find(|id| view.get(*id).is_some_and(|c| c.effects.contains(&self.0)))
            .or_else(|| enemies.first().copied())
    }
}

// ============================================================================
// Action selection
// ============================================================================

/// The action a combatant settled on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    pub index: usize,
    pub target: CombatantId,
    pub reach: Reach,
    pub score: f64,
}

/// Allies a support action may aim at: the combatant itself, then every
/// same-side creature still on the grid (downed ones included), nearest
/// first.
fn ally_candidates(me: &Combatant, view: &ArenaView<'_>) -> Vec<CombatantId> {
    let Some(origin) = me.position else {
        return Vec::new();
    };
    let mut allies: Vec<(i32, CombatantId)> = view
        .roster()
        .iter()
        .filter(|c| c.side == me.side && !c.is_dead())
        .filter_map(|c| c.position.map(|p| (origin.distance(p), c.id)))
        .collect();
    allies.sort();
    allies.into_iter().map(|(_, id)| id).collect()
}

/// Best ready action of `category`, or `None` when nothing scores above 0.
pub fn choose_action(
    me: &Combatant,
    view: &ArenaView<'_>,
    category: ActionCategory,
) -> Option<Plan> {
    let origin = me.position?;
    let enemy = me.policy.choose(me, view);
    let allies = ally_candidates(me, view);
    let movement = me.economy.movement;

    let mut best: Option<Plan> = None;
    for (index, action) in me.actions.iter().enumerate() {
        if action.category() != category || !action.ready(me) {
            continue;
        }
        let reach = action.reach();
        let candidates: &[CombatantId] = if action.self_only() {
            std::slice::from_ref(&me.id)
        } else if action.targets_allies() {
            &allies
        } else {
            match &enemy {
                Some(id) => std::slice::from_ref(id),
                None => &[],
            }
        };
        for id in candidates {
            let Some(target) = view.get(*id) else {
                continue;
            };
            let Some(at) = target.position else {
                continue;
            };
            // Only what can be reached after this turn's movement
            if origin.distance(at) - movement > reach.max {
                continue;
            }
            let score = action.score(me, target, view);
            if score > 0.0 && best.map_or(true, |b| score > b.score) {
                best = Some(Plan {
                    index,
                    target: *id,
                    reach,
                    score,
                });
            }
        }
    }
    best
}

// ============================================================================
// Turn driver
// ============================================================================

/// Spend movement and get into position for `plan`.
fn position_for(arena: &mut Arena, id: CombatantId, target: Coord, reach: Reach) {
    let Some(me) = arena.get(id) else {
        return;
    };
    let Some(from) = me.position else {
        return;
    };
    let movement = me.economy.movement;
    let distance = from.distance(target);

    if reach.is_melee() {
        if distance > 1 {
            spend(arena, id, target, movement, 1);
        }
        return;
    }

    let threat = arena
        .view()
        .adjacent_enemies(id)
        .first()
        .and_then(|e| arena.get(*e))
        .and_then(|e| e.position);
    match threat {
        Some(threat) if reach.good > 1 && movement > 0 => {
            let to = arena.move_away(id, threat);
            if to != from {
                if let Some(me) = arena.get_mut(id) {
                    me.economy.spend_movement(1);
                }
            }
        }
        _ if distance > reach.good => spend(arena, id, target, movement, reach.good),
        _ => {}
    }
}

fn spend(arena: &mut Arena, id: CombatantId, target: Coord, movement: i32, stop_within: i32) {
    let moved = arena.approach(id, target, movement, stop_within);
    if moved.steps > 0 {
        if let Some(me) = arena.get_mut(id) {
            me.economy.spend_movement(moved.steps);
        }
    }
}

/// Choose, move for, and use one action of `category`.
pub fn act(arena: &mut Arena, id: CombatantId, category: ActionCategory) -> Option<ActionOutcome> {
    let (plan, fallback) = {
        let view = arena.view();
        let me = view.get(id)?;
        if me.state() != State::Ok || !me.economy.has(category) {
            return None;
        }
        let plan = choose_action(me, &view, category);
        let fallback = me
            .policy
            .choose(me, &view)
            .and_then(|t| view.get(t))
            .and_then(|t| t.position);
        (plan, fallback)
    };

    let Some(plan) = plan else {
        // Nothing worth doing from here: close in for next turn
        let movement = arena.get(id).map_or(0, |c| c.economy.movement);
        if let (ActionCategory::Action, Some(at)) = (category, fallback) {
            spend(arena, id, at, movement, 1);
        }
        return None;
    };

    let target_at = arena.get(plan.target).and_then(|t| t.position)?;
    position_for(arena, id, target_at, plan.reach);

    let distance = arena.view().distance_between(id, plan.target)?;
    if !plan.reach.contains(distance) {
        let name = arena.get(id).map(|c| c.name.clone()).unwrap_or_default();
        warn!(combatant = %name, distance, "could not get in range");
        return Some(ActionOutcome::Skipped(SkipReason::OutOfRange));
    }
    debug!(score = plan.score, index = plan.index, "chosen action");
    Some(arena.perform_action(id, ActionSlot::Action(plan.index), plan.target))
}

/// Run the decision part of a turn: the action, then the bonus action.
/// Stops early once the fight is decided.
pub fn take_turn(arena: &mut Arena, id: CombatantId) -> Vec<ActionOutcome> {
    let mut outcomes = Vec::new();
    for category in [ActionCategory::Action, ActionCategory::BonusAction] {
        if !arena.still_going() {
            break;
        }
        if let Some(outcome) = act(arena, id, category) {
            outcomes.push(outcome);
        }
    }
    if let Some(me) = arena.get(id) {
        info!(combatant = %me.name, actions = outcomes.len(), "turn taken");
    }
    outcomes
}
