//! Rules resolution.
//!
//! Everything that changes more than one combatant at a time lives here, as
//! methods on [`Arena`]: the attack state machine, saving-throw and healing
//! spells, effect placement with concentration bookkeeping, the reaction
//! window and the turn wrappers the scheduler calls.
//!
//! Attack sequence: range check, roll to hit, hit or miss, damage roll,
//! mitigation, riders and extra damage, bookkeeping. An attack against a
//! creature that is gone or dead is a no-op, never an error.

use crate::actions::{ActionOutcome, Attack, EffectOrigin, OnHit, SkipReason, Spell, SpellKind};
use crate::arena::{Arena, ArenaView};
use crate::combatant::{Combatant, Concentration, DeathSaveOutcome, HitReport, State, TurnStart};
use crate::dice::{Advantage, DiceExpression, DiceRoller};
use crate::effects::{ConditionEffect, Effect, ExtraDamage, RollReason, SaveDc, Strike};
use crate::world::{Ability, CombatantId, Condition, Damage};
use tracing::{debug, info, warn};

// ============================================================================
// Attack results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    Hit,
    CriticalHit,
    Miss,
    CriticalMiss,
    OutOfRange,
    /// Attacker or target missing, dead or off the grid.
    NoTarget,
}

/// What one attack did.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackResult {
    pub outcome: AttackOutcome,
    pub natural: Option<i32>,
    pub total: Option<i32>,
    pub advantage: Advantage,
    /// Main hit plus every extra damage instance, after mitigation.
    pub damage: i32,
    pub target_dropped: bool,
}

impl AttackResult {
    fn aborted(outcome: AttackOutcome) -> Self {
        Self {
            outcome,
            natural: None,
            total: None,
            advantage: Advantage::Normal,
            damage: 0,
            target_dropped: false,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.outcome, AttackOutcome::Hit | AttackOutcome::CriticalHit)
    }

    pub fn is_critical(&self) -> bool {
        self.outcome == AttackOutcome::CriticalHit
    }

    /// A d20 was thrown. False when the attack was called off before the
    /// roll (out of range, no target).
    pub fn was_rolled(&self) -> bool {
        !matches!(self.outcome, AttackOutcome::OutOfRange | AttackOutcome::NoTarget)
    }
}

/// Which of a combatant's lists an action lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSlot {
    Action(usize),
    Reaction(usize),
}

/// Damage for one hit. A critical adds the maximum of the dice to a normal
/// roll, so the flat bonus counts once.
pub fn roll_damage(dice: &mut dyn DiceRoller, expr: &DiceExpression, critical: bool) -> i32 {
    if critical {
        dice.roll_max(&expr.dice_only()) + dice.roll(expr)
    } else {
        dice.roll(expr)
    }
}

/// Advantage state for one attack, from conditions, range and every
/// effect on both sides.
pub fn attack_advantage(
    view: &ArenaView<'_>,
    attacker: &Combatant,
    target: &Combatant,
    attack: &Attack,
    strike: &Strike<'_>,
) -> Advantage {
    let mut advantage = attacker
        .effects
        .advantage_on_attack(attacker, target, strike, view)
        || target.effects.advantage_for_attackers(target, attacker, view);
    let mut disadvantage = attacker
        .effects
        .disadvantage_on_attack(attacker, target, strike, view)
        || target
            .effects
            .disadvantage_for_attackers(target, attacker, view);

    advantage |= target
        .conditions
        .iter()
        .any(|c| c.condition.exposes_to_attacks());
    advantage |= attacker.has_condition(Condition::Invisible);
    disadvantage |= target.has_condition(Condition::Invisible);
    disadvantage |= attacker
        .conditions
        .iter()
        .any(|c| c.condition.hampers_attacks());

    if target.has_condition(Condition::Prone) {
        if strike.distance <= 1 {
            advantage = true;
        } else {
            disadvantage = true;
        }
    }

    if attack.ranged {
        // Long range, or an enemy close enough to interfere
        disadvantage |= strike.distance > attack.reach.good;
        disadvantage |= !view.adjacent_enemies(attacker.id).is_empty();
    }

    Advantage::from_sources(advantage, disadvantage)
}

/// Everything decided before any state changes.
struct Swing {
    natural: i32,
    total: i32,
    advantage: Advantage,
    hit: bool,
    critical: bool,
    critical_miss: bool,
    base_damage: i32,
    extras: Vec<ExtraDamage>,
    ending_for_attacker: Vec<String>,
    ending_for_target: Vec<String>,
}

impl Arena {
    // ========================================================================
    // Attacks
    // ========================================================================

    /// Resolve one attack of `actor` against `target`.
    pub fn resolve_attack(
        &mut self,
        actor: CombatantId,
        target: CombatantId,
        attack: &Attack,
    ) -> AttackResult {
        let swing = {
            let (view, dice) = self.split();
            let (Some(a), Some(t)) = (view.get(actor), view.get(target)) else {
                warn!(attack = %attack.name, "attacker or target is not in the arena");
                return AttackResult::aborted(AttackOutcome::NoTarget);
            };
            let (Some(from), Some(to)) = (a.position, t.position) else {
                debug!(attack = %attack.name, target = %t.name, "target is gone");
                return AttackResult::aborted(AttackOutcome::NoTarget);
            };
            if t.is_dead() || a.is_dead() {
                debug!(attack = %attack.name, target = %t.name, "target is dead");
                return AttackResult::aborted(AttackOutcome::NoTarget);
            }
            let distance = view.distance(from, to);
            if !attack.reach.contains(distance) {
                warn!(
                    attacker = %a.name,
                    target = %t.name,
                    attack = %attack.name,
                    distance,
                    "target out of range"
                );
                return AttackResult::aborted(AttackOutcome::OutOfRange);
            }

            let mut strike = Strike {
                name: &attack.name,
                damage_type: attack.damage_type,
                ranged: attack.ranged,
                spell: attack.spell,
                distance,
                advantage: Advantage::Normal,
                critical: false,
                flanked: view.is_flanked(actor, target),
            };
            strike.advantage = attack_advantage(&view, a, t, attack, &strike);

            let natural = a.roll_natural(strike.advantage, RollReason::Attack, dice);
            let bonus = attack.static_to_hit(a) + a.effects.to_hit_bonus(a, t, &strike, dice);
            let total = natural + bonus;
            let ac = t.armor_class();

            let critical_miss = natural <= 1;
            let mut critical = !critical_miss && natural >= a.critical_threshold;
            let hit = !critical_miss && (critical || total > ac);
            if hit
                && distance <= 1
                && t.conditions
                    .iter()
                    .any(|c| c.condition.melee_hits_are_critical())
            {
                critical = true;
            }
            strike.critical = critical;

            debug!(
                attacker = %a.name,
                target = %t.name,
                attack = %attack.name,
                natural,
                total,
                ac,
                advantage = ?strike.advantage,
                hit,
                critical,
                "attack roll"
            );

            let (base_damage, extras) = if hit {
                let base = roll_damage(dice, &attack.damage, critical)
                    + attack.stat_damage_bonus(a)
                    + a.effects.damage_bonus(a, t, &strike);
                let extras = a
                    .effects
                    .extra_damage_dealt(a, t, &strike)
                    .into_iter()
                    .filter(|e| !(e.once_per_turn && a.economy.is_spent(&e.label)))
                    .chain(t.effects.extra_damage_taken(t, a, &strike))
                    .collect();
                (base, extras)
            } else {
                (0, Vec::new())
            };

            Swing {
                natural,
                total,
                advantage: strike.advantage,
                hit,
                critical,
                critical_miss,
                base_damage,
                extras,
                ending_for_attacker: a.effects.ending_after_attacking(a, &strike),
                ending_for_target: t.effects.ending_after_attacked(t, &strike),
            }
        };

        let mut result = AttackResult {
            outcome: AttackOutcome::Miss,
            natural: Some(swing.natural),
            total: Some(swing.total),
            advantage: swing.advantage,
            damage: 0,
            target_dropped: false,
        };

        if !swing.hit {
            if let Some(a) = self.get_mut(actor) {
                a.record_miss(&attack.name);
            }
            result.outcome = if swing.critical_miss {
                AttackOutcome::CriticalMiss
            } else {
                AttackOutcome::Miss
            };
            self.remove_effects(actor, &swing.ending_for_attacker);
            self.remove_effects(target, &swing.ending_for_target);
            return result;
        }

        result.outcome = if swing.critical {
            AttackOutcome::CriticalHit
        } else {
            AttackOutcome::Hit
        };

        let report = self.apply_damage(
            Some(actor),
            target,
            Damage::new(swing.base_damage, attack.damage_type),
            swing.critical,
            &attack.name,
        );
        result.damage += report.dealt;
        result.target_dropped |= report.dropped || report.died;

        if let Some(on_hit) = &attack.on_hit {
            if self.get(target).is_some_and(|t| t.is_alive()) {
                result.damage += self.apply_on_hit(actor, target, on_hit, &attack.name);
            }
        }

        for extra in swing.extras {
            if !self.get(target).is_some_and(|t| !t.is_dead()) {
                break;
            }
            if extra.once_per_turn {
                let fresh = self
                    .get_mut(actor)
                    .is_some_and(|a| a.economy.mark_spent(&extra.label));
                if !fresh {
                    continue;
                }
            }
            let amount = roll_damage(self.dice(), &extra.dice, swing.critical);
            let kind = extra.kind.unwrap_or(attack.damage_type);
            let report = self.apply_damage(
                Some(actor),
                target,
                Damage::new(amount, kind),
                swing.critical,
                &extra.label,
            );
            result.damage += report.dealt;
            result.target_dropped |= report.dropped || report.died;
        }

        self.remove_effects(actor, &swing.ending_for_attacker);
        self.remove_effects(target, &swing.ending_for_target);

        if self.get(target).is_some_and(|t| t.state() == State::Ok) {
            self.trigger_reactions(target, actor);
        }
        result
    }

    /// Apply one damage instance and handle what follows from it:
    /// statistics for the source, concentration loss and death.
    pub fn apply_damage(
        &mut self,
        source: Option<CombatantId>,
        target: CombatantId,
        damage: Damage,
        critical: bool,
        name: &str,
    ) -> HitReport {
        let Some((victim, dice)) = self.with_dice(target) else {
            return HitReport::default();
        };
        let report = victim.hit(damage, source, critical, name, dice);

        if let Some(attacker) = source.and_then(|s| self.get_mut(s)) {
            attacker.record_hit(name, report.dealt, critical);
        }
        if let Some(concentration) = &report.lost_concentration {
            self.end_concentration_effects(target, concentration);
        }
        if report.died {
            self.vacate(target);
        }
        report
    }

    /// Apply an attack's rider. Returns any extra damage dealt.
    pub fn apply_on_hit(
        &mut self,
        actor: CombatantId,
        target: CombatantId,
        on_hit: &OnHit,
        source: &str,
    ) -> i32 {
        match on_hit {
            OnHit::Condition {
                condition,
                save,
                repeat_save,
            } => {
                if self.resists(target, *save) {
                    return 0;
                }
                let mut effect = ConditionEffect::new(source, *condition).caused_by(actor);
                if let (true, Some(save)) = (*repeat_save, save) {
                    effect = effect.save_ends(*save);
                }
                self.add_effect_to(target, Box::new(effect));
                0
            }
            OnHit::Effect { save, factory } => {
                if self.resists(target, *save) {
                    return 0;
                }
                let origin = EffectOrigin {
                    caster: actor,
                    source: source.to_string(),
                    save: *save,
                };
                self.add_effect_to(target, factory(&origin));
                0
            }
            OnHit::Damage {
                dice,
                damage_type,
                save,
            } => {
                let rolled = self.dice().roll(dice);
                let amount = if self.resists(target, *save) {
                    rolled / 2
                } else {
                    rolled
                };
                self.apply_damage(
                    Some(actor),
                    target,
                    Damage::new(amount, *damage_type),
                    false,
                    source,
                )
                .dealt
            }
        }
    }

    /// Whether `target` makes the save. No save means no resistance.
    fn resists(&mut self, target: CombatantId, save: Option<SaveDc>) -> bool {
        match save {
            Some(save) => self
                .saving_throw(target, save.ability, save.dc)
                .unwrap_or(true),
            None => false,
        }
    }

    /// Roll a saving throw for `target`. `None` if it is gone or dead.
    pub fn saving_throw(&mut self, target: CombatantId, ability: Ability, dc: i32) -> Option<bool> {
        let (view, dice) = self.split();
        let t = view.get(target).filter(|t| !t.is_dead())?;
        Some(t.saving_throw(ability, dc, dice).success)
    }

    fn remove_effects(&mut self, id: CombatantId, names: &[String]) {
        if names.is_empty() {
            return;
        }
        if let Some(c) = self.get_mut(id) {
            for name in names {
                c.remove_effect(name);
            }
        }
    }

    // ========================================================================
    // Effects, healing and concentration
    // ========================================================================

    pub fn add_effect_to(&mut self, target: CombatantId, effect: Box<dyn Effect>) {
        if let Some(c) = self.get_mut(target) {
            if c.is_dead() {
                return;
            }
            c.add_effect(effect);
        }
    }

    /// Returns the HP restored.
    pub fn heal(&mut self, target: CombatantId, amount: i32) -> i32 {
        self.get_mut(target).map(|c| c.heal(amount)).unwrap_or(0)
    }

    /// End whatever `caster` is concentrating on.
    pub fn end_concentration(&mut self, caster: CombatantId) {
        let concentration = self.get_mut(caster).and_then(|c| c.concentration.take());
        if let Some(concentration) = concentration {
            self.end_concentration_effects(caster, &concentration);
        }
    }

    fn end_concentration_effects(&mut self, caster: CombatantId, concentration: &Concentration) {
        info!(spell = %concentration.spell, "concentration ends");
        for target in &concentration.targets {
            if let Some(c) = self.get_mut(*target) {
                c.remove_effect_from(&concentration.effect, caster);
            }
        }
    }

    // ========================================================================
    // Spells
    // ========================================================================

    /// Cast `spell` at `target`, or at the area around it.
    pub fn cast_spell(
        &mut self,
        actor: CombatantId,
        target: CombatantId,
        spell: &Spell,
    ) -> ActionOutcome {
        let (targets, dc, origin, casting_modifier) = {
            let view = self.view();
            let (Some(caster), Some(t)) = (view.get(actor), view.get(target)) else {
                return ActionOutcome::Skipped(SkipReason::TargetGone);
            };
            let (Some(from), Some(to)) = (caster.position, t.position) else {
                return ActionOutcome::Skipped(SkipReason::TargetGone);
            };
            if t.is_dead() {
                return ActionOutcome::Skipped(SkipReason::TargetGone);
            }
            let on_caster = spell.area.is_some_and(|a| a.on_caster);
            let distance = view.distance(from, to);
            if !on_caster && !spell.reach.contains(distance) {
                warn!(caster = %caster.name, spell = %spell.name, distance, "target out of range");
                return ActionOutcome::Skipped(SkipReason::OutOfRange);
            }

            let targets: Vec<CombatantId> = match (spell.area, &spell.kind) {
                (Some(area), _) => {
                    let center = if area.on_caster { from } else { to };
                    view.creatures_within(center, area.radius, area.creature_type)
                        .into_iter()
                        .filter(|id| {
                            view.get(*id)
                                .is_some_and(|c| (c.side != caster.side) == spell.harmful())
                        })
                        .collect()
                }
                (None, SpellKind::Buff { .. }) if spell.on_self => vec![actor],
                (None, SpellKind::Buff { max_targets, .. }) => {
                    let mut chosen = vec![target];
                    for friend in std::iter::once(actor).chain(view.pick_closest_friends(actor)) {
                        if chosen.len() >= *max_targets {
                            break;
                        }
                        let in_reach = view
                            .distance_between(actor, friend)
                            .is_some_and(|d| spell.reach.contains(d));
                        if friend != target && in_reach {
                            chosen.push(friend);
                        }
                    }
                    chosen
                }
                (None, _) => vec![target],
            };

            info!(
                caster = %caster.name,
                spell = %spell.name,
                targets = targets.len(),
                "casts"
            );
            (
                targets,
                spell.save_dc(caster),
                spell.effect_origin(caster),
                caster.modifier(spell.casting_ability),
            )
        };

        if spell.concentration {
            self.end_concentration(actor);
        }

        let mut affected = Vec::new();
        let mut placed: Option<String> = None;

        match &spell.kind {
            SpellKind::Attack { .. } => {
                if let Some(attack) = spell.as_attack() {
                    for t in &targets {
                        if self.resolve_attack(actor, *t, &attack).is_hit() {
                            affected.push(*t);
                        }
                    }
                }
            }
            SpellKind::Save {
                save,
                damage,
                half_on_success,
                on_fail,
            } => {
                // One damage roll for every creature caught
                let rolled = damage
                    .as_ref()
                    .map(|(dice, kind)| (self.dice().roll(dice), *kind));
                for t in &targets {
                    let Some(success) = self.saving_throw(*t, *save, dc) else {
                        continue;
                    };
                    let mut touched = !success;
                    if let Some((amount, kind)) = rolled {
                        let amount = match (success, *half_on_success) {
                            (false, _) => amount,
                            (true, true) => amount / 2,
                            (true, false) => 0,
                        };
                        if amount > 0 {
                            let report = self.apply_damage(
                                Some(actor),
                                *t,
                                Damage::new(amount, kind),
                                false,
                                &spell.name,
                            );
                            touched |= report.dealt > 0;
                        }
                    }
                    if !success {
                        if let Some(factory) = on_fail {
                            if self.get(*t).is_some_and(|c| c.is_alive()) {
                                let effect = factory(&origin);
                                placed = Some(effect.name().to_string());
                                self.add_effect_to(*t, effect);
                            }
                        }
                    } else if damage.is_none() {
                        if let Some(caster) = self.get_mut(actor) {
                            caster.record_miss(&spell.name);
                        }
                    }
                    if touched {
                        affected.push(*t);
                    }
                }
            }
            SpellKind::Heal { dice } => {
                for t in &targets {
                    let amount = (self.dice().roll(dice) + casting_modifier).max(0);
                    let restored = self.heal(*t, amount);
                    debug!(spell = %spell.name, restored, "heal");
                    affected.push(*t);
                }
            }
            SpellKind::Buff { factory, .. } => {
                for t in &targets {
                    let effect = factory(&origin);
                    placed = Some(effect.name().to_string());
                    self.add_effect_to(*t, effect);
                    affected.push(*t);
                }
            }
        }

        if spell.concentration {
            if let Some(effect) = placed {
                let holders: Vec<CombatantId> = targets
                    .iter()
                    .copied()
                    .filter(|t| self.get(*t).is_some_and(|c| c.effects.contains(&effect)))
                    .collect();
                let caster_up = self.get(actor).is_some_and(|c| c.state() == State::Ok);
                if !holders.is_empty() && caster_up {
                    if let Some(caster) = self.get_mut(actor) {
                        caster.concentration = Some(Concentration {
                            spell: spell.name.clone(),
                            effect,
                            targets: holders,
                        });
                    }
                }
            }
        }

        ActionOutcome::Cast { affected }
    }

    // ========================================================================
    // Actions and reactions
    // ========================================================================

    /// Perform one of `actor`'s actions against `target`.
    ///
    /// The action is taken out of its list for the duration, so it can
    /// mutate itself (ammunition, uses) while the arena is borrowed.
    pub fn perform_action(
        &mut self,
        actor: CombatantId,
        slot: ActionSlot,
        target: CombatantId,
    ) -> ActionOutcome {
        let Some(c) = self.get_mut(actor) else {
            return ActionOutcome::Skipped(SkipReason::TargetGone);
        };
        let category = match slot {
            ActionSlot::Action(i) => c.actions.get(i).map(|a| a.category()),
            ActionSlot::Reaction(i) => c.reactions.get(i).map(|a| a.category()),
        };
        let Some(category) = category else {
            return ActionOutcome::Skipped(SkipReason::Unavailable);
        };
        if !c.economy.spend(category) {
            debug!(actor = %c.name, ?category, "slot already spent");
            return ActionOutcome::Skipped(SkipReason::Unavailable);
        }
        let mut action = match slot {
            ActionSlot::Action(i) => c.actions.remove(i),
            ActionSlot::Reaction(i) => c.reactions.remove(i),
        };
        debug!(actor = %c.name, action = action.name(), "performs");

        let outcome = action.perform(self, actor, target);

        if let Some(c) = self.get_mut(actor) {
            match slot {
                ActionSlot::Action(i) => c.actions.insert(i.min(c.actions.len()), action),
                ActionSlot::Reaction(i) => c.reactions.insert(i.min(c.reactions.len()), action),
            }
        }
        outcome
    }

    /// Offer `reactor` a reaction against `provoker`. The first ready
    /// reaction in range with a positive score fires.
    pub fn trigger_reactions(
        &mut self,
        reactor: CombatantId,
        provoker: CombatantId,
    ) -> Option<ActionOutcome> {
        let choice = {
            let view = self.view();
            let r = view.get(reactor)?;
            let p = view.get(provoker)?;
            if r.state() != State::Ok || !r.economy.reaction || p.is_dead() {
                return None;
            }
            let distance = view.distance_between(reactor, provoker)?;
            r.reactions.iter().position(|reaction| {
                reaction.ready(r)
                    && reaction.reach().contains(distance)
                    && reaction.score(r, p, &view) > 0.0
            })
        }?;
        info!(reactor = %reactor, "reaction");
        Some(self.perform_action(reactor, ActionSlot::Reaction(choice), provoker))
    }

    // ========================================================================
    // Turn wrappers
    // ========================================================================

    /// Start `id`'s turn and deal with anything its effects did.
    pub fn start_turn(&mut self, id: CombatantId) -> TurnStart {
        let Some((c, dice)) = self.with_dice(id) else {
            return TurnStart::default();
        };
        let start = c.start_turn(dice);
        if let Some(concentration) = &start.lost_concentration {
            self.end_concentration_effects(id, concentration);
        }
        if start.died {
            self.vacate(id);
        }
        start
    }

    /// End `id`'s turn. Returns the effects removed.
    pub fn end_turn(&mut self, id: CombatantId) -> Vec<String> {
        match self.with_dice(id) {
            Some((c, dice)) => c.end_turn(dice),
            None => Vec::new(),
        }
    }

    pub fn death_save(&mut self, id: CombatantId) -> Option<DeathSaveOutcome> {
        let (c, dice) = self.with_dice(id)?;
        let outcome = c.roll_death_save(dice);
        if outcome == Some(DeathSaveOutcome::Died) {
            self.vacate(id);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionCategory, Reach};
    use crate::combatant::CombatantBuilder;
    use crate::dice::DieType;
    use crate::testing::{dummy, ArenaHarness, ScriptedDice};
    use crate::world::{Coord, DamageType};

    fn spear() -> Attack {
        Attack::melee("Spear", DiceExpression::of(1, DieType::D8), DamageType::Piercing)
            .with_to_hit(5)
    }

    #[test]
    fn test_critical_damage_formula() {
        let mut dice = ScriptedDice::new().with_rolls([3]);
        let expr = DiceExpression::of(1, DieType::D12).plus(3);
        assert_eq!(roll_damage(&mut dice, &expr, true), 18);
    }

    #[test]
    fn test_out_of_range_consumes_no_roll() {
        let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([20]));
        let a = h.place(dummy("A", "x", 10, 10), Coord::new(0, 0));
        let b = h.place(dummy("B", "y", 10, 10), Coord::new(3, 0));
        let result = h.arena.resolve_attack(a, b, &spear());
        assert_eq!(result.outcome, AttackOutcome::OutOfRange);
        assert_eq!(result.natural, None);
    }

    #[test]
    fn test_dead_target_is_a_no_op() {
        let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([20]));
        let a = h.place(dummy("A", "x", 10, 10), Coord::new(0, 0));
        let b = h.place(dummy("B", "y", 3, 10), Coord::new(1, 0));
        h.arena
            .apply_damage(None, b, Damage::new(10, DamageType::Fire), false, "Fire");
        assert!(h.combatant(b).is_dead());
        assert_eq!(h.combatant(b).position, None);

        let result = h.arena.resolve_attack(a, b, &spear());
        assert_eq!(result.outcome, AttackOutcome::NoTarget);
        assert!(h.combatant(a).stats.is_empty());
    }

    #[test]
    fn test_stats_are_recorded_per_attack() {
        let mut h = ArenaHarness::new(
            ScriptedDice::new()
                .with_d20s([15, 2, 20])
                .with_rolls([4, 5, 6]),
        );
        let a = h.place(dummy("A", "x", 10, 10), Coord::new(0, 0));
        let b = h.place(dummy("B", "y", 50, 13), Coord::new(1, 0));
        for _ in 0..3 {
            h.arena.resolve_attack(a, b, &spear());
        }
        let stats = &h.combatant(a).stats["Spear"];
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.criticals, 1);
        // 4, then 8 + 5 on the critical
        assert_eq!(stats.damage, 17);
    }

    #[test]
    fn test_ranged_attack_with_enemy_adjacent_has_disadvantage() {
        let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([18, 3]));
        let bow = Attack::ranged(
            "Shortbow",
            DiceExpression::of(1, DieType::D6),
            DamageType::Piercing,
            Reach::feet(80, 320),
        );
        let a = h.place(dummy("A", "x", 10, 10), Coord::new(0, 0));
        let b = h.place(dummy("B", "y", 10, 10), Coord::new(1, 0));
        let result = h.arena.resolve_attack(a, b, &bow);
        assert_eq!(result.advantage, Advantage::Disadvantage);
        assert_eq!(result.natural, Some(3));
    }

    #[test]
    fn test_prone_target_is_easier_in_melee() {
        let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([4, 16]));
        let a = h.place(dummy("A", "x", 10, 10), Coord::new(0, 0));
        let b = h.place(dummy("B", "y", 10, 10), Coord::new(1, 0));
        h.combatant_mut(b).add_condition(Condition::Prone, "Shove");
        let result = h.arena.resolve_attack(a, b, &spear());
        assert_eq!(result.advantage, Advantage::Advantage);
        assert_eq!(result.natural, Some(16));
    }

    #[test]
    fn test_rider_condition_applies_on_failed_save() {
        let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([15, 2]).with_rolls([3]));
        let bite = spear().with_on_hit(OnHit::Condition {
            condition: Condition::Prone,
            save: Some(SaveDc::new(Ability::Strength, 11)),
            repeat_save: false,
        });
        let a = h.place(dummy("Wolf", "x", 10, 10), Coord::new(0, 0));
        let b = h.place(dummy("B", "y", 20, 10), Coord::new(1, 0));
        let result = h.arena.resolve_attack(a, b, &bite);
        assert!(result.is_hit());
        assert!(h.combatant(b).has_condition(Condition::Prone));
    }

    #[test]
    fn test_reaction_fires_after_being_hit() {
        let riposte = Attack::melee("Riposte", DiceExpression::of(1, DieType::D8), DamageType::Slashing)
            .with_to_hit(5)
            .with_category(ActionCategory::Reaction);
        let duelist = CombatantBuilder::new("Duelist")
            .side("y")
            .max_hp(30)
            .armor_class(10)
            .reaction(riposte)
            .build()
            .unwrap();
        let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([15, 15]).with_rolls([2, 2]));
        let a = h.place(dummy("A", "x", 30, 10), Coord::new(0, 0));
        let d = h.place(duelist, Coord::new(1, 0));

        h.arena.resolve_attack(a, d, &spear());
        assert_eq!(h.combatant(a).hit_points.current(), 28);
        assert!(!h.combatant(d).economy.reaction);
        assert_eq!(h.combatant(d).stats["Riposte"].hits, 1);
    }

    #[test]
    fn test_perform_action_spends_economy_and_returns_action() {
        let fighter = CombatantBuilder::new("Archer")
            .side("x")
            .max_hp(10)
            .action(
                Attack::ranged(
                    "Shortbow",
                    DiceExpression::of(1, DieType::D6),
                    DamageType::Piercing,
                    Reach::feet(80, 320),
                )
                .with_ammo(1),
            )
            .build()
            .unwrap();
        let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([10, 10]));
        let a = h.place(fighter, Coord::new(0, 0));
        let b = h.place(dummy("B", "y", 10, 10), Coord::new(5, 0));

        let outcome = h.arena.perform_action(a, ActionSlot::Action(0), b);
        assert!(matches!(outcome, ActionOutcome::Attack(_)));
        let archer = h.combatant(a);
        assert_eq!(archer.actions.len(), 1);
        assert_eq!(archer.actions[0].uses_left(), Some(0));
        assert!(!archer.economy.action);
        assert!(!archer.actions[0].ready(archer));
    }

    #[test]
    fn test_spent_slot_refuses_a_second_action() {
        let fighter = CombatantBuilder::new("Fighter")
            .side("x")
            .max_hp(10)
            .action(spear())
            .build()
            .unwrap();
        let mut h = ArenaHarness::new(ScriptedDice::new().with_d20s([2, 20]).with_rolls([4]));
        let a = h.place(fighter, Coord::new(0, 0));
        let b = h.place(dummy("B", "y", 10, 10), Coord::new(1, 0));

        let first = h.arena.perform_action(a, ActionSlot::Action(0), b);
        assert!(matches!(first, ActionOutcome::Attack(_)));
        let second = h.arena.perform_action(a, ActionSlot::Action(0), b);
        assert_eq!(second, ActionOutcome::Skipped(SkipReason::Unavailable));
        // The natural 20 was never thrown
        assert_eq!(h.combatant(b).hit_points.current(), 10);
        assert_eq!(h.combatant(a).stats["Spear"].attempts(), 1);
        assert_eq!(h.combatant(a).actions.len(), 1);
    }

    #[test]
    fn test_out_of_range_keeps_ammo_and_uses() {
        let archer = CombatantBuilder::new("Archer")
            .side("x")
            .max_hp(10)
            .action(
                Attack::ranged(
                    "Shortbow",
                    DiceExpression::of(1, DieType::D6),
                    DamageType::Piercing,
                    Reach::feet(20, 40),
                )
                .with_ammo(12),
            )
            .action(
                Spell::new(
                    "Rage",
                    Ability::Strength,
                    Reach { good: 1, max: 1 },
                    SpellKind::Buff {
                        factory: crate::catalog::effects::rage,
                        max_targets: 1,
                    },
                )
                .with_category(ActionCategory::BonusAction)
                .with_uses(1),
            )
            .build()
            .unwrap();
        let mut h = ArenaHarness::sized(20, 3, ScriptedDice::new());
        let a = h.place(archer, Coord::new(0, 0));
        let foe = h.place(dummy("Foe", "y", 10, 10), Coord::new(15, 0));
        let friend = h.place(dummy("Friend", "x", 10, 10), Coord::new(15, 2));

        let shot = h.arena.perform_action(a, ActionSlot::Action(0), foe);
        let ActionOutcome::Attack(result) = shot else {
            panic!("expected an attack, got {shot:?}");
        };
        assert_eq!(result.outcome, AttackOutcome::OutOfRange);
        assert!(!result.was_rolled());
        assert_eq!(h.combatant(a).actions[0].uses_left(), Some(12));

        let cast = h.arena.perform_action(a, ActionSlot::Action(1), friend);
        assert_eq!(cast, ActionOutcome::Skipped(SkipReason::OutOfRange));
        assert_eq!(h.combatant(a).actions[1].uses_left(), Some(1));
    }

    #[test]
    fn test_once_per_turn_damage_returns_after_reset() {
        let rogue = CombatantBuilder::new("Rogue")
            .side("x")
            .max_hp(10)
            .effect(crate::catalog::effects::SneakAttack::new(1))
            .build()
            .unwrap();
        // Advantage on the prone target: two d20s per swing
        let mut h = ArenaHarness::new(
            ScriptedDice::new()
                .with_d20s([15, 15, 15, 15, 15, 15])
                .with_rolls([3, 4, 3, 3, 4]),
        );
        let r = h.place(rogue, Coord::new(0, 0));
        let t = h.place(dummy("T", "y", 50, 10), Coord::new(1, 0));
        h.combatant_mut(t).add_condition(Condition::Prone, "Shove");

        h.arena.resolve_attack(r, t, &spear());
        assert_eq!(h.combatant(t).hit_points.current(), 43);
        assert!(h.combatant(r).economy.is_spent("Sneak Attack"));

        h.arena.resolve_attack(r, t, &spear());
        assert_eq!(h.combatant(t).hit_points.current(), 40);

        // Someone else's turn begins
        h.arena.reset_once_per_turn();
        h.arena.resolve_attack(r, t, &spear());
        assert_eq!(h.combatant(t).hit_points.current(), 33);
    }
}
