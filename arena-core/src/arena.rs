//! The spatial grid and the combatant roster.
//!
//! The [`Arena`] owns every registered combatant, the occupancy map and the
//! dice. Read-only queries live on [`ArenaView`], a cheap borrowed snapshot
//! that can be handed to effect hooks and tactics while the dice stay
//! mutably available (see [`Arena::split`]).
//!
//! Distances are the floor of the Euclidean distance in cells, so the eight
//! surrounding cells are all at range 1.

use crate::combatant::Combatant;
use crate::dice::DiceRoller;
use crate::world::{CombatantId, Coord, CreatureType, Side};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for arena registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("Cell {0} is outside the grid")]
    OutOfBounds(Coord),
    #[error("Cell {0} is already occupied")]
    Occupied(Coord),
    #[error("No free cell left on the grid")]
    NoFreeCell,
}

/// Neighbour order used everywhere a deterministic scan is needed.
const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Heuristic values are compared as fixed-point integers.
const SCALE: f64 = 1000.0;

/// A* node for the priority queue
#[derive(Clone, Copy, Eq, PartialEq)]
struct Node {
    cell: Coord,
    g_cost: i64,
    f_cost: i64,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| self.g_cost.cmp(&other.g_cost))
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of an approach move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub to: Coord,
    pub steps: i32,
}

// ============================================================================
// Read-only view
// ============================================================================

/// Borrowed, read-only view of the grid and roster.
#[derive(Clone, Copy)]
pub struct ArenaView<'a> {
    width: i32,
    height: i32,
    cells: &'a [Option<CombatantId>],
    roster: &'a [Combatant],
}

impl<'a> ArenaView<'a> {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn roster(&self) -> &'a [Combatant] {
        self.roster
    }

    pub fn get(&self, id: CombatantId) -> Option<&'a Combatant> {
        let roster = self.roster;
        roster.iter().find(|c| c.id == id)
    }

    /// Panics on an unknown id.
    pub fn combatant(&self, id: CombatantId) -> &'a Combatant {
        match self.get(id) {
            Some(c) => c,
            None => panic!("no combatant with id {id} in this arena"),
        }
    }

    pub fn in_bounds(&self, cell: Coord) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    fn index(&self, cell: Coord) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    pub fn occupant(&self, cell: Coord) -> Option<CombatantId> {
        if self.in_bounds(cell) {
            self.cells[self.index(cell)]
        } else {
            None
        }
    }

    pub fn is_free(&self, cell: Coord) -> bool {
        self.in_bounds(cell) && self.cells[self.index(cell)].is_none()
    }

    pub fn distance(&self, a: Coord, b: Coord) -> i32 {
        a.distance(b)
    }

    /// Distance between two combatants, `None` if either is off the grid.
    pub fn distance_between(&self, a: CombatantId, b: CombatantId) -> Option<i32> {
        let pa = self.get(a)?.position?;
        let pb = self.get(b)?.position?;
        Some(pa.distance(pb))
    }

    /// The up-to-8 free cells around `cell`.
    ///
    /// Panics when `cell` itself is outside the grid.
    pub fn neighbors(&self, cell: Coord) -> Vec<Coord> {
        assert!(
            self.in_bounds(cell),
            "neighbors of {cell} requested on a {}x{} grid",
            self.width,
            self.height
        );
        DIRECTIONS
            .iter()
            .map(|&(dx, dy)| cell.offset(dx, dy))
            .filter(|&c| self.is_free(c))
            .collect()
    }

    /// Shortest path from `from` to the free cell `to`, excluding `from`.
    ///
    /// Every step costs 1, diagonals included; the heuristic is the straight
    /// Euclidean distance. That heuristic can overestimate on this grid, so
    /// the path found is occasionally one step longer than the best.
    pub fn find_path(&self, from: Coord, to: Coord) -> Option<Vec<Coord>> {
        if from == to {
            return Some(Vec::new());
        }
        if !self.is_free(to) {
            return None;
        }

        let heuristic = |c: Coord| (c.euclidean(to) * SCALE).round() as i64;
        let mut open = BinaryHeap::new();
        let mut g_scores: HashMap<Coord, i64> = HashMap::new();
        let mut came_from: HashMap<Coord, Coord> = HashMap::new();
        let mut closed: Vec<bool> = vec![false; self.cells.len()];

        g_scores.insert(from, 0);
        open.push(Node {
            cell: from,
            g_cost: 0,
            f_cost: heuristic(from),
        });

        while let Some(current) = open.pop() {
            if current.cell == to {
                return Some(reconstruct_path(&came_from, to));
            }
            let i = self.index(current.cell);
            if closed[i] {
                continue;
            }
            closed[i] = true;

            for next in self.neighbors(current.cell) {
                let g = current.g_cost + SCALE as i64;
                if g < *g_scores.get(&next).unwrap_or(&i64::MAX) {
                    g_scores.insert(next, g);
                    came_from.insert(next, current.cell);
                    open.push(Node {
                        cell: next,
                        g_cost: g,
                        f_cost: g + heuristic(next),
                    });
                }
            }
        }
        None
    }

    /// Living combatants, in roster order.
    pub fn living(&self) -> impl Iterator<Item = &'a Combatant> + 'a {
        let roster = self.roster;
        roster.iter().filter(|c| c.is_alive())
    }

    fn sorted_by_distance<F>(&self, id: CombatantId, keep: F) -> Vec<CombatantId>
    where
        F: Fn(&Combatant, &Combatant) -> bool,
    {
        let Some(me) = self.get(id) else {
            return Vec::new();
        };
        let Some(origin) = me.position else {
            return Vec::new();
        };
        let mut found: Vec<(i32, CombatantId)> = self
            .living()
            .filter(|c| c.id != id && keep(me, c))
            .filter_map(|c| c.position.map(|p| (origin.distance(p), c.id)))
            .collect();
        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Living enemies, nearest first; ties by id.
    pub fn pick_closest_enemy(&self, id: CombatantId) -> Vec<CombatantId> {
        self.sorted_by_distance(id, |me, other| other.side != me.side)
    }

    /// Living allies other than `id`, nearest first; ties by id.
    pub fn pick_closest_friends(&self, id: CombatantId) -> Vec<CombatantId> {
        self.sorted_by_distance(id, |me, other| other.side == me.side)
    }

    /// Living creatures within `radius` cells of `center`, optionally of one
    /// creature type. Nearest first; ties by id.
    pub fn creatures_within(
        &self,
        center: Coord,
        radius: i32,
        creature_type: Option<CreatureType>,
    ) -> Vec<CombatantId> {
        let mut found: Vec<(i32, CombatantId)> = self
            .living()
            .filter(|c| creature_type.map_or(true, |t| c.creature_type == t))
            .filter_map(|c| c.position.map(|p| (center.distance(p), c.id)))
            .filter(|(d, _)| *d <= radius)
            .collect();
        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Living enemies of `id` standing next to it.
    pub fn adjacent_enemies(&self, id: CombatantId) -> Vec<CombatantId> {
        let Some(me) = self.get(id) else {
            return Vec::new();
        };
        self.pick_closest_enemy(id)
            .into_iter()
            .take_while(|e| {
                self.distance_between(me.id, *e)
                    .is_some_and(|d| d <= 1)
            })
            .collect()
    }

    /// Some other living ally of `attacker` is adjacent to `target`.
    pub fn is_flanked(&self, attacker: CombatantId, target: CombatantId) -> bool {
        let (Some(a), Some(t)) = (self.get(attacker), self.get(target)) else {
            return false;
        };
        let Some(tp) = t.position else {
            return false;
        };
        self.living().any(|c| {
            c.id != attacker
                && c.side == a.side
                && c.position.is_some_and(|p| p.distance(tp) <= 1)
        })
    }

    /// Living members per side. Sides with nobody left standing map to 0.
    pub fn remaining_participants(&self) -> BTreeMap<Side, usize> {
        let mut sides = BTreeMap::new();
        for c in self.roster {
            let count = sides.entry(c.side.clone()).or_insert(0);
            if c.is_alive() {
                *count += 1;
            }
        }
        sides
    }

    /// True while at least two sides have a living member.
    pub fn still_going(&self) -> bool {
        self.remaining_participants()
            .values()
            .filter(|n| **n > 0)
            .count()
            >= 2
    }

    /// The only side left standing, if exactly one is.
    pub fn try_winning_side(&self) -> Option<Side> {
        let mut standing = self
            .remaining_participants()
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(side, _)| side);
        match (standing.next(), standing.next()) {
            (Some(side), None) => Some(side),
            _ => None,
        }
    }

    /// Panics unless exactly one side remains.
    pub fn winning_side(&self) -> Side {
        match self.try_winning_side() {
            Some(side) => side,
            None => panic!(
                "winning_side called while {} sides are standing",
                self.remaining_participants()
                    .values()
                    .filter(|n| **n > 0)
                    .count()
            ),
        }
    }
}

/// Reconstruct path from came_from map
fn reconstruct_path(came_from: &HashMap<Coord, Coord>, end: Coord) -> Vec<Coord> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(prev) = came_from.get(&current) {
        path.push(*prev);
        current = *prev;
    }
    // Drop the start cell
    path.pop();
    path.reverse();
    path
}

// ============================================================================
// Arena
// ============================================================================

/// The grid, its occupants and the dice.
pub struct Arena {
    width: i32,
    height: i32,
    cells: Vec<Option<CombatantId>>,
    roster: Vec<Combatant>,
    dice: Box<dyn DiceRoller>,
}

impl Arena {
    /// An empty `width` x `height` grid.
    pub fn new(width: i32, height: i32, dice: Box<dyn DiceRoller>) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![None; (width * height) as usize],
            roster: Vec::new(),
            dice,
        }
    }

    pub fn view(&self) -> ArenaView<'_> {
        ArenaView {
            width: self.width,
            height: self.height,
            cells: &self.cells,
            roster: &self.roster,
        }
    }

    /// The read-only view alongside the dice.
    pub fn split(&mut self) -> (ArenaView<'_>, &mut dyn DiceRoller) {
        (
            ArenaView {
                width: self.width,
                height: self.height,
                cells: &self.cells,
                roster: &self.roster,
            },
            self.dice.as_mut(),
        )
    }

    pub fn dice(&mut self) -> &mut dyn DiceRoller {
        self.dice.as_mut()
    }

    pub fn set_dice(&mut self, dice: Box<dyn DiceRoller>) {
        self.dice = dice;
    }

    pub fn roster(&self) -> &[Combatant] {
        &self.roster
    }

    pub fn ids(&self) -> Vec<CombatantId> {
        self.roster.iter().map(|c| c.id).collect()
    }

    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.roster.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.roster.iter_mut().find(|c| c.id == id)
    }

    /// A new turn began, whoever's it is: once-per-turn features (sneak
    /// attack on a reaction, say) are available again to everyone.
    pub fn reset_once_per_turn(&mut self) {
        for c in &mut self.roster {
            c.economy.clear_spent();
        }
    }

    /// Panics on an unknown id.
    pub fn combatant(&self, id: CombatantId) -> &Combatant {
        self.view().combatant(id)
    }

    /// Panics on an unknown id.
    pub fn combatant_mut(&mut self, id: CombatantId) -> &mut Combatant {
        match self.get_mut(id) {
            Some(c) => c,
            None => panic!("no combatant with id {id} in this arena"),
        }
    }

    pub(crate) fn index_of(&self, id: CombatantId) -> Option<usize> {
        self.roster.iter().position(|c| c.id == id)
    }

    /// One combatant mutably and the dice.
    pub(crate) fn with_dice(&mut self, id: CombatantId) -> Option<(&mut Combatant, &mut dyn DiceRoller)> {
        let index = self.index_of(id)?;
        Some((&mut self.roster[index], self.dice.as_mut()))
    }

    /// Two distinct combatants mutably at once.
    pub fn pair_mut(
        &mut self,
        a: CombatantId,
        b: CombatantId,
    ) -> Option<(&mut Combatant, &mut Combatant)> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        match ia.cmp(&ib) {
            Ordering::Less => {
                let (left, right) = self.roster.split_at_mut(ib);
                Some((&mut left[ia], &mut right[0]))
            }
            Ordering::Greater => {
                let (left, right) = self.roster.split_at_mut(ia);
                Some((&mut right[0], &mut left[ib]))
            }
            Ordering::Equal => None,
        }
    }

    fn cell_index(&self, cell: Coord) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    /// Register a combatant on `at`, or on a random free cell.
    pub fn add_combatant(
        &mut self,
        mut combatant: Combatant,
        at: Option<Coord>,
    ) -> Result<CombatantId, ArenaError> {
        let cell = match at {
            Some(cell) => {
                if !self.view().in_bounds(cell) {
                    return Err(ArenaError::OutOfBounds(cell));
                }
                if !self.view().is_free(cell) {
                    return Err(ArenaError::Occupied(cell));
                }
                cell
            }
            None => {
                let free = self.free_cells();
                if free.is_empty() {
                    return Err(ArenaError::NoFreeCell);
                }
                free[self.dice.choose(free.len())]
            }
        };

        let id = CombatantId::derive(self.roster.len(), &combatant.name);
        combatant.id = id;
        combatant.position = Some(cell);
        let index = self.cell_index(cell);
        self.cells[index] = Some(id);
        debug!(combatant = %combatant.name, side = %combatant.side, %cell, "registered");
        self.roster.push(combatant);
        Ok(id)
    }

    /// Free cells in row-major order.
    pub fn free_cells(&self) -> Vec<Coord> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Coord::new(x, y)))
            .filter(|c| self.view().is_free(*c))
            .collect()
    }

    /// Move a combatant to a free cell.
    pub fn relocate(&mut self, id: CombatantId, to: Coord) -> Result<(), ArenaError> {
        let view = self.view();
        if !view.in_bounds(to) {
            return Err(ArenaError::OutOfBounds(to));
        }
        if view.occupant(to).is_some_and(|o| o != id) {
            return Err(ArenaError::Occupied(to));
        }
        let from = self.get(id).and_then(|c| c.position);
        if let Some(from) = from {
            let index = self.cell_index(from);
            self.cells[index] = None;
        }
        let index = self.cell_index(to);
        self.cells[index] = Some(id);
        if let Some(c) = self.get_mut(id) {
            c.position = Some(to);
        }
        Ok(())
    }

    /// Take a combatant off the grid. It stays in the roster.
    pub fn vacate(&mut self, id: CombatantId) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        if let Some(cell) = self.roster[index].position.take() {
            let ci = self.cell_index(cell);
            if self.cells[ci] == Some(id) {
                self.cells[ci] = None;
            }
        }
    }

    pub fn distance(&self, a: Coord, b: Coord) -> i32 {
        a.distance(b)
    }

    pub fn neighbors(&self, cell: Coord) -> Vec<Coord> {
        self.view().neighbors(cell)
    }

    pub fn find_path(&self, from: Coord, to: Coord) -> Option<Vec<Coord>> {
        self.view().find_path(from, to)
    }

    /// Walk toward `target` until within `stop_within` cells of it, using at
    /// most `max_steps` steps.
    ///
    /// The route is the shortest A* path to any free cell adjacent to the
    /// target; ties go to the first candidate in neighbour order. When no
    /// route exists the combatant stays put.
    pub fn approach(
        &mut self,
        id: CombatantId,
        target: Coord,
        max_steps: i32,
        stop_within: i32,
    ) -> Movement {
        let Some(from) = self.get(id).and_then(|c| c.position) else {
            return Movement {
                to: target,
                steps: 0,
            };
        };
        let stay = Movement { to: from, steps: 0 };
        if from.distance(target) <= stop_within.max(1) || max_steps <= 0 {
            return stay;
        }

        let view = self.view();
        let mut best: Option<Vec<Coord>> = None;
        if view.in_bounds(target) {
            for candidate in view.neighbors(target) {
                if let Some(path) = view.find_path(from, candidate) {
                    if best.as_ref().map_or(true, |b| path.len() < b.len()) {
                        best = Some(path);
                    }
                }
            }
        }

        let Some(path) = best else {
            let name = self.get(id).map(|c| c.name.clone()).unwrap_or_default();
            warn!(combatant = %name, %from, %target, "no path to target");
            return stay;
        };

        let mut to = from;
        let mut steps = 0;
        for cell in path.into_iter().take(max_steps as usize) {
            to = cell;
            steps += 1;
            if cell.distance(target) <= stop_within.max(1) {
                break;
            }
        }
        if self.relocate(id, to).is_err() {
            return stay;
        }
        debug!(%from, %to, steps, "moved");
        Movement { to, steps }
    }

    /// Move toward `target`; returns the new position.
    pub fn move_towards(
        &mut self,
        id: CombatantId,
        target: Coord,
        max_steps: i32,
        stop_within: i32,
    ) -> Coord {
        self.approach(id, target, max_steps, stop_within).to
    }

    /// Step to the free neighbouring cell farthest from `threat`.
    ///
    /// Ties between equally far neighbours go to the lowest (x, y). Stays
    /// put, returning the current cell, when no free neighbour is strictly
    /// farther than where the mover already stands.
    pub fn move_away(&mut self, id: CombatantId, threat: Coord) -> Coord {
        let Some(from) = self.get(id).and_then(|c| c.position) else {
            return threat;
        };
        let mut options = self.neighbors(from);
        options.sort();
        let mut best = from;
        let mut best_distance = from.euclidean(threat);
        for cell in options {
            let d = cell.euclidean(threat);
            if d > best_distance {
                best = cell;
                best_distance = d;
            }
        }
        if best != from && self.relocate(id, best).is_ok() {
            debug!(%from, to = %best, "stepped away");
        }
        best
    }

    pub fn pick_closest_enemy(&self, id: CombatantId) -> Vec<CombatantId> {
        self.view().pick_closest_enemy(id)
    }

    pub fn pick_closest_friends(&self, id: CombatantId) -> Vec<CombatantId> {
        self.view().pick_closest_friends(id)
    }

    pub fn creatures_within(
        &self,
        center: Coord,
        radius: i32,
        creature_type: Option<CreatureType>,
    ) -> Vec<CombatantId> {
        self.view().creatures_within(center, radius, creature_type)
    }

    pub fn remaining_participants(&self) -> BTreeMap<Side, usize> {
        self.view().remaining_participants()
    }

    pub fn still_going(&self) -> bool {
        self.view().still_going()
    }

    pub fn try_winning_side(&self) -> Option<Side> {
        self.view().try_winning_side()
    }

    /// Panics unless exactly one side remains.
    pub fn winning_side(&self) -> Side {
        self.view().winning_side()
    }
}
