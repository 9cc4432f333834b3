//! Grid pathfinding
//!
//! [`NavGrid`] is built once from the static obstacle list: each obstacle is
//! inflated by the entity radius and every cell whose center falls inside it
//! is marked blocked. Searches are A* over 8 directions with an octile
//! heuristic, a hard expansion cap and no corner-cutting. Found paths are
//! smoothed by greedily skipping waypoints that remain in line of sight.
//!
//! Node bookkeeping lives in a scratch arena indexed by cell, reused across
//! searches and reset lazily with a generation stamp.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::Mutex;
use rand::Rng;
use tracing::trace;

use crate::config::PathfindingConfig;
use crate::game::geometry::{Rect, Vec2};

/// Cost of an orthogonal step
const STRAIGHT_COST: u32 = 10;
/// Cost of a diagonal step (10 * sqrt 2, rounded)
const DIAGONAL_COST: u32 = 14;

const NO_PARENT: u32 = u32::MAX;

const NEIGHBOURS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Grid cell coordinate
pub type Cell = (i32, i32);

#[derive(Debug, Clone, Copy)]
struct Node {
    g: u32,
    parent: u32,
    generation: u32,
    closed: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            g: u32::MAX,
            parent: NO_PARENT,
            generation: 0,
            closed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    f: u32,
    h: u32,
    index: u32,
}

impl Ord for OpenEntry {
    // BinaryHeap is a max-heap; invert so the lowest f (then h, then index) pops first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reusable per-search buffers
#[derive(Debug)]
struct SearchScratch {
    nodes: Vec<Node>,
    generation: u32,
    open: BinaryHeap<OpenEntry>,
}

impl SearchScratch {
    fn new(cells: usize) -> Self {
        Self {
            nodes: vec![Node::default(); cells],
            generation: 0,
            open: BinaryHeap::new(),
        }
    }

    /// Start a new search; stale nodes are recognised by their generation
    fn begin(&mut self) {
        self.open.clear();
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.nodes.iter_mut().for_each(|n| *n = Node::default());
            self.generation = 1;
        }
    }

    fn node(&mut self, index: usize) -> &mut Node {
        let generation = self.generation;
        let node = &mut self.nodes[index];
        if node.generation != generation {
            *node = Node {
                generation,
                ..Node::default()
            };
        }
        node
    }
}

/// Static walkability grid with A* search
#[derive(Debug)]
pub struct NavGrid {
    cell_size: f32,
    cols: i32,
    rows: i32,
    width: f32,
    height: f32,
    walkable: Vec<bool>,
    max_iterations: usize,
    snap_max_rings: i32,
    scratch: Mutex<SearchScratch>,
}

impl NavGrid {
    /// Build the grid for a `width` x `height` world
    pub fn new(width: f32, height: f32, obstacles: &[Rect], config: &PathfindingConfig) -> Self {
        let cell_size = config.cell_size.max(1.0);
        let cols = ((width / cell_size).ceil() as i32).max(1);
        let rows = ((height / cell_size).ceil() as i32).max(1);
        let inflated: Vec<Rect> = obstacles
            .iter()
            .map(|r| r.inflated(config.entity_radius))
            .collect();

        let mut walkable = vec![true; (cols * rows) as usize];
        for cy in 0..rows {
            for cx in 0..cols {
                let center = Vec2::new(
                    (cx as f32 + 0.5) * cell_size,
                    (cy as f32 + 0.5) * cell_size,
                );
                if inflated.iter().any(|r| r.contains(center)) {
                    walkable[(cy * cols + cx) as usize] = false;
                }
            }
        }

        let blocked = walkable.iter().filter(|w| !**w).count();
        tracing::info!(
            cols = cols,
            rows = rows,
            cell_size = cell_size,
            blocked_cells = blocked,
            "Navigation grid built"
        );

        Self {
            cell_size,
            cols,
            rows,
            width,
            height,
            walkable,
            max_iterations: config.max_iterations,
            snap_max_rings: config.snap_max_rings,
            scratch: Mutex::new(SearchScratch::new((cols * rows) as usize)),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing a world point, clamped into the grid
    pub fn world_to_grid(&self, point: Vec2) -> Cell {
        let cx = (point.x / self.cell_size).floor() as i32;
        let cy = (point.y / self.cell_size).floor() as i32;
        (cx.clamp(0, self.cols - 1), cy.clamp(0, self.rows - 1))
    }

    /// World coordinate of a cell center
    pub fn grid_to_world(&self, cell: Cell) -> Vec2 {
        Vec2::new(
            (cell.0 as f32 + 0.5) * self.cell_size,
            (cell.1 as f32 + 0.5) * self.cell_size,
        )
    }

    fn index(&self, cell: Cell) -> usize {
        (cell.1 * self.cols + cell.0) as usize
    }

    fn cell_of(&self, index: usize) -> Cell {
        let index = index as i32;
        (index % self.cols, index / self.cols)
    }

    pub fn is_cell_walkable(&self, cell: Cell) -> bool {
        cell.0 >= 0
            && cell.1 >= 0
            && cell.0 < self.cols
            && cell.1 < self.rows
            && self.walkable[self.index(cell)]
    }

    /// Whether a world point lies inside the world on a walkable cell
    pub fn is_walkable(&self, x: f32, y: f32) -> bool {
        if !(x.is_finite() && y.is_finite()) {
            return false;
        }
        if x < 0.0 || y < 0.0 || x > self.width || y > self.height {
            return false;
        }
        self.is_cell_walkable(self.world_to_grid(Vec2::new(x, y)))
    }

    /// Nearest walkable cell found by expanding rings around `cell`
    pub fn snap_to_walkable(&self, cell: Cell) -> Option<Cell> {
        if self.is_cell_walkable(cell) {
            return Some(cell);
        }

        for ring in 1..=self.snap_max_rings {
            let mut best: Option<(i32, Cell)> = None;
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let candidate = (cell.0 + dx, cell.1 + dy);
                    if !self.is_cell_walkable(candidate) {
                        continue;
                    }
                    let dist = dx * dx + dy * dy;
                    if best.map_or(true, |(d, _)| dist < d) {
                        best = Some((dist, candidate));
                    }
                }
            }
            if let Some((_, found)) = best {
                return Some(found);
            }
        }
        None
    }

    /// Octile distance in step-cost units
    fn heuristic(a: Cell, b: Cell) -> u32 {
        let dx = (a.0 - b.0).unsigned_abs();
        let dy = (a.1 - b.1).unsigned_abs();
        let (min, max) = if dx < dy { (dx, dy) } else { (dy, dx) };
        DIAGONAL_COST * min + STRAIGHT_COST * (max - min)
    }

    /// A* over cells. `None` when unreachable or the expansion cap is hit.
    pub fn find_cell_path(&self, start: Cell, goal: Cell) -> Option<Vec<Cell>> {
        if !self.is_cell_walkable(start) || !self.is_cell_walkable(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let mut scratch = self.scratch.lock();
        scratch.begin();

        let start_index = self.index(start);
        let goal_index = self.index(goal);
        scratch.node(start_index).g = 0;
        let h = Self::heuristic(start, goal);
        scratch.open.push(OpenEntry {
            f: h,
            h,
            index: start_index as u32,
        });

        let mut iterations = 0usize;
        while let Some(entry) = scratch.open.pop() {
            let current_index = entry.index as usize;
            let current = scratch.node(current_index);
            if current.closed {
                continue;
            }
            current.closed = true;
            let current_g = current.g;

            if current_index == goal_index {
                return Some(self.reconstruct(&mut scratch, goal_index));
            }

            iterations += 1;
            if iterations > self.max_iterations {
                trace!(iterations = iterations, "A* expansion cap reached");
                return None;
            }

            let cell = self.cell_of(current_index);
            for (dx, dy) in NEIGHBOURS {
                let next = (cell.0 + dx, cell.1 + dy);
                if !self.is_cell_walkable(next) {
                    continue;
                }
                let diagonal = dx != 0 && dy != 0;
                if diagonal
                    && (!self.is_cell_walkable((cell.0 + dx, cell.1))
                        || !self.is_cell_walkable((cell.0, cell.1 + dy)))
                {
                    continue;
                }

                let step = if diagonal { DIAGONAL_COST } else { STRAIGHT_COST };
                let tentative = current_g + step;
                let next_index = self.index(next);
                let node = scratch.node(next_index);
                if node.closed || tentative >= node.g {
                    continue;
                }
                node.g = tentative;
                node.parent = current_index as u32;

                let h = Self::heuristic(next, goal);
                scratch.open.push(OpenEntry {
                    f: tentative + h,
                    h,
                    index: next_index as u32,
                });
            }
        }

        None
    }

    fn reconstruct(&self, scratch: &mut SearchScratch, goal_index: usize) -> Vec<Cell> {
        let mut cells = Vec::new();
        let mut index = goal_index as u32;
        while index != NO_PARENT {
            cells.push(self.cell_of(index as usize));
            index = scratch.node(index as usize).parent;
        }
        cells.reverse();
        cells
    }

    /// Find a smoothed world-space path from `start` to `end`.
    ///
    /// The first waypoint is the start position and the last is the exact
    /// destination when it is walkable (otherwise the snapped cell center).
    /// Returns an empty list when no path exists.
    pub fn find_path(&self, start: Vec2, end: Vec2) -> Vec<Vec2> {
        let start_cell = match self.snap_to_walkable(self.world_to_grid(start)) {
            Some(cell) => cell,
            None => return Vec::new(),
        };
        let end_cell = match self.snap_to_walkable(self.world_to_grid(end)) {
            Some(cell) => cell,
            None => return Vec::new(),
        };

        let cells = match self.find_cell_path(start_cell, end_cell) {
            Some(cells) => cells,
            None => return Vec::new(),
        };

        let mut waypoints: Vec<Vec2> = cells.iter().map(|c| self.grid_to_world(*c)).collect();
        if self.is_walkable(start.x, start.y) {
            waypoints[0] = start;
        }
        let final_point = if self.is_walkable(end.x, end.y) {
            end
        } else {
            self.grid_to_world(end_cell)
        };
        if waypoints.len() == 1 {
            waypoints.push(final_point);
        } else if let Some(last) = waypoints.last_mut() {
            *last = final_point;
        }

        self.smooth(&waypoints)
    }

    /// Whether every half-cell sample along the segment is walkable
    pub fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        let distance = from.distance(to);
        let step = self.cell_size * 0.5;
        let samples = (distance / step).ceil() as i32;
        if samples == 0 {
            return self.is_walkable(to.x, to.y);
        }
        (0..=samples).all(|i| {
            let t = i as f32 / samples as f32;
            let point = from + (to - from) * t;
            self.is_walkable(point.x, point.y)
        })
    }

    /// Greedily drop waypoints that are visible from an earlier one
    fn smooth(&self, waypoints: &[Vec2]) -> Vec<Vec2> {
        if waypoints.len() <= 2 {
            return waypoints.to_vec();
        }

        let mut smoothed = vec![waypoints[0]];
        let mut anchor = 0;
        while anchor < waypoints.len() - 1 {
            let mut next = anchor + 1;
            for candidate in (anchor + 2..waypoints.len()).rev() {
                if self.line_of_sight(waypoints[anchor], waypoints[candidate]) {
                    next = candidate;
                    break;
                }
            }
            smoothed.push(waypoints[next]);
            anchor = next;
        }
        smoothed
    }

    /// A random walkable point, if one turns up within `attempts` samples
    pub fn random_walkable_point<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        attempts: u32,
    ) -> Option<Vec2> {
        (0..attempts).find_map(|_| {
            let cell = (rng.gen_range(0..self.cols), rng.gen_range(0..self.rows));
            self.is_cell_walkable(cell).then(|| self.grid_to_world(cell))
        })
    }
}
