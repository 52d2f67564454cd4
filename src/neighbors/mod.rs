//! Candidate-pair search over a periodic uniform box grid.
//!
//! The torus is tiled by boxes at least as wide as the interaction
//! distance, so any two nodes within range share a box or sit in adjacent
//! boxes. Scanning each box against itself and a half-only selection of
//! its neighbours yields each unordered pair exactly once.

use std::collections::BTreeSet;

use glam::DVec2;

use crate::error::{Result, SimulationError};
use crate::mesh::Node;

pub struct BoxCollection {
    box_width_x: f64,
    box_width_y: f64,
    num_boxes_x: usize,
    num_boxes_y: usize,
}

impl BoxCollection {
    /// Tile the unit torus with boxes of side at least
    /// `interaction_distance`.
    pub fn new(interaction_distance: f64) -> Result<Self> {
        if interaction_distance <= 0.0 || !interaction_distance.is_finite() {
            return Err(SimulationError::Config(format!(
                "interaction distance must be positive, got {interaction_distance}"
            )));
        }
        let num_boxes = ((1.0 / interaction_distance).floor() as usize).max(1);
        Ok(Self {
            box_width_x: 1.0 / num_boxes as f64,
            box_width_y: 1.0 / num_boxes as f64,
            num_boxes_x: num_boxes,
            num_boxes_y: num_boxes,
        })
    }

    pub fn num_boxes(&self) -> usize {
        self.num_boxes_x * self.num_boxes_y
    }

    fn box_coords(&self, location: DVec2) -> (usize, usize) {
        let bx = ((location.x / self.box_width_x) as usize).min(self.num_boxes_x - 1);
        let by = ((location.y / self.box_width_y) as usize).min(self.num_boxes_y - 1);
        (bx, by)
    }

    fn box_index(&self, bx: usize, by: usize) -> usize {
        by * self.num_boxes_x + bx
    }

    /// Half-only adjacent boxes of `(bx, by)`: east, north-east, north and
    /// north-west, with periodic wrap. Scanning only this half avoids
    /// producing each cross-box pair twice.
    fn half_neighbours(&self, bx: usize, by: usize) -> [usize; 4] {
        let east = (bx + 1) % self.num_boxes_x;
        let west = (bx + self.num_boxes_x - 1) % self.num_boxes_x;
        let north = (by + 1) % self.num_boxes_y;
        [
            self.box_index(east, by),
            self.box_index(east, north),
            self.box_index(bx, north),
            self.box_index(west, north),
        ]
    }

    /// Compute candidate node pairs and per-node neighbour sets.
    ///
    /// Pairs are returned ordered `(a, b)` with `a < b`, each at most once.
    pub fn calculate_node_pairs(
        &self,
        nodes: &[Node],
    ) -> (Vec<(usize, usize)>, Vec<BTreeSet<usize>>) {
        let mut occupants: Vec<Vec<usize>> = vec![Vec::new(); self.num_boxes()];
        for node in nodes {
            let (bx, by) = self.box_coords(node.location);
            occupants[self.box_index(bx, by)].push(node.index());
        }

        // With very few boxes the wrapped half-neighbourhood can revisit a
        // box, so pairs are deduplicated through a set
        let mut pairs = BTreeSet::new();
        for by in 0..self.num_boxes_y {
            for bx in 0..self.num_boxes_x {
                let home = &occupants[self.box_index(bx, by)];

                for (i, &a) in home.iter().enumerate() {
                    for &b in &home[i + 1..] {
                        pairs.insert((a.min(b), a.max(b)));
                    }
                }

                for neighbour_idx in self.half_neighbours(bx, by) {
                    if neighbour_idx == self.box_index(bx, by) {
                        continue;
                    }
                    for &a in home {
                        for &b in &occupants[neighbour_idx] {
                            pairs.insert((a.min(b), a.max(b)));
                        }
                    }
                }
            }
        }

        let pairs: Vec<(usize, usize)> = pairs.into_iter().collect();
        let mut neighbours = vec![BTreeSet::new(); nodes.len()];
        for &(a, b) in &pairs {
            neighbours[a].insert(b);
            neighbours[b].insert(a);
        }
        (pairs, neighbours)
    }
}
