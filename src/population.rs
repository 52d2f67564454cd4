//! The cell population: cells as carriers of an element index plus the
//! population-level scalars the force modules consume.

use crate::error::{Result, SimulationError};

/// A cell; in the core engine it is simply a handle onto its boundary
/// element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub element_index: usize,
}

/// Population-level state shared by the force modules.
#[derive(Debug, Clone)]
pub struct CellPopulation {
    cells: Vec<Cell>,
    interaction_distance: f64,
    intrinsic_spacing: f64,
}

impl CellPopulation {
    /// Create a population with one cell per listed element index.
    ///
    /// The interaction distance sets both the neighbour-search box size
    /// and the cell-cell force cutoff.
    pub fn new(element_indices: Vec<usize>, interaction_distance: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&interaction_distance) || interaction_distance == 0.0 {
            return Err(SimulationError::Config(format!(
                "interaction distance must lie in (0, 1), got {interaction_distance}"
            )));
        }
        Ok(Self {
            cells: element_indices
                .into_iter()
                .map(|element_index| Cell { element_index })
                .collect(),
            interaction_distance,
            intrinsic_spacing: 0.01,
        })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn add_cell(&mut self, element_index: usize) {
        self.cells.push(Cell { element_index });
    }

    pub fn interaction_distance(&self) -> f64 {
        self.interaction_distance
    }

    /// The node spacing cells are considered to have at rest; the
    /// cell-cell spring constant is scaled by the ratio of actual element
    /// spacing to this value.
    pub fn intrinsic_spacing(&self) -> f64 {
        self.intrinsic_spacing
    }

    pub fn set_intrinsic_spacing(&mut self, spacing: f64) {
        self.intrinsic_spacing = spacing;
    }
}
