//! Pluggable Lagrangian force modules.
//!
//! Each module adds vectors into the nodes' applied-force accumulators
//! once per step; the driver then spreads the accumulated forces onto the
//! fluid grid. Modules attach any per-node state they need on their first
//! contribution call.

pub mod cell_cell;
pub mod membrane;

pub use cell_cell::{CellCellInteractionForce, ProteinInitPolicy, SpringLaw};
pub use membrane::MembraneElasticityForce;

use std::io;

use crate::error::Result;
use crate::mesh::Mesh;
use crate::population::CellPopulation;

/// Capability implemented by every immersed boundary force producer.
pub trait IbForce {
    /// Add this module's contribution to every node's applied force.
    ///
    /// `node_pairs` is the current candidate pair list from the neighbour
    /// search; modules that act per element may ignore it.
    fn add_force_contribution(
        &mut self,
        mesh: &mut Mesh,
        node_pairs: &[(usize, usize)],
        population: &CellPopulation,
    ) -> Result<()>;

    /// Write this module's parameters as `<Name>value</Name>` lines in a
    /// stable order.
    fn write_parameters(&self, out: &mut dyn io::Write) -> io::Result<()>;
}
