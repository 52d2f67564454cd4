//! Lagrangian boundary nodes.

use std::collections::BTreeSet;

use glam::DVec2;

/// Region tag assigned to a node by the membrane elasticity force.
///
/// Basal and apical nodes sit at the bottom and top of a cell; springs
/// touching them are stiffened. All membrane-element nodes are lateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRegion {
    Basal,
    Apical,
    Lateral,
}

impl NodeRegion {
    /// Apical and basal edges use the stiffened spring parameters.
    pub fn is_apical_or_basal(self) -> bool {
        matches!(self, NodeRegion::Basal | NodeRegion::Apical)
    }
}

/// A Lagrangian vertex of a cell boundary.
///
/// Nodes advect with the interpolated fluid velocity and accumulate the
/// applied force contributions of every registered force module between
/// clearing at the start of a step and spreading onto the grid.
#[derive(Debug, Clone)]
pub struct Node {
    index: usize,
    /// Location in [0,1)^2
    pub location: DVec2,
    /// Whether the node lies on an immersed boundary (always true here)
    pub is_boundary: bool,
    /// Region tag used by the membrane force
    pub region: NodeRegion,
    /// Accumulated applied force for the current step
    pub applied_force: DVec2,
    /// Extensible scalar attributes; the cell-cell force appends its
    /// protein quantities here
    pub attributes: Vec<f64>,
    /// Indices of elements containing this node
    containing_elements: BTreeSet<usize>,
}

impl Node {
    pub fn new(index: usize, location: DVec2, is_boundary: bool) -> Self {
        Self {
            index,
            location,
            is_boundary,
            region: NodeRegion::Lateral,
            applied_force: DVec2::ZERO,
            attributes: Vec::new(),
            containing_elements: BTreeSet::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn clear_applied_force(&mut self) {
        self.applied_force = DVec2::ZERO;
    }

    pub fn add_applied_force(&mut self, force: DVec2) {
        self.applied_force += force;
    }

    pub fn add_element(&mut self, element_index: usize) {
        self.containing_elements.insert(element_index);
    }

    pub fn containing_elements(&self) -> &BTreeSet<usize> {
        &self.containing_elements
    }

    /// The lowest-index element containing this node. Each node belongs to
    /// exactly one element in practice, so this identifies its cell.
    pub fn first_containing_element(&self) -> Option<usize> {
        self.containing_elements.iter().next().copied()
    }
}
