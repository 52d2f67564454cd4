//! Elements (closed cell boundaries) and point fluid sources.

use glam::DVec2;

/// A closed polygon of nodes representing one cell boundary.
///
/// Node indices are stored in traversal order; that order defines the
/// positive orientation of the polygon. One distinguished element per mesh
/// may instead represent the basement lamina (the membrane element), a
/// non-closed line of nodes.
#[derive(Debug, Clone)]
pub struct Element {
    index: usize,
    /// Ordered node indices tracing the boundary
    pub node_indices: Vec<usize>,
    /// Per-element membrane spring constant; falls back to the membrane
    /// force module's value when unset
    pub membrane_spring_constant: Option<f64>,
    /// Per-element membrane rest length; falls back to the membrane force
    /// module's value when unset
    pub membrane_rest_length: Option<f64>,
    /// Index into the mesh's element fluid source list
    pub fluid_source: Option<usize>,
    /// Corner node markers used for orientation (up to four)
    pub corner_nodes: Vec<usize>,
    /// Arbitrary per-element scalar attributes
    pub attributes: Vec<f64>,
    /// Cached average node spacing, recomputed on demand
    pub(crate) average_node_spacing: Option<f64>,
}

impl Element {
    pub fn new(index: usize, node_indices: Vec<usize>) -> Self {
        Self {
            index,
            node_indices,
            membrane_spring_constant: None,
            membrane_rest_length: None,
            fluid_source: None,
            corner_nodes: Vec::new(),
            attributes: Vec::new(),
            average_node_spacing: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_nodes(&self) -> usize {
        self.node_indices.len()
    }

    pub fn set_membrane_spring_constant(&mut self, spring_constant: f64) {
        self.membrane_spring_constant = Some(spring_constant);
    }

    pub fn set_membrane_rest_length(&mut self, rest_length: f64) {
        self.membrane_rest_length = Some(rest_length);
    }
}

/// A point source or sink of incompressibility.
///
/// Each non-membrane element owns one source co-located with its centroid;
/// the mesh additionally owns a fixed row of balancing sources on the
/// midline used to zero net mass injection. All strengths are zero in the
/// core engine.
#[derive(Debug, Clone)]
pub struct FluidSource {
    index: usize,
    pub location: DVec2,
    pub strength: f64,
    /// Element this source belongs to, if any
    pub associated_element: Option<usize>,
}

impl FluidSource {
    pub fn new(index: usize, location: DVec2) -> Self {
        Self {
            index,
            location,
            strength: 0.0,
            associated_element: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_defaults() {
        let elem = Element::new(2, vec![0, 1, 2, 3]);
        assert_eq!(elem.index(), 2);
        assert_eq!(elem.num_nodes(), 4);
        assert!(elem.membrane_spring_constant.is_none());
        assert!(elem.fluid_source.is_none());
        assert!(elem.average_node_spacing.is_none());
    }

    #[test]
    fn test_fluid_source_starts_inert() {
        let source = FluidSource::new(0, DVec2::new(0.5, 0.0));
        assert_eq!(source.strength, 0.0);
        assert!(source.associated_element.is_none());
    }
}
