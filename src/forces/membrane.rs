//! Membrane elasticity: Hooke springs along every element edge.
//!
//! Nodes are classified once into basal, apical and lateral regions from
//! their y-locations; springs starting at an apical or basal node are
//! stiffened (10x spring constant, 4x rest length), which keeps the top
//! and bottom surfaces of palisade cells taut while the lateral walls
//! stay compliant.

use std::io;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::IbForce;
use crate::error::{Result, SimulationError};
use crate::geometry::torus;
use crate::mesh::{Mesh, NodeRegion};
use crate::population::CellPopulation;

/// Stiffening applied to springs whose starting node is apical or basal.
const REGION_SPRING_FACTOR: f64 = 10.0;
const REGION_REST_LENGTH_FACTOR: f64 = 4.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembraneElasticityForce {
    spring_constant: f64,
    rest_length: f64,
    #[serde(skip)]
    initialized: bool,
}

impl MembraneElasticityForce {
    /// Module-level spring parameters, used for every element without a
    /// per-element override.
    pub fn new(spring_constant: f64, rest_length: f64) -> Self {
        Self {
            spring_constant,
            rest_length,
            initialized: false,
        }
    }

    pub fn spring_constant(&self) -> f64 {
        self.spring_constant
    }

    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    /// Restore from an archived JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SimulationError::Config(format!("membrane force archive: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SimulationError::Config(format!("membrane force archive: {e}")))
    }

    /// Split the nodes of every element into basal, apical and lateral
    /// regions.
    ///
    /// Cells are initialised as roughly rectangular outlines with equally
    /// spaced nodes, so the number of basal (or apical) nodes is close to
    /// `0.5 * n / (1 + aspect)`. Sorting the node y-locations gives the
    /// thresholds separating the three bands. Basement lamina nodes are
    /// all lateral.
    fn classify_node_regions(&self, mesh: &mut Mesh) -> Result<()> {
        for elem_idx in 0..mesh.num_elements() {
            let node_indices = mesh.element(elem_idx).node_indices.clone();

            if mesh.is_membrane_element(elem_idx) {
                for node_idx in node_indices {
                    mesh.node_mut(node_idx).region = NodeRegion::Lateral;
                }
                continue;
            }

            let num_nodes = node_indices.len();
            let aspect_ratio = mesh.elongation_shape_factor(elem_idx);
            let num_basal = (0.5 * num_nodes as f64 / (1.0 + aspect_ratio)).floor() as usize;

            if num_basal <= 1 || num_basal >= num_nodes / 2 {
                return Err(SimulationError::Geometry(format!(
                    "element {elem_idx}: {num_basal} basal nodes of {num_nodes} cannot be \
                     classified into regions"
                )));
            }

            let mut y_locations: Vec<f64> = node_indices
                .iter()
                .map(|&idx| mesh.node_location(idx).y)
                .collect();
            y_locations.sort_by(f64::total_cmp);

            let low_threshold = 0.5 * (y_locations[num_basal - 1] + y_locations[num_basal]);
            let high_threshold = 0.5
                * (y_locations[num_nodes - num_basal] + y_locations[num_nodes - num_basal - 1]);

            for node_idx in node_indices {
                let y = mesh.node_location(node_idx).y;
                mesh.node_mut(node_idx).region = if y < low_threshold {
                    NodeRegion::Basal
                } else if y > high_threshold {
                    NodeRegion::Apical
                } else {
                    NodeRegion::Lateral
                };
            }
        }
        Ok(())
    }
}

impl IbForce for MembraneElasticityForce {
    fn add_force_contribution(
        &mut self,
        mesh: &mut Mesh,
        _node_pairs: &[(usize, usize)],
        _population: &CellPopulation,
    ) -> Result<()> {
        if !self.initialized {
            self.classify_node_regions(mesh)?;
            self.initialized = true;
        }

        for elem_idx in 0..mesh.num_elements() {
            let node_indices = mesh.element(elem_idx).node_indices.clone();
            let num_nodes = node_indices.len();

            let spring_constant = mesh
                .element(elem_idx)
                .membrane_spring_constant
                .unwrap_or(self.spring_constant);
            let rest_length = mesh
                .element(elem_idx)
                .membrane_rest_length
                .unwrap_or(self.rest_length);

            // Force exerted on node i+1 by the spring from node i
            let mut force_to_next: Vec<DVec2> = Vec::with_capacity(num_nodes);
            for local in 0..num_nodes {
                let this_idx = node_indices[local];
                let next_idx = node_indices[(local + 1) % num_nodes];

                let mut k = spring_constant;
                let mut ell = rest_length;
                if mesh.node(this_idx).region.is_apical_or_basal() {
                    k *= REGION_SPRING_FACTOR;
                    ell *= REGION_REST_LENGTH_FACTOR;
                }

                let spring = torus::vector_from(
                    mesh.node_location(next_idx),
                    mesh.node_location(this_idx),
                );
                let length = spring.length();
                force_to_next.push(spring * (k * (length - ell) / length));
            }

            // Net force on each node from its two adjacent springs
            for local in 0..num_nodes {
                let prev = (local + num_nodes - 1) % num_nodes;
                let aggregate = force_to_next[prev] - force_to_next[local];
                mesh.node_mut(node_indices[local]).add_applied_force(aggregate);
            }
        }

        Ok(())
    }

    fn write_parameters(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "<SpringConstant>{}</SpringConstant>", self.spring_constant)?;
        writeln!(out, "<RestLength>{}</RestLength>", self.rest_length)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Superellipse;
    use crate::mesh::{Element, Node};

    fn ellipse_mesh(num_nodes: usize) -> (Mesh, CellPopulation) {
        let gen = Superellipse::new(num_nodes, 1.0, 0.3, 0.5, DVec2::new(0.35, 0.25)).unwrap();
        let nodes: Vec<Node> = gen
            .generate()
            .into_iter()
            .enumerate()
            .map(|(i, loc)| Node::new(i, loc, true))
            .collect();
        let element = Element::new(0, (0..num_nodes).collect());
        let mesh = Mesh::new(nodes, vec![element], 64, 64, None).unwrap();
        let population = CellPopulation::new(vec![0], 0.05).unwrap();
        (mesh, population)
    }

    #[test]
    fn test_classification_produces_three_bands() {
        let (mut mesh, population) = ellipse_mesh(64);
        let mut force = MembraneElasticityForce::new(1e6, 0.005);
        force.add_force_contribution(&mut mesh, &[], &population).unwrap();

        let mut basal = 0;
        let mut apical = 0;
        let mut lateral = 0;
        for node in mesh.nodes() {
            match node.region {
                NodeRegion::Basal => basal += 1,
                NodeRegion::Apical => apical += 1,
                NodeRegion::Lateral => lateral += 1,
            }
        }
        assert!(basal > 1 && basal < 32, "basal count {basal}");
        assert_eq!(basal, apical, "bands should be symmetric for a symmetric shape");
        assert!(lateral > 0);

        // Basal nodes all sit below apical nodes
        let max_basal_y = mesh
            .nodes()
            .iter()
            .filter(|n| n.region == NodeRegion::Basal)
            .map(|n| n.location.y)
            .fold(f64::MIN, f64::max);
        let min_apical_y = mesh
            .nodes()
            .iter()
            .filter(|n| n.region == NodeRegion::Apical)
            .map(|n| n.location.y)
            .fold(f64::MAX, f64::min);
        assert!(max_basal_y < min_apical_y);
    }

    #[test]
    fn test_too_few_nodes_for_classification() {
        let nodes = vec![
            Node::new(0, DVec2::new(0.4, 0.4), true),
            Node::new(1, DVec2::new(0.6, 0.4), true),
            Node::new(2, DVec2::new(0.5, 0.6), true),
        ];
        let mut mesh =
            Mesh::new(nodes, vec![Element::new(0, vec![0, 1, 2])], 32, 32, None).unwrap();
        let population = CellPopulation::new(vec![0], 0.05).unwrap();
        let mut force = MembraneElasticityForce::new(1e6, 0.005);
        let err = force
            .add_force_contribution(&mut mesh, &[], &population)
            .unwrap_err();
        assert!(matches!(err, SimulationError::Geometry(_)));
    }

    #[test]
    fn test_net_spring_force_sums_to_zero_over_element() {
        let (mut mesh, population) = ellipse_mesh(64);
        let mut force = MembraneElasticityForce::new(1e5, 0.004);
        force.add_force_contribution(&mut mesh, &[], &population).unwrap();

        let total: DVec2 = mesh.nodes().iter().map(|n| n.applied_force).sum();
        assert!(
            total.length() < 1e-8,
            "internal springs must not generate net force, got {total:?}"
        );
    }

    #[test]
    fn test_stretched_edge_pulls_nodes_together() {
        // Two lateral nodes far apart relative to the rest length
        let (mut mesh, population) = ellipse_mesh(64);
        let mut force = MembraneElasticityForce::new(1e3, 1e-4);
        force.add_force_contribution(&mut mesh, &[], &population).unwrap();

        // Pick a lateral node; its springs are under tension, so the force
        // should point inward (toward the element centroid)
        let centroid = mesh.centroid_of(0);
        let lateral = mesh
            .nodes()
            .iter()
            .find(|n| n.region == NodeRegion::Lateral)
            .expect("some node is lateral");
        let inward = torus::vector_from(lateral.location, centroid);
        assert!(
            lateral.applied_force.dot(inward) > 0.0,
            "tensioned membrane should pull node {} inward",
            lateral.index()
        );
    }

    #[test]
    fn test_element_overrides_take_precedence() {
        let (mut mesh, population) = ellipse_mesh(64);
        mesh.element_mut(0).set_membrane_spring_constant(0.0);
        let mut force = MembraneElasticityForce::new(1e9, 1e-4);
        force.add_force_contribution(&mut mesh, &[], &population).unwrap();
        for node in mesh.nodes() {
            assert_eq!(node.applied_force, DVec2::ZERO);
        }
    }

    #[test]
    fn test_parameter_dump_order() {
        let force = MembraneElasticityForce::new(1e8, 0.003125);
        let mut out = Vec::new();
        force.write_parameters(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let spring_pos = text.find("<SpringConstant>").unwrap();
        let rest_pos = text.find("<RestLength>").unwrap();
        assert!(spring_pos < rest_pos);
        assert!(text.contains("<SpringConstant>100000000</SpringConstant>"));
    }

    #[test]
    fn test_archive_round_trip() {
        let force = MembraneElasticityForce::new(1.25e4, 0.00271828);
        let restored = MembraneElasticityForce::from_json(&force.to_json().unwrap()).unwrap();
        assert!((restored.spring_constant() - 1.25e4).abs() < 1e-6);
        assert!((restored.rest_length() - 0.00271828).abs() < 1e-6);
    }
}
