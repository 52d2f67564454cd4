//! Cell-cell interaction force between nodes of different boundaries.
//!
//! Every node carries dimensionless quantities of three transmembrane
//! proteins (E-cadherin, P-cadherin, Integrin), stored in its attribute
//! vector. The force between a candidate pair is scaled by a protein
//! multiplier and by the node spacings of the elements involved, so that
//! force balance survives the spreading step when neighbouring cells are
//! discretised at different densities.

use std::io;

use serde::{Deserialize, Serialize};

use super::IbForce;
use crate::error::{Result, SimulationError};
use crate::geometry::torus;
use crate::mesh::Mesh;
use crate::population::CellPopulation;

/// Interaction law between cell boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpringLaw {
    Linear,
    Morse,
}

/// Initial protein quantities per node, by element kind.
///
/// The basement lamina historically received the same E-cadherin level as
/// the cells; both levels are exposed here so the assumption is a policy
/// rather than a constant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProteinInitPolicy {
    pub cell_e_cadherin: f64,
    pub membrane_e_cadherin: f64,
}

impl Default for ProteinInitPolicy {
    fn default() -> Self {
        Self {
            cell_e_cadherin: 1.0,
            membrane_e_cadherin: 1.0,
        }
    }
}

/// Number of protein attribute slots appended to every node.
const NUM_PROTEINS: usize = 3;

/// Well width and rest length as fractions of the interaction distance.
const WELL_WIDTH_FRACTION: f64 = 0.25;
const REST_LENGTH_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellCellInteractionForce {
    spring_constant: f64,
    rest_length: Option<f64>,
    num_proteins: usize,
    linear_spring: bool,
    morse: bool,
    #[serde(default)]
    init_policy: ProteinInitPolicy,
    /// Index of the first protein slot in each node's attribute vector,
    /// assigned on the first contribution call
    #[serde(skip)]
    protein_offset: Option<usize>,
}

impl CellCellInteractionForce {
    pub fn new(spring_constant: f64) -> Self {
        Self {
            spring_constant,
            rest_length: None,
            num_proteins: NUM_PROTEINS,
            linear_spring: true,
            morse: false,
            init_policy: ProteinInitPolicy::default(),
            protein_offset: None,
        }
    }

    pub fn spring_constant(&self) -> f64 {
        self.spring_constant
    }

    pub fn set_spring_constant(&mut self, spring_constant: f64) {
        self.spring_constant = spring_constant;
    }

    pub fn rest_length(&self) -> Option<f64> {
        self.rest_length
    }

    /// Override the rest length; by default it is set to a quarter of the
    /// interaction distance on the first contribution call.
    pub fn set_rest_length(&mut self, rest_length: f64) {
        self.rest_length = Some(rest_length);
    }

    pub fn set_spring_law(&mut self, law: SpringLaw) {
        self.linear_spring = law == SpringLaw::Linear;
        self.morse = law == SpringLaw::Morse;
    }

    pub fn spring_law(&self) -> SpringLaw {
        if self.morse {
            SpringLaw::Morse
        } else {
            SpringLaw::Linear
        }
    }

    pub fn set_protein_init_policy(&mut self, policy: ProteinInitPolicy) {
        self.init_policy = policy;
    }

    /// Attribute index of a protein slot (0 = E-cadherin, 1 = P-cadherin,
    /// 2 = Integrin) once attached.
    pub fn protein_attribute_index(&self, protein: usize) -> Option<usize> {
        self.protein_offset.map(|offset| offset + protein)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SimulationError::Config(format!("cell-cell force archive: {e}")))
    }

    /// Restore from an archived JSON string. Exactly one of the linear and
    /// Morse flags must be set.
    pub fn from_json(json: &str) -> Result<Self> {
        let force: Self = serde_json::from_str(json)
            .map_err(|e| SimulationError::Config(format!("cell-cell force archive: {e}")))?;
        if force.linear_spring == force.morse {
            return Err(SimulationError::Config(format!(
                "archived cell-cell force must use exactly one law: linear={}, morse={}",
                force.linear_spring, force.morse
            )));
        }
        Ok(force)
    }

    /// Attach the protein attribute slots to every node and set their
    /// initial levels. Runs once, on the first contribution call.
    fn attach_protein_attributes(
        &mut self,
        mesh: &mut Mesh,
        population: &CellPopulation,
    ) -> Result<()> {
        let num_attributes = mesh.node(0).attributes.len();
        for node in mesh.nodes() {
            if node.attributes.len() != num_attributes {
                return Err(SimulationError::AttributeMismatch(format!(
                    "node {} has {} attributes, expected {num_attributes}",
                    node.index(),
                    node.attributes.len()
                )));
            }
        }

        self.protein_offset = Some(num_attributes);
        for node in mesh.nodes_mut() {
            node.attributes.extend(std::iter::repeat(0.0).take(self.num_proteins));
        }

        self.initialize_protein_levels(mesh);

        if self.rest_length.is_none() {
            self.rest_length = Some(REST_LENGTH_FRACTION * population.interaction_distance());
        }
        Ok(())
    }

    fn initialize_protein_levels(&self, mesh: &mut Mesh) {
        let Some(offset) = self.protein_offset else {
            return;
        };
        for elem_idx in 0..mesh.num_elements() {
            let e_cadherin = if mesh.is_membrane_element(elem_idx) {
                self.init_policy.membrane_e_cadherin
            } else {
                self.init_policy.cell_e_cadherin
            };

            let node_indices = mesh.element(elem_idx).node_indices.clone();
            for node_idx in node_indices {
                let attributes = &mut mesh.node_mut(node_idx).attributes;
                attributes[offset] += e_cadherin;
                // P-cadherin and integrin start at zero
            }
        }
    }

    /// Hook for protein dynamics, invoked once per contribution call.
    ///
    /// Protein levels are currently constant in time; override the levels
    /// through the node attributes if a model needs them to evolve.
    pub fn update_protein_levels(&self, _mesh: &mut Mesh) {}
}

impl IbForce for CellCellInteractionForce {
    fn add_force_contribution(
        &mut self,
        mesh: &mut Mesh,
        node_pairs: &[(usize, usize)],
        population: &CellPopulation,
    ) -> Result<()> {
        if self.protein_offset.is_none() {
            self.attach_protein_attributes(mesh, population)?;
        }
        self.update_protein_levels(mesh);

        let offset = self.protein_offset.unwrap_or(0);
        let e_cad_idx = offset;
        let p_cad_idx = offset + 1;
        let integrin_idx = offset + 2;

        let interaction_distance = population.interaction_distance();
        let intrinsic_spacing = population.intrinsic_spacing();
        let rest_length = self
            .rest_length
            .unwrap_or(REST_LENGTH_FRACTION * interaction_distance);
        let well_width = WELL_WIDTH_FRACTION * interaction_distance;

        for &(node_a, node_b) in node_pairs {
            // Interactions only occur between different cells; each node
            // belongs to a single element
            let elem_a = mesh.node(node_a).first_containing_element();
            let elem_b = mesh.node(node_b).first_containing_element();
            let (Some(elem_a), Some(elem_b)) = (elem_a, elem_b) else {
                continue;
            };
            if elem_a == elem_b {
                continue;
            }

            let between = torus::vector_from(
                mesh.node_location(node_a),
                mesh.node_location(node_b),
            );
            let dist = between.length();
            if dist >= interaction_distance {
                continue;
            }

            let spacing_a = mesh.average_node_spacing_of(elem_a, false);
            let spacing_b = mesh.average_node_spacing_of(elem_b, false);
            let elem_spacing = 0.5 * (spacing_a + spacing_b);
            let effective_spring = self.spring_constant * elem_spacing / intrinsic_spacing;

            let attribs_a = &mesh.node(node_a).attributes;
            let attribs_b = &mesh.node(node_b).attributes;
            let protein_mult = attribs_a[e_cad_idx].min(attribs_b[e_cad_idx])
                + attribs_a[p_cad_idx].min(attribs_b[p_cad_idx])
                + attribs_a[integrin_idx].max(attribs_b[integrin_idx]);

            let magnitude = if self.morse {
                let morse_exp = ((rest_length - dist) / well_width).exp();
                2.0 * well_width * effective_spring * protein_mult * morse_exp
                    * (1.0 - morse_exp)
                    / dist
            } else {
                effective_spring * protein_mult * (dist - rest_length) / dist
            };
            let force = between * magnitude;

            // Per-endpoint scaling keeps the pair balanced through the
            // spreading step, whose weight is the local node spacing
            mesh.node_mut(node_a)
                .add_applied_force(force * (elem_spacing / spacing_a));
            mesh.node_mut(node_b)
                .add_applied_force(-force * (elem_spacing / spacing_b));
        }

        Ok(())
    }

    fn write_parameters(&self, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "<SpringConst>{}</SpringConst>", self.spring_constant)?;
        writeln!(
            out,
            "<RestLength>{}</RestLength>",
            self.rest_length.unwrap_or(0.0)
        )?;
        writeln!(out, "<NumProteins>{}</NumProteins>", self.num_proteins)?;
        writeln!(out, "<LinearSpring>{}</LinearSpring>", self.linear_spring as u8)?;
        writeln!(out, "<Morse>{}</Morse>", self.morse as u8)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Superellipse;
    use crate::mesh::{Element, Node};
    use glam::DVec2;

    /// Two small circles a controlled gap apart.
    fn two_cell_mesh(gap: f64, nodes_per_cell: usize) -> (Mesh, CellPopulation) {
        let radius = 0.08;
        let mut nodes = Vec::new();
        let mut elements = Vec::new();
        for (elem_idx, centre_x) in [0.3, 0.3 + 2.0 * radius + gap].iter().enumerate() {
            let base = nodes.len();
            let gen = Superellipse::new(
                nodes_per_cell,
                1.0,
                2.0 * radius,
                2.0 * radius,
                DVec2::new(centre_x - radius, 0.5 - radius),
            )
            .unwrap();
            for (i, loc) in gen.generate().into_iter().enumerate() {
                nodes.push(Node::new(base + i, loc, true));
            }
            elements.push(Element::new(
                elem_idx,
                (base..base + nodes_per_cell).collect(),
            ));
        }
        let mesh = Mesh::new(nodes, elements, 64, 64, None).unwrap();
        let population = CellPopulation::new(vec![0, 1], 0.05).unwrap();
        (mesh, population)
    }

    fn all_pairs(mesh: &Mesh) -> Vec<(usize, usize)> {
        let n = mesh.num_nodes();
        let mut pairs = Vec::new();
        for a in 0..n {
            for b in (a + 1)..n {
                pairs.push((a, b));
            }
        }
        pairs
    }

    #[test]
    fn test_attaches_three_protein_slots_once() {
        let (mut mesh, population) = two_cell_mesh(0.01, 24);
        let mut force = CellCellInteractionForce::new(1e3);
        let pairs = all_pairs(&mesh);

        force.add_force_contribution(&mut mesh, &pairs, &population).unwrap();
        assert_eq!(mesh.node(0).attributes.len(), 3);
        let e_cad = force.protein_attribute_index(0).unwrap();
        assert!((mesh.node(0).attributes[e_cad] - 1.0).abs() < 1e-12);
        assert_eq!(mesh.node(0).attributes[e_cad + 1], 0.0);
        assert_eq!(mesh.node(0).attributes[e_cad + 2], 0.0);

        // Second call must not attach again
        force.add_force_contribution(&mut mesh, &pairs, &population).unwrap();
        assert_eq!(mesh.node(0).attributes.len(), 3);
    }

    #[test]
    fn test_mismatched_attributes_rejected() {
        let (mut mesh, population) = two_cell_mesh(0.01, 24);
        mesh.node_mut(3).attributes.push(9.0);
        let mut force = CellCellInteractionForce::new(1e3);
        let pairs = all_pairs(&mesh);
        let err = force
            .add_force_contribution(&mut mesh, &pairs, &population)
            .unwrap_err();
        assert!(matches!(err, SimulationError::AttributeMismatch(_)));
    }

    #[test]
    fn test_same_element_pairs_are_skipped() {
        let (mut mesh, population) = two_cell_mesh(0.5, 24);
        let mut force = CellCellInteractionForce::new(1e3);
        // Only pairs within element 0 (cells are far apart anyway)
        let pairs: Vec<(usize, usize)> = (0..24).flat_map(|a| ((a + 1)..24).map(move |b| (a, b))).collect();
        force.add_force_contribution(&mut mesh, &pairs, &population).unwrap();
        for node in mesh.nodes() {
            assert_eq!(node.applied_force, DVec2::ZERO);
        }
    }

    #[test]
    fn test_forces_balance_for_equal_spacings() {
        let (mut mesh, population) = two_cell_mesh(0.01, 24);
        // Pin both cached spacings to the same value so the per-endpoint
        // scaling cancels exactly
        mesh.element_mut(0).average_node_spacing = Some(0.02);
        mesh.element_mut(1).average_node_spacing = Some(0.02);
        let mut force = CellCellInteractionForce::new(1e3);
        let pairs = all_pairs(&mesh);
        force
            .add_force_contribution(&mut mesh, &pairs, &population)
            .unwrap();

        let total: DVec2 = mesh.nodes().iter().map(|n| n.applied_force).sum();
        assert!(
            total.length() < 1e-12,
            "pairwise forces should cancel, residual {total:?}"
        );

        // And something actually happened across the gap
        let acted = mesh.nodes().iter().any(|n| n.applied_force.length() > 0.0);
        assert!(acted, "close cells should interact");
    }

    #[test]
    fn test_separated_nodes_attract_toward_rest_length() {
        // Gap larger than the rest length (0.0125) but inside the cutoff:
        // the linear spring pulls the cells together
        let (mut mesh, population) = two_cell_mesh(0.03, 24);
        let mut force = CellCellInteractionForce::new(1e3);
        let pairs = all_pairs(&mesh);
        force
            .add_force_contribution(&mut mesh, &pairs, &population)
            .unwrap();

        // Nodes on the right edge of the left cell feel a net +x force
        let puller = mesh
            .nodes()
            .iter()
            .filter(|n| n.first_containing_element() == Some(0))
            .max_by(|a, b| a.location.x.total_cmp(&b.location.x))
            .expect("left cell has nodes");
        assert!(
            puller.applied_force.x > 0.0,
            "left cell's closest node should be pulled right, got {:?}",
            puller.applied_force
        );
    }

    #[test]
    fn test_morse_potential_repels_overlapping_nodes() {
        let (mut mesh, population) = two_cell_mesh(0.002, 24);
        let mut force = CellCellInteractionForce::new(1e3);
        force.set_spring_law(SpringLaw::Morse);
        let pairs = all_pairs(&mesh);
        force
            .add_force_contribution(&mut mesh, &pairs, &population)
            .unwrap();

        // Distance 0.002 is far below the rest length: the closest node of
        // the left cell is pushed left
        let pushed = mesh
            .nodes()
            .iter()
            .filter(|n| n.first_containing_element() == Some(0))
            .max_by(|a, b| a.location.x.total_cmp(&b.location.x))
            .expect("left cell has nodes");
        assert!(
            pushed.applied_force.x < 0.0,
            "compressed Morse pair should repel, got {:?}",
            pushed.applied_force
        );
    }

    #[test]
    fn test_rest_length_defaults_to_quarter_interaction_distance() {
        let (mut mesh, population) = two_cell_mesh(0.01, 24);
        let mut force = CellCellInteractionForce::new(1e3);
        let pairs = all_pairs(&mesh);
        force
            .add_force_contribution(&mut mesh, &pairs, &population)
            .unwrap();
        let rest = force.rest_length().unwrap();
        assert!((rest - 0.25 * 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_parameter_dump_order() {
        let mut force = CellCellInteractionForce::new(1e9);
        force.set_rest_length(0.25);
        force.set_spring_law(SpringLaw::Morse);
        let mut out = Vec::new();
        force.write_parameters(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let order = [
            "<SpringConst>",
            "<RestLength>",
            "<NumProteins>",
            "<LinearSpring>",
            "<Morse>",
        ];
        let mut last = 0;
        for tag in order {
            let pos = text.find(tag).unwrap_or_else(|| panic!("missing {tag}"));
            assert!(pos >= last, "{tag} out of order");
            last = pos;
        }
        assert!(text.contains("<LinearSpring>0</LinearSpring>"));
        assert!(text.contains("<Morse>1</Morse>"));
    }

    #[test]
    fn test_archive_round_trip_and_validation() {
        let mut force = CellCellInteractionForce::new(2.5e3);
        force.set_rest_length(0.0123456);
        force.set_spring_law(SpringLaw::Morse);

        let restored = CellCellInteractionForce::from_json(&force.to_json().unwrap()).unwrap();
        assert!((restored.spring_constant() - 2.5e3).abs() < 1e-6);
        assert!((restored.rest_length().unwrap() - 0.0123456).abs() < 1e-6);
        assert_eq!(restored.spring_law(), SpringLaw::Morse);

        // Tampered archives with both or neither law set are rejected
        let json = force.to_json().unwrap();
        let both = json.replace("\"linear_spring\":false", "\"linear_spring\":true");
        assert!(CellCellInteractionForce::from_json(&both).is_err());
        let neither = json.replace("\"morse\":true", "\"morse\":false");
        assert!(CellCellInteractionForce::from_json(&neither).is_err());
    }

    #[test]
    fn test_protein_policy_is_configurable() {
        let (mut mesh, population) = two_cell_mesh(0.01, 24);
        let mut force = CellCellInteractionForce::new(1e3);
        force.set_protein_init_policy(ProteinInitPolicy {
            cell_e_cadherin: 0.5,
            membrane_e_cadherin: 0.0,
        });
        let pairs = all_pairs(&mesh);
        force
            .add_force_contribution(&mut mesh, &pairs, &population)
            .unwrap();
        let e_cad = force.protein_attribute_index(0).unwrap();
        assert!((mesh.node(0).attributes[e_cad] - 0.5).abs() < 1e-12);
    }
}
