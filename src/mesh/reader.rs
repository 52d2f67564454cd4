//! Mesh construction from an abstract reader blob.
//!
//! A [`MeshReader`] delivers node rows, element rows and the two initial
//! velocity grids. [`Mesh::from_reader`] validates every row as it is
//! consumed; any inconsistency surfaces as a `MalformedMesh` error.

use glam::DVec2;

use super::{Element, Mesh, Node};
use crate::error::{Result, SimulationError};

/// One element row from a reader: the node indices in traversal order,
/// whether this is the membrane element, and an optional scalar attribute.
#[derive(Debug, Clone)]
pub struct ElementData {
    pub node_indices: Vec<usize>,
    pub is_membrane: bool,
    pub attribute: Option<f64>,
}

/// Abstract source of mesh data.
///
/// Implementations deliver, in order: `num_nodes` node rows, `num_elements`
/// element rows, the grid dimensions, and `2 * Ny` grid rows of `Nx` values
/// (all of u, then all of v).
pub trait MeshReader {
    fn num_nodes(&self) -> usize;
    fn num_elements(&self) -> usize;
    fn grid_dimensions(&self) -> (usize, usize);

    /// Next node row as `(x, y, is_boundary)`.
    fn next_node(&mut self) -> Option<(f64, f64, bool)>;

    /// Next element row.
    fn next_element(&mut self) -> Option<ElementData>;

    /// Next grid row of `Nx` doubles.
    fn next_grid_row(&mut self) -> Option<Vec<f64>>;
}

impl Mesh {
    /// Construct a mesh from a reader blob.
    pub fn from_reader<R: MeshReader>(reader: &mut R) -> Result<Self> {
        let num_nodes = reader.num_nodes();
        let num_elements = reader.num_elements();
        let (num_grid_pts_x, num_grid_pts_y) = reader.grid_dimensions();

        let mut nodes = Vec::with_capacity(num_nodes);
        for index in 0..num_nodes {
            let (x, y, is_boundary) = reader.next_node().ok_or_else(|| {
                SimulationError::MalformedMesh(format!(
                    "reader promised {num_nodes} nodes but ran out at {index}"
                ))
            })?;
            if !(0.0..1.0).contains(&x) || !(0.0..1.0).contains(&y) {
                return Err(SimulationError::MalformedMesh(format!(
                    "node {index} location ({x}, {y}) outside [0,1)^2"
                )));
            }
            nodes.push(Node::new(index, DVec2::new(x, y), is_boundary));
        }

        let mut elements = Vec::with_capacity(num_elements);
        let mut membrane_index = None;
        for index in 0..num_elements {
            let data = reader.next_element().ok_or_else(|| {
                SimulationError::MalformedMesh(format!(
                    "reader promised {num_elements} elements but ran out at {index}"
                ))
            })?;
            if data.node_indices.is_empty() {
                return Err(SimulationError::MalformedMesh(format!(
                    "element {index} has no nodes"
                )));
            }
            for &node_idx in &data.node_indices {
                if node_idx >= num_nodes {
                    return Err(SimulationError::MalformedMesh(format!(
                        "element {index} references node {node_idx} of {num_nodes}"
                    )));
                }
            }
            if data.is_membrane {
                if membrane_index.is_some() {
                    return Err(SimulationError::MalformedMesh(
                        "more than one membrane element".into(),
                    ));
                }
                membrane_index = Some(index);
            }

            let mut element = Element::new(index, data.node_indices);
            if let Some(attribute) = data.attribute {
                element.attributes.push(attribute);
            }
            elements.push(element);
        }

        let mut mesh = Mesh::new(nodes, elements, num_grid_pts_x, num_grid_pts_y, membrane_index)?;

        // Velocity grids: Ny rows of u, then Ny rows of v
        for component in 0..2 {
            for y in 0..num_grid_pts_y {
                let row = reader.next_grid_row().ok_or_else(|| {
                    SimulationError::MalformedMesh(format!(
                        "grid component {component} ran out of rows at {y}"
                    ))
                })?;
                if row.len() != num_grid_pts_x {
                    return Err(SimulationError::MalformedMesh(format!(
                        "grid row {y} has {} values, expected {num_grid_pts_x}",
                        row.len()
                    )));
                }
                for (x, &value) in row.iter().enumerate() {
                    if component == 0 {
                        mesh.u[[y, x]] = value;
                    } else {
                        mesh.v[[y, x]] = value;
                    }
                }
            }
        }

        Ok(mesh)
    }
}

/// In-memory reader backed by slices; used by tests and embedding drivers.
#[derive(Debug, Clone)]
pub struct SliceMeshReader {
    nodes: Vec<(f64, f64, bool)>,
    elements: Vec<ElementData>,
    grid_dimensions: (usize, usize),
    grid_rows: Vec<Vec<f64>>,
    node_cursor: usize,
    element_cursor: usize,
    grid_cursor: usize,
}

impl SliceMeshReader {
    pub fn new(
        nodes: Vec<(f64, f64, bool)>,
        elements: Vec<ElementData>,
        grid_dimensions: (usize, usize),
        grid_rows: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            nodes,
            elements,
            grid_dimensions,
            grid_rows,
            node_cursor: 0,
            element_cursor: 0,
            grid_cursor: 0,
        }
    }
}

impl MeshReader for SliceMeshReader {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn num_elements(&self) -> usize {
        self.elements.len()
    }

    fn grid_dimensions(&self) -> (usize, usize) {
        self.grid_dimensions
    }

    fn next_node(&mut self) -> Option<(f64, f64, bool)> {
        let node = self.nodes.get(self.node_cursor).copied();
        self.node_cursor += 1;
        node
    }

    fn next_element(&mut self) -> Option<ElementData> {
        let element = self.elements.get(self.element_cursor).cloned();
        self.element_cursor += 1;
        element
    }

    fn next_grid_row(&mut self) -> Option<Vec<f64>> {
        let row = self.grid_rows.get(self.grid_cursor).cloned();
        self.grid_cursor += 1;
        row
    }
}
