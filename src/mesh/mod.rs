//! The immersed boundary mesh: Lagrangian nodes and elements coupled to
//! Eulerian velocity and force grids on the periodic unit square.
//!
//! The mesh owns every node and element (arena style; elements reference
//! nodes by index), the per-element and balancing fluid sources, and the
//! four `[y][x]` grids the fluid solver and spreading kernel operate on.
//! All geometric queries are built on the torus shortest-vector rule so
//! they remain correct for boundaries straddling the periodic seam.

pub mod division;
pub mod element;
pub mod node;
pub mod reader;
mod skewness;

use glam::DVec2;
use ndarray::Array2;
use rand::Rng;
use rand_distr::UnitCircle;

pub use element::{Element, FluidSource};
pub use node::{Node, NodeRegion};
pub use reader::{MeshReader, SliceMeshReader};

use crate::error::{Result, SimulationError};
use crate::geometry::torus;

/// Second moments of area about an element centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub ixx: f64,
    pub iyy: f64,
    pub ixy: f64,
}

/// Balancing sources sit every 4 grid spacings along y = 0.
const BALANCING_SOURCE_SPACING_CELLS: f64 = 4.0;

/// Discriminant below which the inertia tensor is treated as degenerate
/// and the short axis drawn at random.
const DEGENERATE_AXIS_TOLERANCE: f64 = 1e-10;

#[derive(Debug)]
pub struct Mesh {
    nodes: Vec<Node>,
    elements: Vec<Element>,
    element_sources: Vec<FluidSource>,
    balancing_sources: Vec<FluidSource>,
    num_grid_pts_x: usize,
    num_grid_pts_y: usize,
    characteristic_node_spacing: f64,
    membrane_index: Option<usize>,
    element_division_spacing: Option<f64>,
    /// Fluid velocity x-component, indexed `[y][x]`
    pub u: Array2<f64>,
    /// Fluid velocity y-component, indexed `[y][x]`
    pub v: Array2<f64>,
    /// Accumulated force grid, x-component
    pub force_x: Array2<f64>,
    /// Accumulated force grid, y-component
    pub force_y: Array2<f64>,
}

impl Mesh {
    /// Build a mesh from explicit node and element lists.
    ///
    /// Registers containing elements on every node, computes the
    /// characteristic node spacing over all non-membrane boundaries, and
    /// places one zero-strength fluid source at each cell centroid plus
    /// the balancing row along y = 0.
    pub fn new(
        nodes: Vec<Node>,
        elements: Vec<Element>,
        num_grid_pts_x: usize,
        num_grid_pts_y: usize,
        membrane_index: Option<usize>,
    ) -> Result<Self> {
        validate_grid_dim("Nx", num_grid_pts_x)?;
        validate_grid_dim("Ny", num_grid_pts_y)?;

        if let Some(membrane) = membrane_index {
            if membrane >= elements.len() {
                return Err(SimulationError::MalformedMesh(format!(
                    "membrane index {membrane} out of range for {} elements",
                    elements.len()
                )));
            }
        }

        let mut mesh = Self {
            nodes,
            elements,
            element_sources: Vec::new(),
            balancing_sources: Vec::new(),
            num_grid_pts_x,
            num_grid_pts_y,
            characteristic_node_spacing: 0.0,
            membrane_index,
            element_division_spacing: None,
            u: Array2::zeros((num_grid_pts_y, num_grid_pts_x)),
            v: Array2::zeros((num_grid_pts_y, num_grid_pts_x)),
            force_x: Array2::zeros((num_grid_pts_y, num_grid_pts_x)),
            force_y: Array2::zeros((num_grid_pts_y, num_grid_pts_x)),
        };

        // Register elements with their nodes
        for elem_idx in 0..mesh.elements.len() {
            for local in 0..mesh.elements[elem_idx].num_nodes() {
                let node_idx = mesh.elements[elem_idx].node_indices[local];
                let node = mesh.nodes.get_mut(node_idx).ok_or_else(|| {
                    SimulationError::MalformedMesh(format!(
                        "element {elem_idx} references missing node {node_idx}"
                    ))
                })?;
                node.add_element(elem_idx);
            }
        }

        // Characteristic node spacing: mean inter-node arclength over cells
        let mut total_perimeter = 0.0;
        let mut total_nodes = 0usize;
        for elem_idx in 0..mesh.elements.len() {
            if Some(elem_idx) != mesh.membrane_index {
                total_perimeter += mesh.surface_area_of(elem_idx);
                total_nodes += mesh.elements[elem_idx].num_nodes();
            }
        }
        if total_nodes == 0 {
            return Err(SimulationError::MalformedMesh(
                "mesh contains no non-membrane elements".into(),
            ));
        }
        mesh.characteristic_node_spacing = total_perimeter / total_nodes as f64;

        // One fluid source per cell, co-located with its centroid
        for elem_idx in 0..mesh.elements.len() {
            if Some(elem_idx) == mesh.membrane_index {
                continue;
            }
            let source_idx = mesh.element_sources.len();
            let mut source = FluidSource::new(source_idx, mesh.centroid_of(elem_idx));
            source.associated_element = Some(elem_idx);
            mesh.element_sources.push(source);
            mesh.elements[elem_idx].fluid_source = Some(source_idx);
        }

        // Balancing sources along the midline y = 0, every 4 grid spacings,
        // starting half a grid spacing in from the left end
        let spacing = BALANCING_SOURCE_SPACING_CELLS / num_grid_pts_x as f64;
        let mut location = spacing / 8.0;
        while location < 1.0 {
            let idx = mesh.balancing_sources.len();
            mesh.balancing_sources
                .push(FluidSource::new(idx, DVec2::new(location, 0.0)));
            location += spacing;
        }

        Ok(mesh)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn element(&self, index: usize) -> &Element {
        &self.elements[index]
    }

    pub fn element_mut(&mut self, index: usize) -> &mut Element {
        &mut self.elements[index]
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub(crate) fn push_node(&mut self, node: Node) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(node);
        idx
    }

    pub(crate) fn push_element(&mut self, element: Element) -> usize {
        let idx = self.elements.len();
        self.elements.push(element);
        idx
    }

    pub(crate) fn push_element_source(&mut self, source: FluidSource) -> usize {
        let idx = self.element_sources.len();
        self.element_sources.push(source);
        idx
    }

    pub fn element_sources(&self) -> &[FluidSource] {
        &self.element_sources
    }

    pub fn element_sources_mut(&mut self) -> &mut [FluidSource] {
        &mut self.element_sources
    }

    pub fn balancing_sources(&self) -> &[FluidSource] {
        &self.balancing_sources
    }

    pub fn membrane_index(&self) -> Option<usize> {
        self.membrane_index
    }

    pub fn is_membrane_element(&self, index: usize) -> bool {
        Some(index) == self.membrane_index
    }

    pub fn num_grid_pts_x(&self) -> usize {
        self.num_grid_pts_x
    }

    pub fn num_grid_pts_y(&self) -> usize {
        self.num_grid_pts_y
    }

    pub fn grid_spacing_x(&self) -> f64 {
        1.0 / self.num_grid_pts_x as f64
    }

    pub fn grid_spacing_y(&self) -> f64 {
        1.0 / self.num_grid_pts_y as f64
    }

    /// Resize all four grids to `n` x `n`, discarding their contents.
    pub fn set_num_grid_pts(&mut self, n: usize) -> Result<()> {
        validate_grid_dim("grid points", n)?;
        self.num_grid_pts_x = n;
        self.num_grid_pts_y = n;
        self.u = Array2::zeros((n, n));
        self.v = Array2::zeros((n, n));
        self.force_x = Array2::zeros((n, n));
        self.force_y = Array2::zeros((n, n));
        Ok(())
    }

    pub fn characteristic_node_spacing(&self) -> f64 {
        self.characteristic_node_spacing
    }

    /// Node spacing relative to the grid spacing; the dimensionless ratio
    /// controlling the quality of force spreading.
    pub fn spacing_ratio(&self) -> f64 {
        self.characteristic_node_spacing * self.num_grid_pts_x as f64
    }

    pub fn element_division_spacing(&self) -> Option<f64> {
        self.element_division_spacing
    }

    pub fn set_element_division_spacing(&mut self, spacing: f64) {
        self.element_division_spacing = Some(spacing);
    }

    /// Location of a node by global index.
    pub fn node_location(&self, index: usize) -> DVec2 {
        self.nodes[index].location
    }

    /// Location of the `local`-th node of an element.
    fn elem_node_location(&self, elem_idx: usize, local: usize) -> DVec2 {
        let elem = &self.elements[elem_idx];
        self.nodes[elem.node_indices[local % elem.num_nodes()]].location
    }

    /// Area enclosed by an element, by the shoelace formula over torus
    /// shortest-vector edges from node 0. Always non-negative.
    pub fn volume_of(&self, elem_idx: usize) -> f64 {
        let num_nodes = self.elements[elem_idx].num_nodes();
        let first = self.elem_node_location(elem_idx, 0);

        let mut volume = 0.0;
        let mut pos_1 = DVec2::ZERO;
        for local in 0..num_nodes {
            let pos_2 = torus::vector_from(first, self.elem_node_location(elem_idx, local + 1));
            volume += 0.5 * (pos_1.x * pos_2.y - pos_2.x * pos_1.y);
            pos_1 = pos_2;
        }

        volume.abs()
    }

    /// Perimeter of an element: sum of torus distances between consecutive
    /// nodes.
    pub fn surface_area_of(&self, elem_idx: usize) -> f64 {
        let num_nodes = self.elements[elem_idx].num_nodes();
        let mut surface_area = 0.0;
        for local in 0..num_nodes {
            surface_area += torus::distance(
                self.elem_node_location(elem_idx, local),
                self.elem_node_location(elem_idx, local + 1),
            );
        }
        surface_area
    }

    /// Average node spacing of an element, cached on the element until a
    /// recomputation is requested.
    pub fn average_node_spacing_of(&mut self, elem_idx: usize, recompute: bool) -> f64 {
        if recompute || self.elements[elem_idx].average_node_spacing.is_none() {
            let spacing =
                self.surface_area_of(elem_idx) / self.elements[elem_idx].num_nodes() as f64;
            self.elements[elem_idx].average_node_spacing = Some(spacing);
            spacing
        } else {
            self.elements[elem_idx].average_node_spacing.unwrap_or(0.0)
        }
    }

    /// Polygon centroid with shoelace weights, expressed relative to node 0
    /// and mapped back into [0,1)^2. The membrane element has no meaningful
    /// centroid and reports the origin.
    pub fn centroid_of(&self, elem_idx: usize) -> DVec2 {
        if self.is_membrane_element(elem_idx) {
            return DVec2::ZERO;
        }

        let num_nodes = self.elements[elem_idx].num_nodes();
        let first = self.elem_node_location(elem_idx, 0);

        let mut centroid = DVec2::ZERO;
        let mut signed_area = 0.0;
        let mut pos_1 = DVec2::ZERO;
        for local in 0..num_nodes {
            let pos_2 = torus::vector_from(first, self.elem_node_location(elem_idx, local + 1));
            let signed_area_term = pos_1.x * pos_2.y - pos_1.y * pos_2.x;
            centroid += (pos_1 + pos_2) * signed_area_term;
            signed_area += 0.5 * signed_area_term;
            pos_1 = pos_2;
        }

        torus::wrap(first + centroid / (6.0 * signed_area))
    }

    /// Second moments of area about the centroid, sign-corrected so that
    /// `ixx >= 0` even when the node ordering traces the polygon clockwise.
    pub fn moments_of(&self, elem_idx: usize) -> Moments {
        let num_nodes = self.elements[elem_idx].num_nodes();
        let centroid = self.centroid_of(elem_idx);

        let mut ixx = 0.0;
        let mut iyy = 0.0;
        let mut ixy = 0.0;

        let mut pos_1 = torus::vector_from(centroid, self.elem_node_location(elem_idx, 0));
        for local in 0..num_nodes {
            let pos_2 = torus::vector_from(centroid, self.elem_node_location(elem_idx, local + 1));
            let signed_area_term = pos_1.x * pos_2.y - pos_2.x * pos_1.y;

            ixx += (pos_1.y * pos_1.y + pos_1.y * pos_2.y + pos_2.y * pos_2.y) * signed_area_term;
            iyy += (pos_1.x * pos_1.x + pos_1.x * pos_2.x + pos_2.x * pos_2.x) * signed_area_term;
            ixy += (pos_1.x * pos_2.y
                + 2.0 * pos_1.x * pos_1.y
                + 2.0 * pos_2.x * pos_2.y
                + pos_2.x * pos_1.y)
                * signed_area_term;

            pos_1 = pos_2;
        }

        ixx /= 12.0;
        iyy /= 12.0;
        ixy /= 24.0;

        if ixx < 0.0 {
            ixx = -ixx;
            iyy = -iyy;
            ixy = -ixy;
        }

        Moments { ixx, iyy, ixy }
    }

    /// Unit eigenvector of the inertia tensor for the larger eigenvalue.
    ///
    /// When the principal moments coincide (discriminant below tolerance)
    /// every axis through the centroid is principal, so a unit vector drawn
    /// uniformly on the circle is returned instead.
    pub fn short_axis_of(&self, elem_idx: usize) -> DVec2 {
        let m = self.moments_of(elem_idx);

        let discriminant = (m.ixx - m.iyy) * (m.ixx - m.iyy) + 4.0 * m.ixy * m.ixy;
        if discriminant.abs() < DEGENERATE_AXIS_TOLERANCE {
            let [x, y]: [f64; 2] = rand::thread_rng().sample(UnitCircle);
            return DVec2::new(x, y);
        }

        if m.ixy == 0.0 {
            // Coordinate axes are the principal axes
            return if m.ixx < m.iyy {
                DVec2::new(0.0, 1.0)
            } else {
                DVec2::new(1.0, 0.0)
            };
        }

        let lambda = 0.5 * (m.ixx + m.iyy + discriminant.sqrt());
        DVec2::new(1.0, (m.ixx - lambda) / m.ixy).normalize()
    }

    /// `sqrt(lambda_max / lambda_min)` of the inertia tensor; 1 for a
    /// perfect circle.
    pub fn elongation_shape_factor(&self, elem_idx: usize) -> f64 {
        let m = self.moments_of(elem_idx);
        let discriminant =
            ((m.ixx - m.iyy) * (m.ixx - m.iyy) + 4.0 * m.ixy * m.ixy).sqrt();
        let largest = 0.5 * (m.ixx + m.iyy + discriminant);
        let smallest = 0.5 * (m.ixx + m.iyy - discriminant);
        (largest / smallest).sqrt()
    }

    /// Ratio of the centroid path length to the straight-line distance
    /// along the sequence of non-membrane element centroids. The straight
    /// distance is clamped to `max(d, 1 - d)` to respect the torus.
    pub fn tortuosity(&self) -> f64 {
        let cell_indices: Vec<usize> = (0..self.elements.len())
            .filter(|&idx| !self.is_membrane_element(idx))
            .collect();

        let Some((&first_idx, rest)) = cell_indices.split_first() else {
            return 0.0;
        };

        let mut total_length = 0.0;
        let mut previous = self.centroid_of(first_idx);
        for &elem_idx in rest {
            let centroid = self.centroid_of(elem_idx);
            total_length += torus::distance(previous, centroid);
            previous = centroid;
        }

        let first = self.centroid_of(first_idx);
        let straight = torus::distance(first, previous);
        total_length / straight.max(1.0 - straight)
    }

    /// Axis-aligned bounding box taken relative to node 0 via shortest
    /// vectors, returned as `(min, max)`.
    pub fn bounding_box(&self, elem_idx: usize) -> (DVec2, DVec2) {
        let ref_point = self.elem_node_location(elem_idx, 0);

        let mut bottom_left = DVec2::ZERO;
        let mut top_right = DVec2::ZERO;
        for local in 0..self.elements[elem_idx].num_nodes() {
            let to_node = torus::vector_from(ref_point, self.elem_node_location(elem_idx, local));
            bottom_left = bottom_left.min(to_node);
            top_right = top_right.max(to_node);
        }

        (bottom_left + ref_point, top_right + ref_point)
    }

    /// Set balancing source strengths so total injection over all sources
    /// is zero.
    pub fn balance_fluid_sources(&mut self) {
        if self.balancing_sources.is_empty() {
            return;
        }
        let total: f64 = self.element_sources.iter().map(|s| s.strength).sum();
        let per_source = -total / self.balancing_sources.len() as f64;
        for source in &mut self.balancing_sources {
            source.strength = per_source;
        }
    }

    /// Zero every node's applied force and both force grids.
    pub fn clear_forces(&mut self) {
        for node in &mut self.nodes {
            node.clear_applied_force();
        }
        self.force_x.fill(0.0);
        self.force_y.fill(0.0);
    }
}

fn validate_grid_dim(name: &str, n: usize) -> Result<()> {
    if n == 0 || n % 2 != 0 {
        return Err(SimulationError::Config(format!(
            "{name} must be a positive even integer, got {n}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Superellipse;

    /// Single unit-square-ish element mesh used across the mesh tests.
    fn square_mesh(offset: DVec2, side: f64) -> Mesh {
        let corners = [
            DVec2::new(0.0, 0.0),
            DVec2::new(side, 0.0),
            DVec2::new(side, side),
            DVec2::new(0.0, side),
        ];
        let nodes: Vec<Node> = corners
            .iter()
            .enumerate()
            .map(|(i, &c)| Node::new(i, torus::wrap(offset + c), true))
            .collect();
        let element = Element::new(0, vec![0, 1, 2, 3]);
        Mesh::new(nodes, vec![element], 32, 32, None).unwrap()
    }

    fn circle_mesh(num_nodes: usize) -> Mesh {
        let gen = Superellipse::new(num_nodes, 1.0, 0.4, 0.4, DVec2::new(0.3, 0.3)).unwrap();
        let nodes: Vec<Node> = gen
            .generate()
            .into_iter()
            .enumerate()
            .map(|(i, loc)| Node::new(i, loc, true))
            .collect();
        let element = Element::new(0, (0..num_nodes).collect());
        Mesh::new(nodes, vec![element], 64, 64, None).unwrap()
    }

    #[test]
    fn test_grid_dims_must_be_positive_and_even() {
        let nodes = vec![
            Node::new(0, DVec2::new(0.1, 0.1), true),
            Node::new(1, DVec2::new(0.2, 0.1), true),
            Node::new(2, DVec2::new(0.15, 0.2), true),
        ];
        let elements = vec![Element::new(0, vec![0, 1, 2])];
        assert!(matches!(
            Mesh::new(nodes.clone(), elements.clone(), 31, 32, None),
            Err(SimulationError::Config(_))
        ));
        assert!(matches!(
            Mesh::new(nodes, elements, 32, 0, None),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn test_square_volume_and_surface_area() {
        let mesh = square_mesh(DVec2::new(0.2, 0.2), 0.3);
        assert!((mesh.volume_of(0) - 0.09).abs() < 1e-12);
        assert!((mesh.surface_area_of(0) - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_volume_matches_shoelace_sum() {
        let mesh = circle_mesh(64);
        // Independent shoelace computation on unwrapped coordinates
        let locations: Vec<DVec2> = (0..64).map(|i| mesh.node_location(i)).collect();
        let mut shoelace = 0.0;
        for i in 0..locations.len() {
            let a = locations[i];
            let b = locations[(i + 1) % locations.len()];
            shoelace += a.x * b.y - b.x * a.y;
        }
        assert!((mesh.volume_of(0) - 0.5 * shoelace.abs()).abs() < 1e-12);
    }

    #[test]
    fn test_volume_invariant_under_wrap_translation() {
        let near_seam = square_mesh(DVec2::new(0.9, 0.4), 0.2);
        let interior = square_mesh(DVec2::new(0.4, 0.4), 0.2);
        assert!((near_seam.volume_of(0) - interior.volume_of(0)).abs() < 1e-10);
    }

    #[test]
    fn test_centroid_of_wrapped_square() {
        let mesh = square_mesh(DVec2::new(0.9, 0.9), 0.2);
        let centroid = mesh.centroid_of(0);
        assert!((centroid.x - 0.0).abs() < 1e-12 || (centroid.x - 1.0).abs() < 1e-12);
        assert!((centroid.y - 0.0).abs() < 1e-12 || (centroid.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_moments_sign_convention() {
        let mesh = square_mesh(DVec2::new(0.2, 0.2), 0.3);
        let m = mesh.moments_of(0);
        assert!(m.ixx >= 0.0);
        // Square: Ixx == Iyy, Ixy == 0
        assert!((m.ixx - m.iyy).abs() < 1e-12);
        assert!(m.ixy.abs() < 1e-12);

        // Clockwise node order flips the raw signs; the correction restores them
        let corners = [
            DVec2::new(0.2, 0.2),
            DVec2::new(0.2, 0.5),
            DVec2::new(0.5, 0.5),
            DVec2::new(0.5, 0.2),
        ];
        let nodes: Vec<Node> = corners
            .iter()
            .enumerate()
            .map(|(i, &c)| Node::new(i, c, true))
            .collect();
        let clockwise = Mesh::new(nodes, vec![Element::new(0, vec![0, 1, 2, 3])], 32, 32, None)
            .unwrap();
        let mc = clockwise.moments_of(0);
        assert!(mc.ixx >= 0.0);
        assert!((mc.ixx - m.ixx).abs() < 1e-12);
    }

    #[test]
    fn test_elongation_shape_factor_of_circle_is_one() {
        let mesh = circle_mesh(64);
        let esf = mesh.elongation_shape_factor(0);
        assert!((esf - 1.0).abs() <= 1e-3, "circle esf should be 1, got {esf}");
    }

    #[test]
    fn test_elongation_shape_factor_of_ellipse() {
        let gen = Superellipse::new(128, 1.0, 0.4, 0.6, DVec2::new(0.3, 0.2)).unwrap();
        let nodes: Vec<Node> = gen
            .generate()
            .into_iter()
            .enumerate()
            .map(|(i, loc)| Node::new(i, loc, true))
            .collect();
        let mesh = Mesh::new(nodes, vec![Element::new(0, (0..128).collect())], 32, 32, None)
            .unwrap();
        // For a 2:3 ellipse the eigenvalue ratio is (b/a)^2, so esf = 1.5
        let esf = mesh.elongation_shape_factor(0);
        assert!((esf - 1.5).abs() < 0.02, "ellipse esf should be ~1.5, got {esf}");
    }

    #[test]
    fn test_short_axis_of_ellipse_is_vertical() {
        let gen = Superellipse::new(128, 1.0, 0.6, 0.3, DVec2::new(0.2, 0.3)).unwrap();
        let nodes: Vec<Node> = gen
            .generate()
            .into_iter()
            .enumerate()
            .map(|(i, loc)| Node::new(i, loc, true))
            .collect();
        let mesh = Mesh::new(nodes, vec![Element::new(0, (0..128).collect())], 32, 32, None)
            .unwrap();
        // Wide shape: larger principal moment about y-axis bends the short
        // axis onto the vertical
        let axis = mesh.short_axis_of(0);
        assert!(
            axis.y.abs() > 0.99,
            "short axis of a wide ellipse should be vertical, got {axis:?}"
        );
    }

    #[test]
    fn test_short_axis_degenerate_returns_unit_vector() {
        let mesh = circle_mesh(128);
        let axis = mesh.short_axis_of(0);
        assert!((axis.length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_node_spacing_cache() {
        let mut mesh = circle_mesh(64);
        let fresh = mesh.average_node_spacing_of(0, false);
        assert!((fresh - mesh.surface_area_of(0) / 64.0).abs() < 1e-12);

        // Move a node; cached value survives until recompute is requested
        mesh.node_mut(0).location += DVec2::new(0.01, 0.0);
        let cached = mesh.average_node_spacing_of(0, false);
        assert_eq!(fresh, cached);
        let recomputed = mesh.average_node_spacing_of(0, true);
        assert!(recomputed != fresh);
    }

    #[test]
    fn test_bounding_box_straddling_seam() {
        let mesh = square_mesh(DVec2::new(0.9, 0.4), 0.2);
        let (min, max) = mesh.bounding_box(0);
        assert!((max.x - min.x - 0.2).abs() < 1e-12);
        assert!((max.y - min.y - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_characteristic_spacing_and_ratio() {
        let mesh = circle_mesh(64);
        let expected = mesh.surface_area_of(0) / 64.0;
        assert!((mesh.characteristic_node_spacing() - expected).abs() < 1e-12);
        assert!((mesh.spacing_ratio() - expected * 64.0).abs() < 1e-12);
    }

    #[test]
    fn test_fluid_sources_created_at_centroids() {
        let mesh = circle_mesh(32);
        assert_eq!(mesh.element_sources().len(), 1);
        let source = &mesh.element_sources()[0];
        assert_eq!(source.associated_element, Some(0));
        assert!((source.location - mesh.centroid_of(0)).length() < 1e-12);
        assert_eq!(source.strength, 0.0);

        // Balancing row: every 4 grid spacings across the unit interval
        assert_eq!(mesh.balancing_sources().len(), 16);
        assert!(mesh.balancing_sources().iter().all(|s| s.location.y == 0.0));
    }

    #[test]
    fn test_balance_fluid_sources_zeroes_net_injection() {
        let mut mesh = circle_mesh(32);
        mesh.element_sources_mut()[0].strength = 2.0;
        mesh.balance_fluid_sources();
        let balancing_total: f64 = mesh.balancing_sources().iter().map(|s| s.strength).sum();
        assert!((balancing_total + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_tortuosity_of_two_cells() {
        let mut nodes = Vec::new();
        let mut elements = Vec::new();
        for (elem_idx, centre) in [DVec2::new(0.25, 0.5), DVec2::new(0.75, 0.5)]
            .iter()
            .enumerate()
        {
            let base = nodes.len();
            let gen =
                Superellipse::new(32, 1.0, 0.2, 0.2, *centre - DVec2::splat(0.1)).unwrap();
            for (i, loc) in gen.generate().into_iter().enumerate() {
                nodes.push(Node::new(base + i, loc, true));
            }
            elements.push(Element::new(elem_idx, (base..base + 32).collect()));
        }
        let mesh = Mesh::new(nodes, elements, 32, 32, None).unwrap();
        // Two centroids: path length equals straight distance, after the
        // torus clamp both are max(0.5, 0.5)
        assert!((mesh.tortuosity() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_num_grid_pts_resizes_grids() {
        let mut mesh = circle_mesh(32);
        mesh.set_num_grid_pts(16).unwrap();
        assert_eq!(mesh.u.dim(), (16, 16));
        assert_eq!(mesh.force_y.dim(), (16, 16));
        assert!(mesh.set_num_grid_pts(15).is_err());
    }
}
