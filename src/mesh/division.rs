//! Element division along an axis through the centroid.
//!
//! Both daughters end up with the same number of nodes as the original
//! element, equally spaced in arc length around their outlines, and
//! separated by the configured division spacing measured perpendicular to
//! the axis of division.

use glam::DVec2;

use super::{Element, FluidSource, Mesh, Node};
use crate::error::{Result, SimulationError};
use crate::geometry::torus;

/// A frontier node selected by the perpendicular walk, together with its
/// location snapped onto the half-spacing offset plane.
struct Frontier {
    local_index: usize,
    snapped_location: DVec2,
}

enum WalkDirection {
    Forward,
    Backward,
}

impl Mesh {
    /// Divide an element along its short axis. Returns the new element's
    /// index.
    pub fn divide_element_along_short_axis(
        &mut self,
        elem_idx: usize,
        place_original_below: bool,
    ) -> Result<usize> {
        let axis = self.short_axis_of(elem_idx);
        self.divide_element_along_axis(elem_idx, axis, place_original_below)
    }

    /// Divide an element along the given axis through its centroid.
    ///
    /// Fails with a `Geometry` error if the axis does not cross exactly two
    /// edges, and with a `DivisionSpacing` error if either half has no node
    /// at perpendicular distance of half the division spacing from the
    /// centroid. On failure the element is left unchanged.
    pub fn divide_element_along_axis(
        &mut self,
        elem_idx: usize,
        axis: DVec2,
        _place_original_below: bool,
    ) -> Result<usize> {
        let centroid = self.centroid_of(elem_idx);
        let perp_axis = DVec2::new(-axis.y, axis.x);

        // The axis crosses an edge wherever consecutive nodes lie on
        // opposite sides of the division line
        let num_nodes = self.element(elem_idx).num_nodes();
        let mut crossing_nodes = Vec::new();
        let mut current_on_left = torus::vector_from(self.elem_location(elem_idx, 0), centroid)
            .dot(perp_axis)
            >= 0.0;
        for i in 0..num_nodes {
            let next_on_left =
                torus::vector_from(self.elem_location(elem_idx, i + 1), centroid).dot(perp_axis)
                    >= 0.0;
            if next_on_left != current_on_left {
                crossing_nodes.push(i);
            }
            current_on_left = next_on_left;
        }

        if crossing_nodes.len() != 2 {
            return Err(SimulationError::Geometry(format!(
                "division axis crosses {} edges of element {elem_idx}, expected 2",
                crossing_nodes.len()
            )));
        }

        self.divide_element(elem_idx, crossing_nodes[0], crossing_nodes[1], centroid, axis)
    }

    fn elem_location(&self, elem_idx: usize, local: usize) -> DVec2 {
        let elem = self.element(elem_idx);
        self.node_location(elem.node_indices[local % elem.num_nodes()])
    }

    /// Walk around one half of the element until a node sits at least half
    /// the division spacing from the centroid, measured along `perp`.
    /// Returns the node and its location snapped exactly onto the offset
    /// plane; does not modify the mesh.
    fn walk_to_frontier(
        &self,
        elem_idx: usize,
        start: usize,
        end: usize,
        direction: WalkDirection,
        centroid: DVec2,
        perp: DVec2,
        half_spacing: f64,
    ) -> Result<Frontier> {
        let num_nodes = self.element(elem_idx).num_nodes();
        let mut i = start;
        while i != end {
            let location = self.elem_location(elem_idx, i);
            let perpendicular_dist = torus::vector_from(centroid, location).dot(perp);

            if perpendicular_dist.abs() >= half_spacing {
                let overshoot =
                    (perpendicular_dist.abs() - half_spacing).copysign(perpendicular_dist);
                return Ok(Frontier {
                    local_index: i,
                    snapped_location: torus::wrap(location - perp * overshoot),
                });
            }

            i = match direction {
                WalkDirection::Forward => (i + 1) % num_nodes,
                WalkDirection::Backward => (i + num_nodes - 1) % num_nodes,
            };
        }
        Err(SimulationError::DivisionSpacing(format!(
            "no node of element {elem_idx} reaches perpendicular distance {half_spacing} \
             from the centroid"
        )))
    }

    fn divide_element(
        &mut self,
        elem_idx: usize,
        node_a: usize,
        node_b: usize,
        centroid: DVec2,
        axis: DVec2,
    ) -> Result<usize> {
        let spacing = self.element_division_spacing().ok_or_else(|| {
            SimulationError::Config("element division spacing has not been set".into())
        })?;
        let half_spacing = 0.5 * spacing;

        let unit_axis = axis.normalize();
        let unit_perp = DVec2::new(-unit_axis.y, unit_axis.x);

        let num_nodes = self.element(elem_idx).num_nodes();

        // Resolve all four frontier walks before moving anything, so a
        // spacing failure leaves the element untouched
        let start_a = self.walk_to_frontier(
            elem_idx,
            (node_a + 1) % num_nodes,
            node_b,
            WalkDirection::Forward,
            centroid,
            unit_perp,
            half_spacing,
        )?;
        let end_a = self.walk_to_frontier(
            elem_idx,
            node_b,
            start_a.local_index,
            WalkDirection::Backward,
            centroid,
            unit_perp,
            half_spacing,
        )?;
        let start_b = self.walk_to_frontier(
            elem_idx,
            (node_b + 1) % num_nodes,
            node_a,
            WalkDirection::Forward,
            centroid,
            unit_perp,
            half_spacing,
        )?;
        let end_b = self.walk_to_frontier(
            elem_idx,
            node_a,
            start_b.local_index,
            WalkDirection::Backward,
            centroid,
            unit_perp,
            half_spacing,
        )?;

        // Snap the frontier nodes onto the offset planes
        for frontier in [&start_a, &end_a, &start_b, &end_b] {
            let node_idx = self.element(elem_idx).node_indices[frontier.local_index];
            self.node_mut(node_idx).location = frontier.snapped_location;
        }

        // Retained locations form the stencil each daughter is resampled from
        let stencil_a =
            self.location_stencil(elem_idx, start_a.local_index, end_a.local_index);
        let stencil_b =
            self.location_stencil(elem_idx, start_b.local_index, end_b.local_index);

        let samples_a = resample_stencil(&stencil_a, num_nodes);
        let samples_b = resample_stencil(&stencil_b, num_nodes);

        // The original element's nodes move onto daughter A's samples
        for (local, location) in samples_a.into_iter().enumerate() {
            let node_idx = self.element(elem_idx).node_indices[local];
            self.node_mut(node_idx).location = location;
        }

        // Fresh nodes are allocated for daughter B, copying region and
        // attributes index-wise from the original element's nodes
        let new_elem_idx = self.num_elements();
        let mut new_node_indices = Vec::with_capacity(num_nodes);
        for (local, location) in samples_b.into_iter().enumerate() {
            let template_idx = self.element(elem_idx).node_indices[local];
            let region = self.node(template_idx).region;
            let attributes = self.node(template_idx).attributes.clone();

            let new_idx = self.num_nodes();
            let mut node = Node::new(new_idx, location, true);
            node.region = region;
            node.attributes = attributes;
            node.add_element(new_elem_idx);
            self.push_node(node);
            new_node_indices.push(new_idx);
        }

        // Build the daughter element, duplicating element data
        let mut new_element = Element::new(new_elem_idx, new_node_indices);
        {
            let original = self.element(elem_idx);
            new_element.attributes = original.attributes.clone();
            new_element.corner_nodes = original.corner_nodes.clone();
            new_element.membrane_spring_constant = original.membrane_spring_constant;
            new_element.membrane_rest_length = original.membrane_rest_length;
        }
        self.push_element(new_element);
        self.element_mut(elem_idx).average_node_spacing = None;

        // Relocate the original element's source and create one for the
        // daughter at its new centroid
        let original_centroid = self.centroid_of(elem_idx);
        if let Some(source_idx) = self.element(elem_idx).fluid_source {
            self.element_sources_mut()[source_idx].location = original_centroid;
        }
        let new_centroid = self.centroid_of(new_elem_idx);
        let source_idx = {
            let next = self.element_sources().len();
            let mut source = FluidSource::new(next, new_centroid);
            source.associated_element = Some(new_elem_idx);
            self.push_element_source(source)
        };
        self.element_mut(new_elem_idx).fluid_source = Some(source_idx);

        Ok(new_elem_idx)
    }

    /// Locations from `start` to `end` inclusive, walking forward around
    /// the ring.
    fn location_stencil(&self, elem_idx: usize, start: usize, end: usize) -> Vec<DVec2> {
        let num_nodes = self.element(elem_idx).num_nodes();
        let mut stencil = Vec::new();
        let mut local = start;
        loop {
            stencil.push(self.elem_location(elem_idx, local));
            if local == end {
                break;
            }
            local = (local + 1) % num_nodes;
        }
        stencil
    }
}

/// Resample a closed outline stencil to `num_points` locations equally
/// spaced in arc length, measuring distances on the torus.
fn resample_stencil(stencil: &[DVec2], num_points: usize) -> Vec<DVec2> {
    // Close the outline for cumulative-distance bookkeeping
    let mut closed = stencil.to_vec();
    closed.push(stencil[0]);

    let mut cumulative = Vec::with_capacity(closed.len());
    cumulative.push(0.0);
    for i in 1..closed.len() {
        let step = torus::distance(closed[i - 1], closed[i]);
        cumulative.push(cumulative[i - 1] + step);
    }
    let total = cumulative[cumulative.len() - 1];
    let target_spacing = total / num_points as f64;

    let mut samples = Vec::with_capacity(num_points);
    let mut last_idx = 0;
    for point in 0..num_points {
        let along_arc = point as f64 * target_spacing;
        while along_arc > cumulative[last_idx + 1] {
            last_idx += 1;
        }

        let segment = cumulative[last_idx + 1] - cumulative[last_idx];
        let interpolant = if segment > 0.0 {
            (along_arc - cumulative[last_idx]) / segment
        } else {
            0.0
        };
        let this_to_next = torus::vector_from(closed[last_idx], closed[last_idx + 1]);
        samples.push(torus::wrap(closed[last_idx] + interpolant * this_to_next));
    }
    samples
}
