//! Skewness of an element's mass distribution about an axis.
//!
//! The polygon is rotated so the axis becomes vertical and the length of
//! each vertical chord through a node becomes the value of a
//! piecewise-linear mass pdf along the rotated x-axis. Integrating that pdf
//! exactly yields the first three moments and hence the third standardised
//! moment, used as an asymmetry measure.

use std::sync::Once;

use glam::DVec2;

use super::Mesh;
use crate::error::{Result, SimulationError};
use crate::geometry::torus;

static CONCAVITY_WARNING: Once = Once::new();

impl Mesh {
    /// Skewness of the mass distribution of an element perpendicular to
    /// `axis`.
    ///
    /// If the vertical through some node crosses the polygon more than
    /// twice (a concavity) the outermost two intersections are used and a
    /// one-shot warning is emitted.
    pub fn skewness_of_mass_distribution(&self, elem_idx: usize, axis: DVec2) -> Result<f64> {
        let num_nodes = self.element(elem_idx).num_nodes();
        let area = self.volume_of(elem_idx);
        let centroid = self.centroid_of(elem_idx);

        // Rotation taking the axis onto the vertical
        let unit_axis = axis.normalize();
        let sin_theta = unit_axis.x;
        let cos_theta = unit_axis.y;

        // Node locations relative to the centroid, rotated
        let rotated: Vec<DVec2> = self
            .element(elem_idx)
            .node_indices
            .iter()
            .map(|&node_idx| {
                let d = torus::vector_from(centroid, self.node_location(node_idx));
                DVec2::new(
                    cos_theta * d.x - sin_theta * d.y,
                    sin_theta * d.x + cos_theta * d.y,
                )
            })
            .collect();

        // The same locations ordered left to right
        let mut order: Vec<usize> = (0..num_nodes).collect();
        order.sort_by(|&a, &b| rotated[a].x.total_cmp(&rotated[b].x));

        // For each station, every y where the vertical meets the polygon
        let mut chord_lengths = Vec::with_capacity(num_nodes);
        for &this_idx in &order {
            let this_location = rotated[this_idx];
            let mut knots = vec![this_location.y];

            let next_idx = (this_idx + 1) % num_nodes;
            let mut to_previous = rotated[next_idx] - this_location;
            for step in (this_idx + 2)..(this_idx + num_nodes) {
                let to_next = rotated[step % num_nodes] - this_location;

                // Sign change in x means this edge crosses the vertical
                if to_previous.x * to_next.x <= 0.0 {
                    let interp = to_previous.x / (to_previous.x - to_next.x);
                    knots.push(
                        this_location.y + to_previous.y + interp * (to_next.y - to_previous.y),
                    );
                }
                to_previous = to_next;
            }

            if knots.len() > 2 {
                CONCAVITY_WARNING.call_once(|| {
                    log::warn!(
                        "axis intersects element {elem_idx} more than twice (concavity); \
                         using the outermost two intersections"
                    );
                });
            }

            knots.sort_by(f64::total_cmp);
            let chord = match knots.len() {
                1 => 0.0,
                _ => knots[knots.len() - 1] - knots[0],
            };
            chord_lengths.push(chord / area);
        }

        // Integrate the piecewise-linear pdf exactly for E[x^0..3]
        let mut e_x0 = 0.0;
        let mut e_x1 = 0.0;
        let mut e_x2 = 0.0;
        let mut e_x3 = 0.0;
        for i in 1..num_nodes {
            let x0 = rotated[order[i - 1]].x;
            let x1 = rotated[order[i]].x;
            if x1 - x0 <= 0.0 {
                continue;
            }

            let fx0 = chord_lengths[i - 1];
            let fx1 = chord_lengths[i];
            let m = (fx1 - fx0) / (x1 - x0);
            let c = fx0 - m * x0;

            let p2 = |x: f64| x * x;
            let p3 = |x: f64| x * x * x;
            let p4 = |x: f64| p2(x) * p2(x);
            let p5 = |x: f64| p4(x) * x;

            e_x0 += m * (p2(x1) - p2(x0)) / 2.0 + c * (x1 - x0);
            e_x1 += m * (p3(x1) - p3(x0)) / 3.0 + c * (p2(x1) - p2(x0)) / 2.0;
            e_x2 += m * (p4(x1) - p4(x0)) / 4.0 + c * (p3(x1) - p3(x0)) / 3.0;
            e_x3 += m * (p5(x1) - p5(x0)) / 5.0 + c * (p4(x1) - p4(x0)) / 4.0;
        }

        if (e_x0 - 1.0).abs() >= 1e-6 {
            return Err(SimulationError::Geometry(format!(
                "mass distribution of element {elem_idx} did not normalise: E[x^0] = {e_x0}"
            )));
        }

        let variance = e_x2 - e_x1 * e_x1;
        let sd = variance.sqrt();
        Ok((e_x3 - 3.0 * e_x1 * variance - e_x1 * e_x1 * e_x1) / (sd * variance))
    }
}
