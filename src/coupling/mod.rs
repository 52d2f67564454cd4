//! Bidirectional coupling between Lagrangian nodes and the Eulerian grid.
//!
//! A single regularised delta function is used in both directions: node
//! forces are spread onto the force grids before the fluid solve, and grid
//! velocities are interpolated back to the nodes afterwards. Both
//! directions use the same 4x4 stencil and weights, which keeps the
//! coupling conservative.

use glam::DVec2;
use ndarray::Array2;

use crate::mesh::Mesh;

/// One-dimensional regularised delta: `(1 + cos(pi d / 2h)) / 4h` for
/// `d <= 2h`, zero beyond. The four stencil weights at spacing `h` sum to
/// `1/h` for any offset.
pub fn delta_1d(dist: f64, spacing: f64) -> f64 {
    if dist > 2.0 * spacing {
        return 0.0;
    }
    0.25 * (1.0 + (std::f64::consts::PI * dist / (2.0 * spacing)).cos()) / spacing
}

/// The 4x4 stencil around a location: lower-left grid index and, per
/// dimension, the (wrapped index, unwrapped distance) of each stencil line.
fn stencil_1d(coordinate: f64, spacing: f64, num_pts: usize) -> [(usize, f64); 4] {
    let first_idx = (coordinate / spacing).floor() as i64 - 1;
    std::array::from_fn(|offset| {
        let idx = first_idx + offset as i64;
        let dist = (idx as f64 * spacing - coordinate).abs();
        let wrapped = idx.rem_euclid(num_pts as i64) as usize;
        (wrapped, dist)
    })
}

/// Spread every node's applied force onto the mesh force grids.
///
/// Each contribution is weighted by the product of the two 1-D deltas and
/// the characteristic node spacing `dl`, and indices wrap around the
/// periodic grid.
pub fn spread_forces(mesh: &mut Mesh) {
    let spacing_x = mesh.grid_spacing_x();
    let spacing_y = mesh.grid_spacing_y();
    let num_x = mesh.num_grid_pts_x();
    let num_y = mesh.num_grid_pts_y();
    let dl = mesh.characteristic_node_spacing();

    let contributions: Vec<(DVec2, DVec2)> = mesh
        .nodes()
        .iter()
        .map(|node| (node.location, node.applied_force))
        .collect();

    for (location, force) in contributions {
        let stencil_x = stencil_1d(location.x, spacing_x, num_x);
        let stencil_y = stencil_1d(location.y, spacing_y, num_y);

        for &(x_idx, dist_x) in &stencil_x {
            let weight_x = delta_1d(dist_x, spacing_x);
            for &(y_idx, dist_y) in &stencil_y {
                let weight = weight_x * delta_1d(dist_y, spacing_y) * dl;
                mesh.force_x[[y_idx, x_idx]] += force.x * weight;
                mesh.force_y[[y_idx, x_idx]] += force.y * weight;
            }
        }
    }
}

/// Interpolate the grid velocity at one location.
///
/// The same stencil and weights as [`spread_forces`], with the node
/// spacing factor replaced by the cell area `dx * dy`, making the result a
/// proper area-weighted average of the surrounding grid velocities.
pub fn interpolate_velocity(
    u: &Array2<f64>,
    v: &Array2<f64>,
    location: DVec2,
    spacing_x: f64,
    spacing_y: f64,
) -> DVec2 {
    let (num_y, num_x) = u.dim();
    let cell_area = spacing_x * spacing_y;

    let stencil_x = stencil_1d(location.x, spacing_x, num_x);
    let stencil_y = stencil_1d(location.y, spacing_y, num_y);

    let mut velocity = DVec2::ZERO;
    for &(x_idx, dist_x) in &stencil_x {
        let weight_x = delta_1d(dist_x, spacing_x);
        for &(y_idx, dist_y) in &stencil_y {
            let weight = weight_x * delta_1d(dist_y, spacing_y) * cell_area;
            velocity.x += u[[y_idx, x_idx]] * weight;
            velocity.y += v[[y_idx, x_idx]] * weight;
        }
    }
    velocity
}

/// Interpolate new velocities for every node from the mesh velocity grids.
pub fn interpolate_node_velocities(mesh: &Mesh) -> Vec<DVec2> {
    let spacing_x = mesh.grid_spacing_x();
    let spacing_y = mesh.grid_spacing_y();
    mesh.nodes()
        .iter()
        .map(|node| interpolate_velocity(&mesh.u, &mesh.v, node.location, spacing_x, spacing_y))
        .collect()
}
