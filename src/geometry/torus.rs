//! Shortest-vector arithmetic on the doubly-periodic unit square.
//!
//! The whole simulation lives on the torus [0,1) x [0,1). Every distance,
//! bounding box and centroid is built on [`vector_from`], which returns the
//! shortest displacement between two points allowing for wrap-around.

use glam::DVec2;

/// Shortest displacement `v` on the unit torus such that `a + v == b (mod 1)`
/// componentwise.
///
/// For each component: if the direct separation exceeds 0.5 the wrapped
/// image is closer, so the magnitude becomes `1 - |b - a|` with the sign
/// flipped.
pub fn vector_from(a: DVec2, b: DVec2) -> DVec2 {
    let mut v = b - a;
    for dim in 0..2 {
        if v[dim].abs() > 0.5 {
            v[dim] = (v[dim].abs() - 1.0).copysign(-v[dim]);
        }
    }
    v
}

/// Reduce a point to its canonical representative in [0,1)^2.
pub fn wrap(p: DVec2) -> DVec2 {
    DVec2::new(wrap_1d(p.x), wrap_1d(p.y))
}

fn wrap_1d(x: f64) -> f64 {
    let wrapped = if x < 0.0 { x + 1.0 } else { x % 1.0 };
    // A negative value within one ulp of zero lands exactly on 1.0
    if wrapped >= 1.0 {
        wrapped - 1.0
    } else {
        wrapped
    }
}

/// Torus distance between two points.
pub fn distance(a: DVec2, b: DVec2) -> f64 {
    vector_from(a, b).length()
}
