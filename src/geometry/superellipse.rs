//! Superellipse boundary generator.
//!
//! Generates the initial outline of a cell as `num_points` locations spaced
//! equally in arc length around the superellipse
//!
//!   |2(x - cx)/w|^n + |2(y - cy)/h|^n = 1
//!
//! where n is the exponent (n = 1 gives an ellipse, larger n approaches a
//! rectangle). Points are produced anticlockwise starting from the
//! rightmost point of the curve.

use glam::DVec2;

use crate::error::{Result, SimulationError};

/// Dense samples per requested output point when measuring arc length.
const SAMPLES_PER_POINT: usize = 64;

/// Superellipse outline generator.
#[derive(Debug, Clone)]
pub struct Superellipse {
    /// Number of output points
    pub num_points: usize,
    /// Superellipse exponent (1.0 = ellipse)
    pub exponent: f64,
    /// Total width of the shape
    pub width: f64,
    /// Total height of the shape
    pub height: f64,
    /// Bottom-left corner of the bounding box
    pub bottom_left: DVec2,
}

impl Superellipse {
    pub fn new(
        num_points: usize,
        exponent: f64,
        width: f64,
        height: f64,
        bottom_left: DVec2,
    ) -> Result<Self> {
        if num_points < 3 {
            return Err(SimulationError::Config(format!(
                "superellipse needs at least 3 points, got {num_points}"
            )));
        }
        if exponent <= 0.0 || width <= 0.0 || height <= 0.0 {
            return Err(SimulationError::Config(
                "superellipse exponent, width and height must be positive".into(),
            ));
        }
        Ok(Self {
            num_points,
            exponent,
            width,
            height,
            bottom_left,
        })
    }

    /// Parametric point at angle t, before arc-length correction.
    fn point_at(&self, t: f64) -> DVec2 {
        let p = 2.0 / self.exponent;
        let (s, c) = t.sin_cos();
        let x = c.abs().powf(p).copysign(c);
        let y = s.abs().powf(p).copysign(s);
        let centre = self.bottom_left + 0.5 * DVec2::new(self.width, self.height);
        centre + DVec2::new(0.5 * self.width * x, 0.5 * self.height * y)
    }

    /// Generate the outline as points equally spaced in arc length.
    pub fn generate(&self) -> Vec<DVec2> {
        let dense = self.num_points * SAMPLES_PER_POINT;

        // Cumulative arc length along a dense sampling of the curve
        let mut samples = Vec::with_capacity(dense + 1);
        let mut arc = Vec::with_capacity(dense + 1);
        let mut total = 0.0;
        let mut prev = self.point_at(0.0);
        samples.push(prev);
        arc.push(0.0);
        for i in 1..=dense {
            let t = std::f64::consts::TAU * i as f64 / dense as f64;
            let p = self.point_at(t);
            total += (p - prev).length();
            samples.push(p);
            arc.push(total);
            prev = p;
        }

        // Resample at equal arc-length intervals
        let spacing = total / self.num_points as f64;
        let mut points = Vec::with_capacity(self.num_points);
        let mut cursor = 0;
        for i in 0..self.num_points {
            let target = i as f64 * spacing;
            while arc[cursor + 1] < target {
                cursor += 1;
            }
            let seg = arc[cursor + 1] - arc[cursor];
            let interp = if seg > 0.0 { (target - arc[cursor]) / seg } else { 0.0 };
            points.push(samples[cursor] + interp * (samples[cursor + 1] - samples[cursor]));
        }
        points
    }
}
