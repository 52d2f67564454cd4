//! Geometric primitives: periodic shortest-vector arithmetic and initial
//! boundary shape generation.

pub mod superellipse;
pub mod torus;

pub use superellipse::Superellipse;
pub use torus::{distance, vector_from, wrap};
