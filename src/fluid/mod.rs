//! Spectral fluid solver for the periodic unit square.

pub mod fft;
pub mod solver;

pub use fft::Fft2d;
pub use solver::NavierStokesSolver;
