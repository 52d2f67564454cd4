//! Two-dimensional complex FFT used by the spectral solver.
//!
//! Transforms are unnormalised in the forward direction; the inverse
//! divides by `Nx * Ny` so a forward/inverse round trip is the identity.
//! Plans come from a fresh planner on every call, and the row/column
//! passes are fanned out on a dedicated thread pool whose size is chosen
//! at construction.

use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

use crate::error::{Result, SimulationError};

pub struct Fft2d {
    num_y: usize,
    num_x: usize,
    pool: rayon::ThreadPool,
}

impl Fft2d {
    /// Create a transform for `num_y` x `num_x` grids with the given
    /// worker thread count. Pool construction failure is fatal.
    pub fn new(num_y: usize, num_x: usize, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(SimulationError::Config(
                "fft_threads must be positive".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| {
                SimulationError::Numeric(format!("failed to initialise FFT thread pool: {e}"))
            })?;
        Ok(Self { num_y, num_x, pool })
    }

    pub fn num_y(&self) -> usize {
        self.num_y
    }

    pub fn num_x(&self) -> usize {
        self.num_x
    }

    /// Forward transform of a real row-major grid.
    pub fn forward(&self, input: &[f64]) -> Vec<Complex64> {
        let mut data: Vec<Complex64> = input.iter().map(|&re| Complex64::new(re, 0.0)).collect();
        self.transform(&mut data, FftDirection::Forward);
        data
    }

    /// Inverse transform, returning the real part normalised by
    /// `Nx * Ny`.
    pub fn inverse(&self, mut data: Vec<Complex64>) -> Vec<f64> {
        self.transform(&mut data, FftDirection::Inverse);
        let norm = (self.num_x * self.num_y) as f64;
        data.into_iter().map(|c| c.re / norm).collect()
    }

    /// In-place 2-D transform: FFT along rows, then along columns via a
    /// pair of transposes.
    fn transform(&self, data: &mut Vec<Complex64>, direction: FftDirection) {
        let mut planner = FftPlanner::new();

        let row_fft = planner.plan_fft(self.num_x, direction);
        self.pool.install(|| {
            data.par_chunks_mut(self.num_x)
                .for_each(|row| row_fft.process(row));
        });

        let mut transposed = transpose(data, self.num_y, self.num_x);
        let col_fft = planner.plan_fft(self.num_y, direction);
        self.pool.install(|| {
            transposed
                .par_chunks_mut(self.num_y)
                .for_each(|col| col_fft.process(col));
        });

        *data = transpose(&transposed, self.num_x, self.num_y);
    }
}

/// Transpose a `rows` x `cols` row-major buffer.
fn transpose(src: &[Complex64], rows: usize, cols: usize) -> Vec<Complex64> {
    let mut dst = vec![Complex64::new(0.0, 0.0); src.len()];
    for r in 0..rows {
        for c in 0..cols {
            dst[c * rows + r] = src[r * cols + c];
        }
    }
    dst
}
