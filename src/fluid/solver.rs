//! One spectral time step of the periodic 2-D Navier-Stokes equations.
//!
//! Advection is first-order upwind in real space; the implicit viscous
//! solve and the pressure projection both happen in Fourier space using
//! `sin(2 pi k / N)` as the staggered first-derivative symbol and
//! `sin(pi k / N)` for the second derivative. The pressure is gauged to
//! zero at the four modes where its symbol vanishes.

use ndarray::Array2;
use rustfft::num_complex::Complex64;

use super::fft::Fft2d;
use crate::error::{Result, SimulationError};
use crate::mesh::Mesh;

pub struct NavierStokesSolver {
    num_x: usize,
    num_y: usize,
    spacing_x: f64,
    spacing_y: f64,
    reynolds: f64,
    sin_x: Vec<f64>,
    sin_2x: Vec<f64>,
    sin_y: Vec<f64>,
    sin_2y: Vec<f64>,
    fft: Fft2d,
}

impl NavierStokesSolver {
    pub fn new(num_x: usize, num_y: usize, reynolds: f64, fft_threads: usize) -> Result<Self> {
        if reynolds <= 0.0 {
            return Err(SimulationError::Config(format!(
                "Reynolds number must be positive, got {reynolds}"
            )));
        }
        if num_x == 0 || num_x % 2 != 0 || num_y == 0 || num_y % 2 != 0 {
            return Err(SimulationError::Config(format!(
                "grid dimensions must be positive and even, got {num_x} x {num_y}"
            )));
        }

        let spacing_x = 1.0 / num_x as f64;
        let spacing_y = 1.0 / num_y as f64;
        let pi = std::f64::consts::PI;

        let sin_x = (0..num_x).map(|x| (pi * x as f64 * spacing_x).sin()).collect();
        let sin_2x = (0..num_x)
            .map(|x| (2.0 * pi * x as f64 * spacing_x).sin())
            .collect();
        let sin_y = (0..num_y).map(|y| (pi * y as f64 * spacing_y).sin()).collect();
        let sin_2y = (0..num_y)
            .map(|y| (2.0 * pi * y as f64 * spacing_y).sin())
            .collect();

        Ok(Self {
            num_x,
            num_y,
            spacing_x,
            spacing_y,
            reynolds,
            sin_x,
            sin_2x,
            sin_y,
            sin_2y,
            fft: Fft2d::new(num_y, num_x, fft_threads)?,
        })
    }

    pub fn reynolds(&self) -> f64 {
        self.reynolds
    }

    /// Advance the mesh velocity grids by one step of size `dt`, driven by
    /// the mesh force grids.
    pub fn step(&self, mesh: &mut Mesh, dt: f64) -> Result<()> {
        if dt <= 0.0 {
            return Err(SimulationError::Config(format!(
                "time step must be positive, got {dt}"
            )));
        }

        let (advection_u, advection_v) = self.upwind(&mesh.u, &mesh.v);

        // Explicit right-hand side: velocity plus forcing minus advection
        let mut rhs_u = vec![0.0; self.num_x * self.num_y];
        let mut rhs_v = vec![0.0; self.num_x * self.num_y];
        for y in 0..self.num_y {
            for x in 0..self.num_x {
                let i = self.idx(y, x);
                rhs_u[i] = mesh.u[[y, x]] + dt * (mesh.force_x[[y, x]] - advection_u[[y, x]]);
                rhs_v[i] = mesh.v[[y, x]] + dt * (mesh.force_y[[y, x]] - advection_v[[y, x]]);
            }
        }

        let u_hat = self.fft.forward(&rhs_u);
        let v_hat = self.fft.forward(&rhs_v);

        let p_hat = self.pressure_spectrum(&u_hat, &v_hat, dt)?;

        // Helmholtz solve: implicit viscosity plus pressure correction
        let i_unit = Complex64::new(0.0, 1.0);
        let mut new_u_hat = vec![Complex64::new(0.0, 0.0); u_hat.len()];
        let mut new_v_hat = vec![Complex64::new(0.0, 0.0); v_hat.len()];
        for y in 0..self.num_y {
            for x in 0..self.num_x {
                let i = self.idx(y, x);
                let operator = 1.0
                    + (4.0 * dt / self.reynolds)
                        * (self.sin_x[x] * self.sin_x[x] / (self.spacing_x * self.spacing_x)
                            + self.sin_y[y] * self.sin_y[y] / (self.spacing_y * self.spacing_y));

                new_u_hat[i] = (u_hat[i]
                    - i_unit * (dt / (self.reynolds * self.spacing_x)) * self.sin_2x[x] * p_hat[i])
                    / operator;
                new_v_hat[i] = (v_hat[i]
                    - i_unit * (dt / (self.reynolds * self.spacing_y)) * self.sin_2y[y] * p_hat[i])
                    / operator;
            }
        }

        let new_u = self.fft.inverse(new_u_hat);
        let new_v = self.fft.inverse(new_v_hat);
        for (dst, src) in mesh.u.iter_mut().zip(&new_u) {
            *dst = *src;
        }
        for (dst, src) in mesh.v.iter_mut().zip(&new_v) {
            *dst = *src;
        }

        Ok(())
    }

    fn idx(&self, y: usize, x: usize) -> usize {
        y * self.num_x + x
    }

    /// Pressure in Fourier space from the transformed right-hand side,
    /// gauged to zero at the four modes where the staggered-difference
    /// symbol vanishes.
    fn pressure_spectrum(
        &self,
        u_hat: &[Complex64],
        v_hat: &[Complex64],
        dt: f64,
    ) -> Result<Vec<Complex64>> {
        let i_unit = Complex64::new(0.0, 1.0);
        let mut p_hat = vec![Complex64::new(0.0, 0.0); u_hat.len()];

        for y in 0..self.num_y {
            for x in 0..self.num_x {
                let gauge_mode = (y == 0 || y == self.num_y / 2) && (x == 0 || x == self.num_x / 2);
                if gauge_mode {
                    continue;
                }

                let i = self.idx(y, x);
                let numerator = -i_unit
                    * (self.sin_2x[x] * u_hat[i] / self.spacing_x
                        + self.sin_2y[y] * v_hat[i] / self.spacing_y);
                let denominator = (dt / self.reynolds)
                    * (self.sin_2x[x] * self.sin_2x[x] / (self.spacing_x * self.spacing_x)
                        + self.sin_2y[y] * self.sin_2y[y] / (self.spacing_y * self.spacing_y));

                if denominator == 0.0 {
                    return Err(SimulationError::Numeric(format!(
                        "pressure denominator vanished at mode ({y}, {x})"
                    )));
                }
                p_hat[i] = numerator / denominator;
            }
        }

        Ok(p_hat)
    }

    /// First-order upwind advection terms for both velocity components.
    /// Periodic neighbour indices are computed inline.
    fn upwind(&self, u: &Array2<f64>, v: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let mut out_u = Array2::zeros((self.num_y, self.num_x));
        let mut out_v = Array2::zeros((self.num_y, self.num_x));

        for y in 0..self.num_y {
            let prev_y = (y + self.num_y - 1) % self.num_y;
            let next_y = (y + 1) % self.num_y;
            for x in 0..self.num_x {
                let prev_x = (x + self.num_x - 1) % self.num_x;
                let next_x = (x + 1) % self.num_x;

                let u_here = u[[y, x]];
                let v_here = v[[y, x]];

                let (mut adv_u, mut adv_v) = if u_here > 0.0 {
                    (
                        u_here * (u_here - u[[y, prev_x]]) / self.spacing_x,
                        u_here * (v_here - v[[y, prev_x]]) / self.spacing_x,
                    )
                } else {
                    (
                        u_here * (u[[y, next_x]] - u_here) / self.spacing_x,
                        u_here * (v[[y, next_x]] - v_here) / self.spacing_x,
                    )
                };

                if v_here > 0.0 {
                    adv_u += v_here * (u_here - u[[prev_y, x]]) / self.spacing_y;
                    adv_v += v_here * (v_here - v[[prev_y, x]]) / self.spacing_y;
                } else {
                    adv_u += v_here * (u[[next_y, x]] - u_here) / self.spacing_y;
                    adv_v += v_here * (v[[next_y, x]] - v_here) / self.spacing_y;
                }

                out_u[[y, x]] = adv_u;
                out_v[[y, x]] = adv_v;
            }
        }

        (out_u, out_v)
    }
}
