//! Parameter structures for the immersed boundary engine.
//!
//! Defaults follow the reference numerics: a near-Stokes Reynolds number
//! and per-step neighbour refreshing.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result as SimResult, SimulationError};

/// Top-level parameters container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Fluid grid and solver parameters
    pub fluid: FluidParameters,
    /// Membrane elasticity parameters
    pub membrane: MembraneParameters,
    /// Cell-cell interaction parameters
    pub cell_cell: CellCellParameters,
    /// Steps between neighbour-search refreshes
    pub node_neighbour_update_frequency: usize,
    /// Neighbour box size and cell-cell force cutoff
    pub interaction_distance: f64,
    /// Perpendicular gap between daughter elements; must be set before
    /// any division
    pub element_division_spacing: Option<f64>,
}

impl SimulationParameters {
    /// Load parameters from a JSON file, or use defaults if it is missing
    /// or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(params) => {
                    log::info!("Loaded simulation parameters from {:?}", path.as_ref());
                    params
                }
                Err(e) => {
                    log::warn!("Failed to parse simulation parameters: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Simulation parameters file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Load parameters from a JSON file, failing loudly on any problem.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let params: Self = serde_json::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    /// Check every bound the solver relies on.
    pub fn validate(&self) -> SimResult<()> {
        let f = &self.fluid;
        if f.num_grid_pts_x == 0 || f.num_grid_pts_x % 2 != 0 {
            return Err(SimulationError::Config(format!(
                "Nx must be a positive even integer, got {}",
                f.num_grid_pts_x
            )));
        }
        if f.num_grid_pts_y == 0 || f.num_grid_pts_y % 2 != 0 {
            return Err(SimulationError::Config(format!(
                "Ny must be a positive even integer, got {}",
                f.num_grid_pts_y
            )));
        }
        if f.dt <= 0.0 {
            return Err(SimulationError::Config(format!("dt must be positive, got {}", f.dt)));
        }
        if f.reynolds <= 0.0 {
            return Err(SimulationError::Config(format!(
                "Re must be positive, got {}",
                f.reynolds
            )));
        }
        if f.fft_threads == 0 {
            return Err(SimulationError::Config("fft_threads must be positive".into()));
        }
        if self.node_neighbour_update_frequency == 0 {
            return Err(SimulationError::Config(
                "node_neighbour_update_frequency must be positive".into(),
            ));
        }
        if self.interaction_distance <= 0.0 || self.interaction_distance >= 1.0 {
            return Err(SimulationError::Config(format!(
                "interaction_distance must lie in (0, 1), got {}",
                self.interaction_distance
            )));
        }
        if let Some(spacing) = self.element_division_spacing {
            if spacing <= 0.0 {
                return Err(SimulationError::Config(format!(
                    "element_division_spacing must be positive, got {spacing}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            fluid: FluidParameters::default(),
            membrane: MembraneParameters::default(),
            cell_cell: CellCellParameters::default(),
            node_neighbour_update_frequency: 1,
            interaction_distance: 0.05,
            element_division_spacing: None,
        }
    }
}

/// Fluid grid and spectral solver parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidParameters {
    /// Grid points in x (positive even; powers of two transform fastest)
    pub num_grid_pts_x: usize,
    /// Grid points in y
    pub num_grid_pts_y: usize,
    /// Time step
    pub dt: f64,
    /// Reynolds number; the default is a Stokes-flow limit
    pub reynolds: f64,
    /// Worker threads for the FFT passes
    pub fft_threads: usize,
}

impl Default for FluidParameters {
    fn default() -> Self {
        Self {
            num_grid_pts_x: 128,
            num_grid_pts_y: 128,
            dt: 0.01,
            reynolds: 1e-4,
            fft_threads: 2,
        }
    }
}

/// Membrane elasticity parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembraneParameters {
    /// Hooke spring constant along element edges
    pub spring_constant: f64,
    /// Spring rest length
    pub rest_length: f64,
}

impl Default for MembraneParameters {
    fn default() -> Self {
        Self {
            spring_constant: 1e6,
            rest_length: 0.005,
        }
    }
}

/// Cell-cell interaction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellCellParameters {
    /// Base spring constant, before spacing scaling
    pub spring_constant: f64,
    /// Rest length; defaults to a quarter of the interaction distance
    /// when unset
    pub rest_length: Option<f64>,
    /// Use the Morse potential instead of a linear spring
    pub use_morse_potential: bool,
}

impl Default for CellCellParameters {
    fn default() -> Self {
        Self {
            spring_constant: 1e3,
            rest_length: None,
            use_morse_potential: false,
        }
    }
}
