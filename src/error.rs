//! Error taxonomy for the immersed boundary engine.
//!
//! Every fallible public operation returns a [`SimulationError`] naming the
//! kind of failure and a short contextual string. Geometry and division
//! spacing errors are recoverable by the caller of the division operations;
//! everything else aborts the current step.

use thiserror::Error;

/// Unified error type for mesh construction, geometry, forces and the
/// fluid solver.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Invalid configuration: bad grid dimensions, non-positive dt or
    /// Reynolds number, or an unset division spacing.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A mesh reader produced inconsistent data.
    #[error("malformed mesh: {0}")]
    MalformedMesh(String),

    /// A geometric operation could not proceed, e.g. a division axis that
    /// does not cross exactly two edges of the element.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// The perpendicular walk during element division could not reach the
    /// required half-spacing. The element is left unchanged.
    #[error("element division spacing: {0}")]
    DivisionSpacing(String),

    /// Numeric failure in the spectral solver: FFT thread pool setup, or a
    /// vanishing pressure denominator away from the gauge modes.
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Nodes presented to the cell-cell force with differing attribute
    /// vector lengths.
    #[error("node attribute mismatch: {0}")]
    AttributeMismatch(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimulationError>;
