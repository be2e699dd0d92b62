//! Minimal grid-model collaborator contract.
//!
//! The DER core treats the grid as an opaque object supplying the per-unit
//! power base and, in stand-alone studies, a phase-A voltage reading.

use num_complex::Complex64;

/// System per-unit base values.
pub struct BaseValues;

impl BaseValues {
    /// Per-unit power base (VA).
    pub const SBASE: f64 = 50.0e3;
    /// Per-unit voltage base (V).
    pub const VBASE: f64 = 250.0;
}

/// Read contract a grid model must satisfy for DER initialization.
pub trait Grid {
    /// Per-unit power base (VA).
    fn sbase(&self) -> f64;
    /// Phase-A grid voltage phasor (V).
    fn vag(&self) -> Complex64;
}

/// Fixed-voltage grid stand-in for stand-alone studies and tests.
#[derive(Debug, Clone)]
pub struct StubGrid {
    pub vag: Complex64,
}

impl Default for StubGrid {
    fn default() -> Self {
        Self {
            vag: Complex64::new(BaseValues::VBASE, 0.0),
        }
    }
}

impl Grid for StubGrid {
    fn sbase(&self) -> f64 {
        BaseValues::SBASE
    }

    fn vag(&self) -> Complex64 {
        self.vag
    }
}
