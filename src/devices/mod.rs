//! Device electrical models owned by a DER host.

/// Photovoltaic module single-diode model and MPP solver.
pub mod pv_module;

// Re-export the main types for convenience
pub use pv_module::{ModuleParameters, MppSolve, MppSolverConfig, PvModule};
