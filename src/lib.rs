//! Solar photovoltaic distributed energy resource (DER) model core:
//! layered configuration resolution, structural validation against model
//! templates, and the single-diode PV panel electrical model with
//! maximum-power-point solving.

pub mod config;
pub mod der;
pub mod devices;
pub mod errors;
pub mod events;
pub mod grid;
pub mod spec;
pub mod templates;
