//! Shared test fixtures for integration tests.

use pvder_sim::config::{ConfigStore, DerKwargs};

/// TOML configuration store covering a 10 kVA single-phase device with a
/// shared parent, a 50 kVA three-phase device, and a deliberately broken
/// entry.
pub const STORE_TOML: &str = r#"
["10"]
parent_config = "base"

["10".basic_specs]
model_type = "SolarPV_DER_SinglePhase"
n_phases = 1
n_states = 11

["10".inverter_ratings]
Srated = 10e3
Vdcrated = 550.0

["10".module_parameters]
Np = 2
Ns = 1000

["50"]
parent_config = "base"

["50".basic_specs]
model_type = "SolarPV_DER_ThreePhase"
n_phases = 3
n_states = 23

["50".inverter_ratings]
Srated = 50e3

[base]
powerRating = 10e3
VrmsRating = 177.0
Vdcrated = 550.0

[base.controller_gains]
Kp_GCC = 300.0
Ki_GCC = 1.0

[broken]
powerRating = 10e3
VrmsRating = 177.0
Vdcrated = 550.0

[broken.basic_specs]
model_type = "SolarPV_DER_SinglePhase"
n_phases = 2
n_states = 11
"#;

/// Parses the shared fixture store.
pub fn store() -> ConfigStore {
    ConfigStore::from_toml_str(STORE_TOML).expect("fixture store should parse")
}

/// Kwargs selecting the 10 kVA single-phase device by ID.
pub fn kwargs_10() -> DerKwargs {
    DerKwargs::new().der_id("10")
}
