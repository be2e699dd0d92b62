//! Design templates describing the structural contract each DER model type
//! imposes on its configuration: state count, phase count, phase names,
//! initial-state vector, and the named configuration sections that must
//! exist.
//!
//! Templates are process-wide, read-only static data.

/// Supported DER model types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerModelType {
    SinglePhase,
    ThreePhase,
}

impl DerModelType {
    /// Model-type string as it appears in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            DerModelType::SinglePhase => "SolarPV_DER_SinglePhase",
            DerModelType::ThreePhase => "SolarPV_DER_ThreePhase",
        }
    }

    /// Parses a configuration's declared model type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SolarPV_DER_SinglePhase" => Some(DerModelType::SinglePhase),
            "SolarPV_DER_ThreePhase" => Some(DerModelType::ThreePhase),
            _ => None,
        }
    }
}

impl std::fmt::Display for DerModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural contract for one DER model type.
#[derive(Debug)]
pub struct DesignTemplate {
    pub model_type: DerModelType,
    /// Number of ODE states the model integrates.
    pub n_states: usize,
    /// Number of AC phases.
    pub n_phases: usize,
    /// Ordered phase names.
    pub phases: &'static [&'static str],
    /// Initial value for each state, in state order.
    pub initial_states: &'static [f64],
    /// Configuration sections every config of this model type must carry.
    pub sections: &'static [&'static str],
}

/// Sections shared by every DER model configuration.
const DER_SECTIONS: &[&str] = &[
    "basic_specs",
    "module_parameters",
    "inverter_ratings",
    "circuit_parameters",
    "controller_gains",
    "steadystate_values",
    "initial_states",
];

static SINGLE_PHASE_TEMPLATE: DesignTemplate = DesignTemplate {
    model_type: DerModelType::SinglePhase,
    n_states: 11,
    n_phases: 1,
    phases: &["a"],
    initial_states: &[
        0.0, 0.001, // ia
        0.0, 0.0, // xa
        0.0, 0.0, // ua
        550.0, // Vdc
        0.0, // xDC
        0.0, 0.0, // xQ, xPLL
        0.0, // wte
    ],
    sections: DER_SECTIONS,
};

static THREE_PHASE_TEMPLATE: DesignTemplate = DesignTemplate {
    model_type: DerModelType::ThreePhase,
    n_states: 23,
    n_phases: 3,
    phases: &["a", "b", "c"],
    initial_states: &[
        0.0, 0.001, 0.0, 0.0, 0.0, 0.0, // phase a: ia, xa, ua
        0.0, 0.001, 0.0, 0.0, 0.0, 0.0, // phase b: ib, xb, ub
        0.0, 0.001, 0.0, 0.0, 0.0, 0.0, // phase c: ic, xc, uc
        550.0, // Vdc
        0.0, // xDC
        0.0, 0.0, // xQ, xPLL
        0.0, // wte
    ],
    sections: DER_SECTIONS,
};

/// The design template for a DER model type.
pub fn template_for(model_type: DerModelType) -> &'static DesignTemplate {
    match model_type {
        DerModelType::SinglePhase => &SINGLE_PHASE_TEMPLATE,
        DerModelType::ThreePhase => &THREE_PHASE_TEMPLATE,
    }
}
