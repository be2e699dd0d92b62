//! Solar PV DER host object.
//!
//! Owns per-instance identity and state, runs the configuration pipeline in
//! a fixed order (no stage sees unvalidated output of a previous stage), and
//! holds the PV module plus the collaborators later initialization stages
//! consume.

use std::sync::atomic::{AtomicUsize, Ordering};

use toml::Value;
use tracing::{debug, error, info};

use crate::config::{
    ConfigStore, ConfigTable, DerKwargs, ResolvedArgs, check_model_type, load_config,
    merge_arguments, merge_tables, parent_ref, resolve_device_id, resolve_parent,
    validate_structure,
};
use crate::devices::PvModule;
use crate::devices::pv_module::{DEFAULT_SINSOL, DEFAULT_TACTUAL};
use crate::errors::DerResult;
use crate::events::EventSchedule;
use crate::grid::{BaseValues, Grid};
use crate::spec::argument_spec;
use crate::templates::{DerModelType, template_for};

/// Number of DER instances created in this process; used for instance names.
static INSTANCE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// A solar photovoltaic distributed energy resource: panel, power
/// electronics, and the validated configuration they were built from.
#[derive(Debug)]
pub struct SolarDer {
    /// Generated instance name, unique within the process.
    pub name: String,
    pub device_id: String,
    pub model_type: DerModelType,
    /// Parent configuration ID, when inheritance was used.
    pub parent_id: Option<String>,
    /// Effective configuration: device config over its resolved parents.
    pub config: ConfigTable,
    /// Merged, type-checked constructor arguments.
    arguments: ResolvedArgs,
    pub pv_module: PvModule,
    pub events: EventSchedule,
    /// Per-unit power base, replaced by the grid model when one is attached.
    pub sbase: f64,
    /// Phase-A grid voltage read at attachment, for stand-alone studies.
    pub vag_previous: Option<num_complex::Complex64>,
    /// Requested logging verbosity, recorded for the host's collaborators.
    pub verbosity: String,
    pub stand_alone: bool,
    pub steady_state_initialization: bool,
    pub allow_unbalanced_m: bool,
}

impl SolarDer {
    /// Builds a DER instance from the configuration store.
    ///
    /// Stages run in a fixed order: device-ID resolution, config load,
    /// parent resolution, section completion, model-type check, argument
    /// merge, structural validation, PV module construction. Any failure
    /// aborts construction; no partially initialized instance escapes.
    pub fn setup(
        model_type: DerModelType,
        store: &ConfigStore,
        events: EventSchedule,
        kwargs: &DerKwargs,
    ) -> DerResult<Self> {
        let device_id = resolve_device_id(kwargs)?;
        let template = template_for(model_type);

        let result = Self::run_pipeline(model_type, store, events, kwargs, &device_id, template);
        if let Err(err) = &result {
            error!(device_id = %device_id, model_type = %model_type, %err, "DER setup failed");
        }
        result
    }

    fn run_pipeline(
        model_type: DerModelType,
        store: &ConfigStore,
        events: EventSchedule,
        kwargs: &DerKwargs,
        device_id: &str,
        template: &crate::templates::DesignTemplate,
    ) -> DerResult<Self> {
        let mut config = load_config(store, device_id)?.clone();
        let parent_id = parent_ref(&config).map(str::to_string);
        let mut parent = resolve_parent(store, device_id, &config)?;

        // Every template-declared section exists in both configs, empty when
        // neither supplies it.
        for section in template.sections {
            for table in [&mut config, &mut parent] {
                table
                    .entry(section.to_string())
                    .or_insert_with(|| Value::Table(ConfigTable::new()));
            }
        }

        check_model_type(device_id, model_type, &config, &parent)?;
        let arguments = merge_arguments(&config, &parent, kwargs, argument_spec())?;

        let effective = merge_tables(parent, config);
        validate_structure(device_id, &effective, template)?;

        let identifier = arguments.get_str("identifier").unwrap_or("");
        let name = instance_name(model_type, identifier);
        let verbosity = arguments.get_str("verbosity").unwrap_or("INFO").to_string();
        info!(
            name = %name,
            device_id,
            model_type = %model_type,
            parent_id = ?parent_id,
            "DER configuration validated"
        );

        let (sinsol, tactual) = events.state_at(0.0).unwrap_or((DEFAULT_SINSOL, DEFAULT_TACTUAL));
        let mut pv_module = PvModule::new(device_id, sinsol, true)?;
        pv_module.update_conditions(sinsol, tactual);
        debug!(name = %name, sinsol, tactual, "PV module attached");

        Ok(Self {
            name,
            device_id: device_id.to_string(),
            model_type,
            parent_id,
            config: effective,
            stand_alone: arguments.get_bool("standAlone").unwrap_or(true),
            steady_state_initialization: arguments
                .get_bool("steadyStateInitialization")
                .unwrap_or(true),
            allow_unbalanced_m: arguments.get_bool("allowUnbalancedM").unwrap_or(false),
            verbosity,
            sbase: BaseValues::SBASE,
            vag_previous: None,
            arguments,
            pv_module,
            events,
        })
    }

    /// The merged constructor arguments, for later initialization stages.
    pub fn arguments(&self) -> &ResolvedArgs {
        &self.arguments
    }

    /// Applies the scheduled operating conditions at time `t` to the PV
    /// module, if any event is in force.
    pub fn apply_events_at(&mut self, t: f64) {
        if let Some((sinsol, tactual)) = self.events.state_at(t) {
            self.pv_module.update_conditions(sinsol, tactual);
        }
    }

    /// Attaches a grid model: takes its power base and, in stand-alone
    /// mode, an initial phase-A voltage reading.
    pub fn attach_grid_model(&mut self, grid: &dyn Grid) {
        self.sbase = grid.sbase();
        if self.stand_alone {
            self.vag_previous = Some(grid.vag());
        }
        debug!(name = %self.name, sbase = self.sbase, "grid model attached");
    }

    /// Panel output power at `vdc` in per-unit on the host's power base.
    pub fn panel_power_pu(&self, vdc: f64) -> f64 {
        self.pv_module.panel_power_pu(vdc, self.sbase)
    }
}

/// Generates a process-unique instance name from the model type, instance
/// counter, and optional identifier suffix.
fn instance_name(model_type: DerModelType, identifier: &str) -> String {
    let count = INSTANCE_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
    if identifier.is_empty() {
        format!("{}-{count}", model_type.as_str())
    } else {
        format!("{}-{count}-{identifier}", model_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DerError;

    const STORE_TOML: &str = r#"
["10"]
parent_config = "base"

["10".basic_specs]
model_type = "SolarPV_DER_SinglePhase"
n_phases = 1
n_states = 11

["10".inverter_ratings]
Srated = 10e3

[base]
powerRating = 10e3
VrmsRating = 177.0
Vdcrated = 550.0
"#;

    fn store() -> ConfigStore {
        ConfigStore::from_toml_str(STORE_TOML).expect("fixture store should parse")
    }

    #[test]
    fn setup_builds_instance_from_store() {
        let kwargs = DerKwargs::new().der_id("10");
        let der = SolarDer::setup(
            DerModelType::SinglePhase,
            &store(),
            EventSchedule::new(),
            &kwargs,
        )
        .expect("setup should succeed");

        assert_eq!(der.device_id, "10");
        assert_eq!(der.parent_id.as_deref(), Some("base"));
        // rating arguments inherited from the parent configuration
        assert_eq!(der.arguments().get_f64("powerRating"), Some(10e3));
        assert_eq!(der.arguments().get_f64("VrmsRating"), Some(177.0));
        // flags from specification defaults
        assert!(der.stand_alone);
        assert!(der.steady_state_initialization);
        assert!(!der.allow_unbalanced_m);
        // PV module fitted and ready
        assert!(der.pv_module.mpp_polynomial().is_some());
    }

    #[test]
    fn setup_creates_missing_template_sections() {
        let kwargs = DerKwargs::new().der_id("10");
        let der = SolarDer::setup(
            DerModelType::SinglePhase,
            &store(),
            EventSchedule::new(),
            &kwargs,
        )
        .expect("setup should succeed");

        for section in template_for(DerModelType::SinglePhase).sections {
            assert!(
                der.config.contains_key(*section),
                "section `{section}` was not created"
            );
        }
    }

    #[test]
    fn setup_rejects_wrong_model_type() {
        let kwargs = DerKwargs::new().der_id("10");
        let err = SolarDer::setup(
            DerModelType::ThreePhase,
            &store(),
            EventSchedule::new(),
            &kwargs,
        )
        .unwrap_err();
        assert!(matches!(err, DerError::ModelTypeMismatch { .. }));
    }

    #[test]
    fn setup_rejects_unknown_device() {
        let kwargs = DerKwargs::new().der_id("99");
        let err = SolarDer::setup(
            DerModelType::SinglePhase,
            &store(),
            EventSchedule::new(),
            &kwargs,
        )
        .unwrap_err();
        assert!(matches!(err, DerError::ConfigNotFound { .. }));
    }

    #[test]
    fn setup_uses_scheduled_conditions_at_time_zero() {
        let mut events = EventSchedule::new();
        events.add_solar_event(0.0, 50.0, 300.0);
        let kwargs = DerKwargs::new().der_id("10");
        let der = SolarDer::setup(DerModelType::SinglePhase, &store(), events, &kwargs)
            .expect("setup should succeed");

        assert_eq!(der.pv_module.sinsol, 50.0);
        assert_eq!(der.pv_module.tactual, 300.0);
    }

    #[test]
    fn apply_events_updates_module_conditions() {
        let mut events = EventSchedule::new();
        events.add_solar_event(10.0, 25.0, 310.0);
        let kwargs = DerKwargs::new().der_id("10");
        let mut der = SolarDer::setup(DerModelType::SinglePhase, &store(), events, &kwargs)
            .expect("setup should succeed");

        assert_eq!(der.pv_module.sinsol, 100.0);
        der.apply_events_at(10.0);
        assert_eq!(der.pv_module.sinsol, 25.0);
        assert_eq!(der.pv_module.tactual, 310.0);
    }

    #[test]
    fn attach_grid_reads_base_and_voltage() {
        use crate::grid::StubGrid;

        let kwargs = DerKwargs::new().der_id("10");
        let mut der = SolarDer::setup(
            DerModelType::SinglePhase,
            &store(),
            EventSchedule::new(),
            &kwargs,
        )
        .expect("setup should succeed");

        assert!(der.vag_previous.is_none());
        der.attach_grid_model(&StubGrid::default());
        assert_eq!(der.sbase, BaseValues::SBASE);
        // stand-alone by default, so the voltage reading is captured
        assert_eq!(der.vag_previous.map(|v| v.re), Some(BaseValues::VBASE));

        let solve = der.pv_module.mpp_voltage();
        assert!(solve.converged);
        assert!(der.panel_power_pu(solve.vdc) > 0.0);
    }

    #[test]
    fn instance_names_are_unique_and_carry_identifier() {
        let a = instance_name(DerModelType::SinglePhase, "");
        let b = instance_name(DerModelType::SinglePhase, "plant7");
        assert_ne!(a, b);
        assert!(a.starts_with("SolarPV_DER_SinglePhase-"));
        assert!(b.ends_with("-plant7"));
    }
}
