//! TOML-backed DER configuration store and the resolution pipeline:
//! device-ID derivation, parent-configuration inheritance, argument merging
//! against the specification registry, and structural validation against the
//! design templates.
//!
//! Resolution never mutates a stored configuration; merging produces new
//! data.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use toml::Value;
use tracing::{debug, info};

use crate::errors::{DerError, DerResult};
use crate::spec::{ArgDefault, ArgSpec, ArgValue, kinds_label, toml_type_name};
use crate::templates::{DerModelType, DesignTemplate};

/// Nested configuration body for one device.
pub type ConfigTable = toml::value::Table;

/// Key under which a configuration references its parent.
const PARENT_CONFIG_KEY: &str = "parent_config";

/// Backing store mapping device IDs to nested configurations.
///
/// Parsed once from TOML; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    configs: BTreeMap<String, ConfigTable>,
}

impl ConfigStore {
    /// Parses a store from a TOML string. Every top-level entry must be a
    /// table keyed by device ID.
    pub fn from_toml_str(s: &str) -> DerResult<Self> {
        let root: ConfigTable =
            toml::from_str(s).map_err(|e| DerError::ConfigFormat(e.to_string()))?;
        let mut configs = BTreeMap::new();
        for (id, value) in root {
            match value {
                Value::Table(table) => {
                    configs.insert(id, table);
                }
                other => {
                    return Err(DerError::ConfigFormat(format!(
                        "entry `{id}` must be a table, found {}",
                        toml_type_name(&other)
                    )));
                }
            }
        }
        Ok(Self { configs })
    }

    /// Reads and parses a store from a TOML file.
    pub fn from_toml_file(path: &Path) -> DerResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| DerError::ConfigFormat(format!("cannot read `{}`: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Device IDs present in the store, sorted.
    pub fn available_ids(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    /// Looks up a device configuration.
    pub fn get(&self, id: &str) -> Option<&ConfigTable> {
        self.configs.get(id)
    }
}

/// Caller-supplied keyword overrides, keyed by specification-registry names.
#[derive(Debug, Clone, Default)]
pub struct DerKwargs {
    values: BTreeMap<String, ArgValue>,
}

impl DerKwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an arbitrary argument value.
    pub fn set(mut self, key: &str, value: ArgValue) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    /// Sets `derId`.
    pub fn der_id(self, id: &str) -> Self {
        self.set("derId", ArgValue::Str(id.to_string()))
    }

    /// Sets `powerRating` (VA).
    pub fn power_rating(self, rating_va: f64) -> Self {
        self.set("powerRating", ArgValue::Real(rating_va))
    }

    /// Sets `VrmsRating` (V).
    pub fn vrms_rating(self, vrms: f64) -> Self {
        self.set("VrmsRating", ArgValue::Real(vrms))
    }

    /// Sets `Vdcrated` (V).
    pub fn vdc_rated(self, vdc: f64) -> Self {
        self.set("Vdcrated", ArgValue::Real(vdc))
    }

    /// Sets the `identifier` suffix used in instance names.
    pub fn identifier(self, identifier: &str) -> Self {
        self.set("identifier", ArgValue::Str(identifier.to_string()))
    }

    /// Sets `standAlone`.
    pub fn stand_alone(self, stand_alone: bool) -> Self {
        self.set("standAlone", ArgValue::Bool(stand_alone))
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Flat, type-checked argument mapping produced by [`merge_arguments`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedArgs {
    values: BTreeMap<String, ArgValue>,
}

impl ResolvedArgs {
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(ArgValue::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(ArgValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(ArgValue::as_bool)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Returns the device ID for a DER instance.
///
/// Prefers an explicit `derId`; otherwise derives the ID from `powerRating`
/// in VA, truncated to kilo-units and rendered as a string (so 10e3 VA maps
/// to `"10"`).
pub fn resolve_device_id(kwargs: &DerKwargs) -> DerResult<String> {
    if let Some(id) = kwargs.get("derId").and_then(ArgValue::as_str) {
        return Ok(id.to_string());
    }
    if let Some(rating) = kwargs.get("powerRating").and_then(ArgValue::as_f64) {
        return Ok(((rating / 1e3) as i64).to_string());
    }
    Err(DerError::MissingIdentifier)
}

/// Looks up a device configuration, failing with the list of available IDs.
pub fn load_config<'a>(store: &'a ConfigStore, device_id: &str) -> DerResult<&'a ConfigTable> {
    match store.get(device_id) {
        Some(config) => {
            debug!(device_id, "DER configuration found in store");
            Ok(config)
        }
        None => Err(DerError::ConfigNotFound {
            id: device_id.to_string(),
            available: store.available_ids(),
        }),
    }
}

/// Parent-configuration ID declared by a configuration, if any.
pub fn parent_ref(config: &ConfigTable) -> Option<&str> {
    config.get(PARENT_CONFIG_KEY).and_then(Value::as_str)
}

/// Resolves the effective parent configuration of `config`.
///
/// Walks the `parent_config` chain, deep-merging each ancestor beneath the
/// ones nearer to the device. A chain that revisits an ID fails with
/// [`DerError::CyclicParentReference`] rather than looping.
pub fn resolve_parent(
    store: &ConfigStore,
    device_id: &str,
    config: &ConfigTable,
) -> DerResult<ConfigTable> {
    let mut chain = vec![device_id.to_string()];
    let mut resolved = ConfigTable::new();
    let mut next = parent_ref(config).map(str::to_string);

    while let Some(parent_id) = next {
        if chain.iter().any(|seen| *seen == parent_id) {
            return Err(DerError::CyclicParentReference {
                id: parent_id,
                chain,
            });
        }
        info!(device_id, parent_id = %parent_id, "reading parent DER configuration");
        let parent = load_config(store, &parent_id)?.clone();
        next = parent_ref(&parent).map(str::to_string);
        chain.push(parent_id);
        // Nearer ancestors keep precedence over farther ones.
        resolved = merge_tables(parent, resolved);
    }
    Ok(resolved)
}

/// Deep-merges `overlay` onto `base`: overlay keys win, nested tables merge
/// recursively. Produces a new table.
pub fn merge_tables(base: ConfigTable, overlay: ConfigTable) -> ConfigTable {
    let mut merged = base;
    for (key, value) in overlay {
        let combined = match (merged.remove(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                Value::Table(merge_tables(existing, incoming))
            }
            (_, value) => value,
        };
        merged.insert(key, combined);
    }
    merged
}

/// Merges kwargs, configuration, parent configuration, and specification
/// defaults into a flat argument mapping.
///
/// For every key in the registry the priority is kwargs > config > parent
/// config > default. Each candidate value is type-checked against the
/// entry's accepted kinds. A key with no candidate and no default is
/// silently omitted; a `Required` key with no candidate fails.
pub fn merge_arguments(
    config: &ConfigTable,
    parent: &ConfigTable,
    kwargs: &DerKwargs,
    spec: &[ArgSpec],
) -> DerResult<ResolvedArgs> {
    let mut values = BTreeMap::new();
    let mut used = Vec::new();

    for entry in spec {
        if let Some(value) = kwargs.get(entry.key) {
            values.insert(entry.key.to_string(), checked(entry, value.clone())?);
            used.push(entry.key);
        } else if let Some(raw) = config.get(entry.key).or_else(|| parent.get(entry.key)) {
            values.insert(entry.key.to_string(), checked_toml(entry, raw)?);
        } else {
            match &entry.default {
                ArgDefault::Required => {
                    return Err(DerError::MissingArgument {
                        key: entry.key.to_string(),
                    });
                }
                ArgDefault::None => {}
                ArgDefault::Value(default) => {
                    values.insert(entry.key.to_string(), default.clone());
                }
            }
        }
    }

    let unused: Vec<&str> = kwargs.keys().filter(|key| !used.contains(key)).collect();
    debug!(used = ?used, unused = ?unused, "merged DER arguments");

    Ok(ResolvedArgs { values })
}

fn checked(entry: &ArgSpec, value: ArgValue) -> DerResult<ArgValue> {
    if entry.kinds.contains(&value.kind()) {
        Ok(value)
    } else {
        Err(DerError::TypeMismatch {
            key: entry.key.to_string(),
            found: value.kind().to_string(),
            expected: kinds_label(entry.kinds),
        })
    }
}

fn checked_toml(entry: &ArgSpec, raw: &Value) -> DerResult<ArgValue> {
    match ArgValue::from_toml(raw) {
        Some(value) => checked(entry, value),
        None => Err(DerError::TypeMismatch {
            key: entry.key.to_string(),
            found: toml_type_name(raw).to_string(),
            expected: kinds_label(entry.kinds),
        }),
    }
}

/// Typed view of a configuration's `basic_specs` section.
///
/// Every field is optional at this level; callers decide which ones their
/// stage requires.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BasicSpecs {
    pub model_type: Option<String>,
    pub n_phases: Option<usize>,
    pub n_states: Option<usize>,
}

impl BasicSpecs {
    /// Reads a configuration's `basic_specs` section, empty when the section
    /// is absent.
    pub fn from_config(device_id: &str, config: &ConfigTable) -> DerResult<Self> {
        match config.get("basic_specs") {
            Some(section) => section.clone().try_into().map_err(|e| {
                DerError::ConfigFormat(format!(
                    "DER configuration `{device_id}`: basic_specs: {e}"
                ))
            }),
            None => Ok(Self::default()),
        }
    }
}

/// Verifies that the configuration's declared model type matches the host's
/// actual model type.
///
/// The declaration is read from the configuration's `basic_specs`, falling
/// back to the parent configuration; a declaration naming no known model
/// type is a mismatch.
pub fn check_model_type(
    device_id: &str,
    actual: DerModelType,
    config: &ConfigTable,
    parent: &ConfigTable,
) -> DerResult<()> {
    let declared = match BasicSpecs::from_config(device_id, config)?.model_type {
        Some(declared) => declared,
        None => BasicSpecs::from_config(device_id, parent)?
            .model_type
            .ok_or_else(|| DerError::ModelTypeMissing {
                device_id: device_id.to_string(),
            })?,
    };
    match DerModelType::parse(&declared) {
        Some(declared_type) if declared_type == actual => Ok(()),
        _ => Err(DerError::ModelTypeMismatch {
            device_id: device_id.to_string(),
            declared,
            actual: actual.as_str().to_string(),
        }),
    }
}

fn declared_count(
    device_id: &str,
    model_type: DerModelType,
    declared: Option<usize>,
    field: &'static str,
) -> DerResult<usize> {
    declared.ok_or_else(|| {
        DerError::ConfigFormat(format!(
            "DER configuration `{device_id}` ({model_type}): basic_specs.{field} is missing"
        ))
    })
}

/// Validates a configuration's structural specs against the design template.
///
/// Checks, in order: declared phase count, template phase-name-list length,
/// declared state count, and template initial-state-vector length. The first
/// mismatch fails naming the offending field.
pub fn validate_structure(
    device_id: &str,
    config: &ConfigTable,
    template: &DesignTemplate,
) -> DerResult<()> {
    let model_type = template.model_type;
    let specs = BasicSpecs::from_config(device_id, config)?;

    let n_phases = declared_count(device_id, model_type, specs.n_phases, "n_phases")?;
    if n_phases != template.n_phases {
        return Err(DerError::StructuralMismatch {
            device_id: device_id.to_string(),
            model_type: model_type.to_string(),
            field: "n_phases",
            found: n_phases,
            expected: template.n_phases,
        });
    }
    if template.phases.len() != n_phases {
        return Err(DerError::StructuralMismatch {
            device_id: device_id.to_string(),
            model_type: model_type.to_string(),
            field: "phase name count",
            found: template.phases.len(),
            expected: n_phases,
        });
    }

    let n_states = declared_count(device_id, model_type, specs.n_states, "n_states")?;
    if n_states != template.n_states {
        return Err(DerError::StructuralMismatch {
            device_id: device_id.to_string(),
            model_type: model_type.to_string(),
            field: "n_states",
            found: n_states,
            expected: template.n_states,
        });
    }
    if template.initial_states.len() != n_states {
        return Err(DerError::StructuralMismatch {
            device_id: device_id.to_string(),
            model_type: model_type.to_string(),
            field: "initial state count",
            found: template.initial_states.len(),
            expected: n_states,
        });
    }

    Ok(())
}
