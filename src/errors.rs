//! Typed failure surface for DER configuration resolution and the PV
//! electrical model.
//!
//! Every failure is raised eagerly at configuration-resolution or
//! construction time; nothing is caught and retried internally.

use thiserror::Error;

/// Errors raised while resolving, validating, or constructing a DER instance.
#[derive(Error, Debug)]
pub enum DerError {
    /// Neither `derId` nor `powerRating` was supplied, so no device ID can
    /// be derived.
    #[error("neither a DER parameter ID nor a DER power rating was provided")]
    MissingIdentifier,

    /// The requested device ID does not exist in the configuration store.
    #[error("DER configuration with ID `{id}` could not be found — available IDs: {}", available.join(", "))]
    ConfigNotFound { id: String, available: Vec<String> },

    /// An argument value does not match the types accepted by its
    /// specification entry.
    #[error("found `{key}` to have type {found} — valid types: {expected}")]
    TypeMismatch {
        key: String,
        found: String,
        expected: String,
    },

    /// A required argument was absent from kwargs, configuration, and parent
    /// configuration, and has no default.
    #[error("required argument `{key}` was not supplied and has no default")]
    MissingArgument { key: String },

    /// A structural field of the configuration disagrees with the design
    /// template for the DER model type.
    #[error(
        "DER configuration `{device_id}` has {field} = {found}, but the {model_type} template requires {expected}"
    )]
    StructuralMismatch {
        device_id: String,
        model_type: String,
        field: &'static str,
        found: usize,
        expected: usize,
    },

    /// The configuration is declared for a different DER model type than the
    /// host it is being used with.
    #[error(
        "DER configuration `{device_id}` is defined for model type `{declared}` but is being used with `{actual}`"
    )]
    ModelTypeMismatch {
        device_id: String,
        declared: String,
        actual: String,
    },

    /// Neither the configuration nor its parent declares a model type.
    #[error("model type was not found for DER configuration `{device_id}`")]
    ModelTypeMissing { device_id: String },

    /// The device ID has no entry in the static PV module parameter table.
    #[error("PV module parameters not available for parameter ID `{id}`")]
    ParametersNotFound { id: String },

    /// A `parent_config` chain revisits an already-resolved configuration.
    #[error("parent configuration chain revisits `{id}` (chain: {})", chain.join(" -> "))]
    CyclicParentReference { id: String, chain: Vec<String> },

    /// The maximum-power-point root-find exhausted its iteration budget.
    #[error(
        "MPP root-find did not converge after {iterations} iterations (residual {residual:.3e} A)"
    )]
    MppNotConverged { iterations: usize, residual: f64 },

    /// The least-squares fit of the MPP polynomial failed.
    #[error("MPP polynomial fit failed: {reason}")]
    PolynomialFit { reason: String },

    /// The configuration store could not be read or decoded.
    #[error("configuration store error: {0}")]
    ConfigFormat(String),
}

/// Convenience alias for `Result<T, DerError>`.
pub type DerResult<T> = Result<T, DerError>;

#[cfg(test)]
mod tests {
    use super::DerError;

    #[test]
    fn config_not_found_lists_available_ids() {
        let err = DerError::ConfigNotFound {
            id: "99".to_string(),
            available: vec!["10".to_string(), "50".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("`99`"));
        assert!(msg.contains("10, 50"));
    }

    #[test]
    fn cyclic_parent_reports_chain() {
        let err = DerError::CyclicParentReference {
            id: "10".to_string(),
            chain: vec!["10".to_string(), "50".to_string()],
        };
        assert!(err.to_string().contains("10 -> 50"));
    }
}
