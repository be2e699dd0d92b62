//! Specification registry for DER constructor arguments.
//!
//! Each entry declares, for one named argument, the value kinds it accepts
//! and its default (a concrete value, "required", or "omit when absent").
//! The registry is process-wide, built once at first use, and never mutated
//! after load.

use std::sync::LazyLock;

use num_complex::Complex64;
use toml::Value;

/// Kind of a dynamically typed argument value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Str,
    Int,
    Real,
    Bool,
    Complex,
    Table,
}

impl std::fmt::Display for ArgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArgKind::Str => "string",
            ArgKind::Int => "integer",
            ArgKind::Real => "float",
            ArgKind::Bool => "boolean",
            ArgKind::Complex => "complex",
            ArgKind::Table => "table",
        };
        write!(f, "{name}")
    }
}

/// Renders a list of accepted kinds for error messages.
pub fn kinds_label(kinds: &[ArgKind]) -> String {
    kinds
        .iter()
        .map(ArgKind::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// A dynamically typed argument value.
///
/// Mirrors the value shapes a configuration store can carry. Complex values
/// are encoded in TOML as a two-element `[re, im]` array.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Complex(Complex64),
    Table(toml::value::Table),
}

impl ArgValue {
    /// The kind tag of this value.
    pub fn kind(&self) -> ArgKind {
        match self {
            ArgValue::Str(_) => ArgKind::Str,
            ArgValue::Int(_) => ArgKind::Int,
            ArgValue::Real(_) => ArgKind::Real,
            ArgValue::Bool(_) => ArgKind::Bool,
            ArgValue::Complex(_) => ArgKind::Complex,
            ArgValue::Table(_) => ArgKind::Table,
        }
    }

    /// Converts a raw TOML value into an argument value.
    ///
    /// Returns `None` for shapes with no argument representation (datetimes,
    /// arrays other than `[re, im]` number pairs).
    pub fn from_toml(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(ArgValue::Str(s.clone())),
            Value::Integer(i) => Some(ArgValue::Int(*i)),
            Value::Float(x) => Some(ArgValue::Real(*x)),
            Value::Boolean(b) => Some(ArgValue::Bool(*b)),
            Value::Table(t) => Some(ArgValue::Table(t.clone())),
            Value::Array(items) => {
                if let [re, im] = items.as_slice() {
                    let re = toml_number(re)?;
                    let im = toml_number(im)?;
                    Some(ArgValue::Complex(Complex64::new(re, im)))
                } else {
                    None
                }
            }
            Value::Datetime(_) => None,
        }
    }

    /// Numeric view: integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Int(i) => Some(*i as f64),
            ArgValue::Real(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<Complex64> {
        match self {
            ArgValue::Complex(c) => Some(*c),
            _ => None,
        }
    }
}

fn toml_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

/// Human-readable name of a raw TOML value's type, for error messages.
pub fn toml_type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Integer(_) => "integer",
        Value::Float(_) => "float",
        Value::Boolean(_) => "boolean",
        Value::Datetime(_) => "datetime",
        Value::Array(_) => "array",
        Value::Table(_) => "table",
    }
}

/// Default policy for a specification entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgDefault {
    /// The argument must be supplied by kwargs or configuration.
    Required,
    /// Optional with no default: silently omitted when absent.
    None,
    /// Optional with a concrete default value.
    Value(ArgValue),
}

/// One entry of the argument specification registry.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    /// Argument name as it appears in kwargs and configuration files.
    pub key: &'static str,
    /// Value kinds this argument accepts.
    pub kinds: &'static [ArgKind],
    /// Default policy when the argument is absent from every source.
    pub default: ArgDefault,
}

const NUMBER: &[ArgKind] = &[ArgKind::Int, ArgKind::Real];
const STRING: &[ArgKind] = &[ArgKind::Str];
const BOOLEAN: &[ArgKind] = &[ArgKind::Bool];
const COMPLEX: &[ArgKind] = &[ArgKind::Complex];

static DER_ARGUMENT_SPEC: LazyLock<Vec<ArgSpec>> = LazyLock::new(|| {
    vec![
        ArgSpec {
            key: "derId",
            kinds: STRING,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "powerRating",
            kinds: NUMBER,
            default: ArgDefault::Required,
        },
        ArgSpec {
            key: "VrmsRating",
            kinds: NUMBER,
            default: ArgDefault::Required,
        },
        ArgSpec {
            key: "Vdcrated",
            kinds: NUMBER,
            default: ArgDefault::Required,
        },
        ArgSpec {
            key: "verbosity",
            kinds: STRING,
            default: ArgDefault::Value(ArgValue::Str("INFO".to_string())),
        },
        ArgSpec {
            key: "identifier",
            kinds: STRING,
            default: ArgDefault::Value(ArgValue::Str(String::new())),
        },
        ArgSpec {
            key: "derConfig",
            kinds: &[ArgKind::Table],
            default: ArgDefault::Value(ArgValue::Table(toml::value::Table::new())),
        },
        ArgSpec {
            key: "gridVoltagePhaseA",
            kinds: COMPLEX,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "gridVoltagePhaseB",
            kinds: COMPLEX,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "gridVoltagePhaseC",
            kinds: COMPLEX,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "gridFrequency",
            kinds: NUMBER,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "standAlone",
            kinds: BOOLEAN,
            default: ArgDefault::Value(ArgValue::Bool(true)),
        },
        ArgSpec {
            key: "steadyStateInitialization",
            kinds: BOOLEAN,
            default: ArgDefault::Value(ArgValue::Bool(true)),
        },
        ArgSpec {
            key: "allowUnbalancedM",
            kinds: BOOLEAN,
            default: ArgDefault::Value(ArgValue::Bool(false)),
        },
        ArgSpec {
            key: "ia0",
            kinds: COMPLEX,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "xa0",
            kinds: COMPLEX,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "ua0",
            kinds: COMPLEX,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "xDC0",
            kinds: NUMBER,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "xP0",
            kinds: NUMBER,
            default: ArgDefault::None,
        },
        ArgSpec {
            key: "xQ0",
            kinds: NUMBER,
            default: ArgDefault::None,
        },
    ]
});

/// The process-wide DER argument specification registry.
pub fn argument_spec() -> &'static [ArgSpec] {
    &DER_ARGUMENT_SPEC
}
