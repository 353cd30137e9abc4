//! Parameter → option naming and value-kind mapping

use crate::error::BuildError;
use crate::spec::{ParameterLocation, ValueKind};

/// Value kind of a synthesized command-line option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliValueKind {
    String,
    Integer,
    Boolean,
    /// Repeatable and comma-separated
    StringList,
    /// Takes no value
    Flag,
}

impl CliValueKind {
    /// Placeholder shown in help output.
    pub fn value_name(self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Integer => Some("integer"),
            Self::Boolean => Some("boolean"),
            Self::StringList => Some("array"),
            Self::Flag => None,
        }
    }
}

/// Long option name (without `--`) for a parameter.
///
/// A name declared in a single location keeps its bare name. A name declared
/// in several locations gets `-in-{location}` on every one of its options,
/// never just on the colliding subset.
pub fn option_name(name: &str, location: ParameterLocation, distinct_locations: usize) -> String {
    if distinct_locations > 1 {
        format!("{name}-in-{location}")
    } else {
        name.to_string()
    }
}

/// Map a declared parameter kind to an option value kind.
///
/// `Err` carries only the offending kind; the builder fills in where it was
/// declared.
pub fn option_value_kind(kind: &ValueKind) -> Result<CliValueKind, String> {
    match kind {
        ValueKind::String | ValueKind::Unspecified => Ok(CliValueKind::String),
        ValueKind::Integer => Ok(CliValueKind::Integer),
        ValueKind::Boolean => Ok(CliValueKind::Boolean),
        ValueKind::Array => Ok(CliValueKind::StringList),
        ValueKind::Other(other) => Err(other.clone()),
    }
}

/// Like [`option_value_kind`], reporting failures as a [`BuildError`].
pub(crate) fn checked_value_kind(
    kind: &ValueKind,
    path: &str,
    method: &str,
    name: &str,
    location: ParameterLocation,
) -> Result<CliValueKind, BuildError> {
    option_value_kind(kind).map_err(|kind| BuildError::UnsupportedParameterType {
        path: path.to_string(),
        method: method.to_string(),
        name: name.to_string(),
        location: location.to_string(),
        kind,
    })
}
