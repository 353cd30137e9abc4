//! OpenAPI document → ordered, read-only model
//!
//! Walks a parsed OpenAPI value (JSON or YAML) and keeps only what the
//! command tree builder and the request resolver need: paths in document
//! order, their operations, parameters, and the server list.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{DispatchError, SpecError};

/// Maximum number of `$ref` hops followed before giving up on a chain.
const MAX_REF_DEPTH: usize = 16;

/// The eight HTTP methods an OpenAPI path item can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
    Trace,
}

impl HttpMethod {
    /// All methods, in the order method sub-commands are emitted.
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Head,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    /// Lower-case token, as used for path item keys and sub-command names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Head => "head",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Head => reqwest::Method::HEAD,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Options => reqwest::Method::OPTIONS,
            Self::Patch => reqwest::Method::PATCH,
            Self::Trace => reqwest::Method::TRACE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for HttpMethod {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DispatchError::UnsupportedMethod {
                method: s.to_string(),
            })
    }
}

/// Where a parameter's value is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared value kind of a parameter, taken from its schema `type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Boolean,
    Array,
    /// No schema or no `type` in the schema.
    Unspecified,
    /// A declared type the command line has no mapping for (e.g. `number`).
    Other(String),
}

impl ValueKind {
    fn from_type_name(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single API parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub description: String,
    pub value_kind: ValueKind,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            required: false,
            description: String::new(),
            value_kind: ValueKind::Unspecified,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn value_kind(mut self, value_kind: ValueKind) -> Self {
        self.value_kind = value_kind;
        self
    }
}

/// One HTTP method's behavior on a path item.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct Operation {
    /// Summary text for help (falls back to the description)
    pub summary: String,
    /// Operation-level parameters, in declaration order
    pub parameters: Vec<Parameter>,
}

/// Operations and shared parameters declared for one path pattern.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct PathItem {
    pub summary: String,
    /// Path-item-level parameters, shared by every operation
    pub parameters: Vec<Parameter>,
    operations: Vec<(HttpMethod, Operation)>,
}

impl PathItem {
    /// Operations in [`HttpMethod::ALL`] order.
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        self.operations.iter().map(|(m, op)| (*m, op))
    }

    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, op)| op)
    }
}

/// A parsed API document. Immutable once built.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ApiDocument {
    /// `info.version`
    pub version: String,
    /// `info.summary`, falling back to `info.description` and `info.title`
    pub summary: String,
    /// Server URLs with variables substituted; the first one is authoritative
    pub servers: Vec<String>,
    /// Path patterns in document order
    pub paths: Vec<(String, PathItem)>,
}

impl ApiDocument {
    /// Build the model from an already-parsed OpenAPI value.
    pub fn from_value(spec: &Value) -> Result<Self, SpecError> {
        if !spec.is_object() {
            return Err(SpecError::NotAnObject);
        }

        let info = spec.get("info");
        let version = info
            .and_then(|i| i.get("version"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let summary = info
            .and_then(|i| {
                i.get("summary")
                    .or_else(|| i.get("description"))
                    .or_else(|| i.get("title"))
            })
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let servers = spec
            .get("servers")
            .and_then(|s| s.as_array())
            .map(|arr| arr.iter().filter_map(server_url).collect())
            .unwrap_or_default();

        let paths = spec
            .get("paths")
            .and_then(|p| p.as_object())
            .map(|paths| {
                paths
                    .iter()
                    .map(|(path, item)| (path.clone(), extract_path_item(spec, path, item)))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            version,
            summary,
            servers,
            paths,
        })
    }

    pub fn path_item(&self, path: &str) -> Option<&PathItem> {
        self.paths
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, item)| item)
    }
}

impl FromStr for ApiDocument {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_document(s)
    }
}

/// Parse OpenAPI text, trying JSON first and YAML second.
pub fn parse_document(text: &str) -> Result<ApiDocument, SpecError> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(json) => serde_yaml_ng::from_str(text)
            .map_err(|yaml| SpecError::Unparseable { json, yaml })?,
    };
    ApiDocument::from_value(&value)
}

fn server_url(server: &Value) -> Option<String> {
    let mut url = server.get("url")?.as_str()?.to_string();
    if let Some(vars) = server.get("variables").and_then(|v| v.as_object()) {
        for (name, var) in vars {
            if let Some(default) = var.get("default").and_then(|d| d.as_str()) {
                url = url.replace(&format!("{{{name}}}"), default);
            }
        }
    }
    Some(url)
}

fn extract_path_item(root: &Value, path: &str, item: &Value) -> PathItem {
    let item = resolve_ref(root, item);
    let summary = item
        .get("summary")
        .or_else(|| item.get("description"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let parameters = extract_params(root, path, item.get("parameters"));

    let operations = HttpMethod::ALL
        .into_iter()
        .filter_map(|method| {
            let operation = item.get(method.as_str())?;
            Some((method, extract_operation(root, path, operation)))
        })
        .collect();

    PathItem {
        summary,
        parameters,
        operations,
    }
}

fn extract_operation(root: &Value, path: &str, operation: &Value) -> Operation {
    let summary = operation
        .get("summary")
        .or_else(|| operation.get("description"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Operation {
        summary,
        parameters: extract_params(root, path, operation.get("parameters")),
    }
}

fn extract_params(root: &Value, path: &str, params: Option<&Value>) -> Vec<Parameter> {
    params
        .and_then(|p| p.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|param| parse_param(root, path, resolve_ref(root, param)))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a single parameter from its JSON representation.
fn parse_param(root: &Value, path: &str, param: &Value) -> Option<Parameter> {
    let name = param.get("name")?.as_str()?;
    let location = param.get("in")?.as_str()?;
    if name.is_empty() {
        return None;
    }
    let Some(location) = ParameterLocation::parse(location) else {
        log::warn!("skipping parameter `{name}` on {path}: unknown location `{location}`");
        return None;
    };

    let description = param
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let required = param
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let value_kind = param
        .get("schema")
        .map(|schema| schema_value_kind(resolve_ref(root, schema)))
        .unwrap_or(ValueKind::Unspecified);

    Some(Parameter {
        name: name.to_string(),
        location,
        required,
        description,
        value_kind,
    })
}

/// Read the schema `type`. OpenAPI 3.1 allows a list; the first non-null
/// entry wins.
fn schema_value_kind(schema: &Value) -> ValueKind {
    match schema.get("type") {
        Some(Value::String(t)) => ValueKind::from_type_name(t),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(|t| t.as_str())
            .find(|t| *t != "null")
            .map(ValueKind::from_type_name)
            .unwrap_or(ValueKind::Unspecified),
        _ => ValueKind::Unspecified,
    }
}

/// Follow local `$ref`s (`#/components/...`). Unresolvable references are
/// returned as-is and end up skipped by the caller.
fn resolve_ref<'a>(root: &'a Value, mut value: &'a Value) -> &'a Value {
    for _ in 0..MAX_REF_DEPTH {
        let Some(target) = value
            .get("$ref")
            .and_then(|r| r.as_str())
            .and_then(|r| r.strip_prefix('#'))
            .and_then(|pointer| root.pointer(pointer))
        else {
            return value;
        };
        value = target;
    }
    value
}
