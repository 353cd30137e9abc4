//! Error types for the openapi-restcli crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading an API document from text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecError {
    #[error("API document is neither valid JSON ({json}) nor valid YAML")]
    Unparseable {
        json: serde_json::Error,
        #[source]
        yaml: serde_yaml_ng::Error,
    },

    #[error("API document root must be an object")]
    NotAnObject,
}

/// Errors that abort command-tree construction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error("unsupported type `{kind}` for {location} parameter `{name}` on {method} {path}")]
    UnsupportedParameterType {
        path: String,
        method: String,
        name: String,
        location: String,
        kind: String,
    },

    #[error("option --{option} is synthesized more than once on {method} {path}")]
    OptionNameCollision {
        path: String,
        method: String,
        option: String,
    },

    #[error("parameter `{option}` on {method} {path} cannot be a long option: {reason}")]
    InvalidOptionName {
        path: String,
        method: String,
        option: String,
        reason: &'static str,
    },
}

/// Errors raised when compiling a path matcher.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MatcherError {
    #[error("invalid glob pattern")]
    Glob(#[from] glob::PatternError),

    #[error("invalid regular expression")]
    Regex(#[from] regex::Error),
}

/// Errors that can occur while resolving and executing an invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("no server specified in the API document")]
    NoServer,

    #[error("no operation {method} on path {path}")]
    UnknownOperation { path: String, method: String },

    #[error("unsupported HTTP method: {method}")]
    UnsupportedMethod { method: String },

    #[error("path parameters not provided for {path}: {missing:?}")]
    UnresolvedPathParameters { path: String, missing: Vec<String> },

    #[error("invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    #[error("invalid HTTP status code: {value}")]
    InvalidStatusCode { value: String },

    #[error("failed to open request body file: {}", path.display())]
    BodyFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed")]
    RequestFailed(#[source] reqwest::Error),

    #[error("failed to write response body")]
    OutputWrite(#[source] std::io::Error),

    #[error("failed to open output file: {}", path.display())]
    OutputFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write completion script: {}", path.display())]
    CompletionScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
