//! Turn an OpenAPI v3 document into a runnable REST command-line client.
//!
//! Every path becomes a sub-command, every operation on it a
//! sub-sub-command, and every parameter an option. Running the generated
//! command sends the corresponding HTTP request and writes the response body.
//!
//! # Usage
//!
//! ```no_run
//! use openapi_restcli::{build_commands, parse_document, Authorization, CliConfig, RestCli};
//!
//! let spec = r#"{
//!   "openapi": "3.0.0",
//!   "info": { "title": "KVS", "version": "1.0.0" },
//!   "servers": [{ "url": "http://localhost:18080" }],
//!   "paths": { "/{key}": { "get": { "parameters": [{ "name": "key", "in": "path" }] } } }
//! }"#;
//! let document = parse_document(spec).unwrap();
//! let tree = build_commands(&CliConfig::new("kvscli"), &document).unwrap();
//!
//! let cli = RestCli::new(tree).authorization(Authorization::header("token abc"));
//! let code = cli.execute(["kvscli", "--assert-http-status-code=200", "/{key}", "get", "--key=0"]);
//! std::process::exit(code);
//! ```

pub mod auth;
pub mod builder;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod matcher;
pub mod merge;
pub mod naming;
pub mod spec;

pub use auth::Authorization;
pub use builder::{build_commands, CliConfig, CommandNode, CommandTree, NodeKind, OptionSpec};
pub use dispatch::{
    finalize, send, BodySource, MatchedOptions, OptionValues, OutputTarget, RequestDescriptor,
    Resolver, EXIT_FAILURE, EXIT_SUCCESS,
};
pub use error::{BuildError, DispatchError, MatcherError, SpecError};
pub use exec::RestCli;
pub use matcher::{Appender, HeaderAppender, OptionAppender, PathMatcher};
pub use merge::{merge, MergedParameters};
pub use naming::{option_name, option_value_kind, CliValueKind};
pub use spec::{parse_document, ApiDocument, HttpMethod, Parameter, ParameterLocation, ValueKind};

// Re-export dependencies for downstream crates
pub use clap;
pub use reqwest;
