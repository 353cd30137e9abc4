//! Parsed invocation → HTTP request → output
//!
//! Reads matched option values back out of a parse result, assembles the
//! request (URL, query, headers, body, authorization), sends it, and routes
//! the response body to its destination.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::ArgMatches;
use reqwest::blocking::{Body, Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

use crate::auth::Authorization;
use crate::builder::CommandTree;
use crate::error::DispatchError;
use crate::matcher::{self, HeaderAppender};
use crate::merge::MergedParameters;
use crate::spec::{HttpMethod, ParameterLocation};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Read access to the option values of one parsed method command.
pub trait MatchedOptions {
    /// Values given for `option` (long name without `--`), or `None` when the
    /// option was not given.
    fn values(&self, option: &str) -> Option<Vec<String>>;
}

impl MatchedOptions for ArgMatches {
    fn values(&self, option: &str) -> Option<Vec<String>> {
        // Unknown ids are an error from the try_ accessor, never a panic.
        let raw = self.try_get_raw(option).ok().flatten()?;
        if self.value_source(option) == Some(ValueSource::DefaultValue) {
            return None;
        }
        Some(raw.map(|v| v.to_string_lossy().into_owned()).collect())
    }
}

/// Option values supplied programmatically, bypassing the argument parser.
#[derive(Debug, Clone, Default)]
pub struct OptionValues(BTreeMap<String, Vec<String>>);

impl OptionValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value for `option` (long name without `--`). Repeat for arrays.
    pub fn with(mut self, option: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.entry(option.into()).or_default().push(value.into());
        self
    }
}

impl MatchedOptions for OptionValues {
    fn values(&self, option: &str) -> Option<Vec<String>> {
        self.0.get(option).cloned()
    }
}

/// Where the request body comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BodySource {
    #[default]
    None,
    Text(String),
    /// Streamed from the file at send time
    File(PathBuf),
    /// Streamed from standard input at send time
    Stdin,
}

impl BodySource {
    /// Pick one source: literal text, then file, then standard input.
    pub fn select(text: Option<String>, file: Option<PathBuf>, stdin: bool) -> Self {
        match (text, file) {
            (Some(text), _) => Self::Text(text),
            (None, Some(path)) => Self::File(path),
            (None, None) if stdin => Self::Stdin,
            (None, None) => Self::None,
        }
    }
}

/// Where the response body is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// Drain `body` completely into the target.
    fn write_from<R: Read + ?Sized>(&self, body: &mut R) -> Result<u64, DispatchError> {
        match self {
            Self::Stdout => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                let n = io::copy(body, &mut out).map_err(DispatchError::OutputWrite)?;
                out.flush().map_err(DispatchError::OutputWrite)?;
                Ok(n)
            }
            Self::File(path) => {
                let file = File::create(path).map_err(|source| DispatchError::OutputFileOpen {
                    path: path.clone(),
                    source,
                })?;
                let mut out = BufWriter::new(file);
                let n = io::copy(body, &mut out).map_err(DispatchError::OutputWrite)?;
                out.flush().map_err(DispatchError::OutputWrite)?;
                Ok(n)
            }
        }
    }
}

/// A fully specified request, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: Url,
    /// In application order; a later entry replaces an earlier one with the
    /// same name when sent.
    pub headers: Vec<(String, String)>,
    pub body: BodySource,
}

/// Turns a selected path/method and its option values into a request.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    tree: &'a CommandTree,
    authorization: &'a Authorization,
    header_appenders: &'a [HeaderAppender],
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a CommandTree, authorization: &'a Authorization) -> Self {
        Self {
            tree,
            authorization,
            header_appenders: &[],
        }
    }

    pub fn header_appenders(mut self, appenders: &'a [HeaderAppender]) -> Self {
        self.header_appenders = appenders;
        self
    }

    pub fn resolve<M: MatchedOptions + ?Sized>(
        &self,
        path: &str,
        method: HttpMethod,
        options: &M,
        body: BodySource,
    ) -> Result<RequestDescriptor, DispatchError> {
        let operation =
            self.tree
                .operation(path, method)
                .ok_or_else(|| DispatchError::UnknownOperation {
                    path: path.to_string(),
                    method: method.to_string(),
                })?;

        let resolved_path = resolve_path(path, options)?;
        let base_url = self.tree.base_url().ok_or(DispatchError::NoServer)?;
        let query = build_query(&operation.parameters, options);

        let raw = format!("{}{}", base_url.trim_end_matches('/'), resolved_path);
        let mut url = Url::parse(&raw).map_err(|e| DispatchError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        url.set_query(query.as_deref());
        // User info goes in last so it never passes through path or query encoding.
        self.authorization.apply_to_url(&mut url)?;

        let mut headers = collect_headers(&operation.parameters, options);
        headers.extend(matcher::collect(self.header_appenders, path, method));
        if let Some(value) = self.authorization.header_value() {
            headers.push(("Authorization".to_string(), value.to_string()));
        }

        Ok(RequestDescriptor {
            method,
            url,
            headers,
            body,
        })
    }
}

/// Look a parameter up under its bare option name, then its location-suffixed one.
fn lookup<M: MatchedOptions + ?Sized>(
    options: &M,
    name: &str,
    location: ParameterLocation,
) -> Option<Vec<String>> {
    options
        .values(name)
        .or_else(|| options.values(&format!("{name}-in-{location}")))
}

/// Substitute every `{token}` in `path`.
///
/// Path options are always required by the parser, so a missing value here
/// is an invariant breach; no request is ever built from a partial path.
fn resolve_path<M: MatchedOptions + ?Sized>(path: &str, options: &M) -> Result<String, DispatchError> {
    let mut resolved = String::with_capacity(path.len());
    let mut missing = Vec::new();
    let mut rest = path;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        let token = &rest[open + 1..close];
        resolved.push_str(&rest[..open]);
        match lookup(options, token, ParameterLocation::Path) {
            Some(values) => {
                let encoded: Vec<String> = values
                    .iter()
                    .map(|v| urlencoding::encode(v).into_owned())
                    .collect();
                resolved.push_str(&encoded.join(","));
            }
            None => missing.push(token.to_string()),
        }
        rest = &rest[close + 1..];
    }
    resolved.push_str(rest);

    if !missing.is_empty() {
        log::error!("path parameters not provided for {path}: {missing:?}");
        return Err(DispatchError::UnresolvedPathParameters {
            path: path.to_string(),
            missing,
        });
    }
    Ok(resolved)
}

/// `name=value` pairs joined with `&`, in declaration order. `None` when no
/// query parameter was given.
fn build_query<M: MatchedOptions + ?Sized>(params: &MergedParameters, options: &M) -> Option<String> {
    let mut pairs = Vec::new();
    for param in params.in_location(ParameterLocation::Query) {
        let Some(values) = lookup(options, &param.name, ParameterLocation::Query) else {
            continue;
        };
        let name = urlencoding::encode(&param.name);
        for value in values {
            pairs.push(format!("{name}={}", urlencoding::encode(&value)));
        }
    }
    (!pairs.is_empty()).then(|| pairs.join("&"))
}

fn collect_headers<M: MatchedOptions + ?Sized>(
    params: &MergedParameters,
    options: &M,
) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    for param in params.in_location(ParameterLocation::Header) {
        if let Some(values) = lookup(options, &param.name, ParameterLocation::Header) {
            headers.push((param.name.clone(), values.join(",")));
        }
    }

    let cookies: Vec<String> = params
        .in_location(ParameterLocation::Cookie)
        .filter_map(|param| {
            lookup(options, &param.name, ParameterLocation::Cookie)
                .map(|values| format!("{}={}", param.name, values.join(",")))
        })
        .collect();
    if !cookies.is_empty() {
        headers.push(("Cookie".to_string(), cookies.join("; ")));
    }
    headers
}

/// Send `request`. A file or stdin body is opened here and owned by the
/// request, so it is released when the exchange ends either way.
pub fn send(client: &Client, request: RequestDescriptor) -> Result<Response, DispatchError> {
    send_with_stdin(client, request, io::stdin())
}

/// [`send`] with `stdin` standing in for standard input.
fn send_with_stdin<S>(client: &Client, request: RequestDescriptor, stdin: S) -> Result<Response, DispatchError>
where
    S: Read + Send + 'static,
{
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let invalid = || DispatchError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        headers.insert(header_name, header_value);
    }

    log::info!("request: {} {}", request.method, redacted(&request.url));
    log::debug!("request headers: {:?}", headers.keys().collect::<Vec<_>>());

    let mut builder = client
        .request(request.method.to_reqwest(), request.url)
        .headers(headers);
    builder = match request.body {
        BodySource::None => builder,
        BodySource::Text(text) => builder.body(text),
        BodySource::File(path) => {
            let file = File::open(&path).map_err(|source| DispatchError::BodyFileOpen {
                path: path.clone(),
                source,
            })?;
            builder.body(file)
        }
        BodySource::Stdin => builder.body(Body::new(stdin)),
    };

    let response = builder.send().map_err(DispatchError::RequestFailed)?;
    log::info!("response status: {}", response.status());
    log::debug!("response headers: {:?}", response.headers());
    Ok(response)
}

/// Route the response body and compute the exit code.
///
/// The body is always drained to `output` first; a status mismatch against
/// `expected` only changes the exit code.
pub fn finalize<R: Read + ?Sized>(
    status: u16,
    body: &mut R,
    expected: Option<u16>,
    output: &OutputTarget,
) -> Result<i32, DispatchError> {
    let written = output.write_from(body)?;
    log::debug!("wrote {written} byte(s) of response body");

    match expected {
        Some(expected) if expected != status => {
            log::warn!("expected HTTP status {expected}, got {status}");
            eprintln!("Unexpected HTTP status code: expected {expected}, got {status}");
            Ok(EXIT_FAILURE)
        }
        _ => Ok(EXIT_SUCCESS),
    }
}

fn redacted(url: &Url) -> String {
    if url.password().is_none() {
        return url.to_string();
    }
    let mut shown = url.clone();
    // Setting a password only fails for URLs that cannot carry one.
    let _ = shown.set_password(Some("***"));
    shown.to_string()
}
