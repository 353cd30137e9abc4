//! Command-line invocation driver
//!
//! Parses process arguments against a [`CommandTree`], selects the path and
//! method, resolves and sends the request, and turns the outcome into an exit
//! code.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::ArgMatches;
use clap_complete::Shell;
use reqwest::blocking::Client;

use crate::auth::Authorization;
use crate::builder::{
    CommandTree, OPT_ASSERT_STATUS, OPT_COMPLETION_SCRIPT, OPT_INPUT_FILE, OPT_OUTPUT_FILE,
    OPT_REQUEST_BODY, OPT_STDIN,
};
use crate::dispatch::{finalize, send, BodySource, OutputTarget, Resolver, EXIT_FAILURE, EXIT_SUCCESS};
use crate::error::DispatchError;
use crate::matcher::{self, HeaderAppender, OptionAppender};
use crate::spec::HttpMethod;

/// A runnable CLI over a built command tree.
///
/// The tree is shared read-only, so one `RestCli` (or several built from the
/// same `Arc<CommandTree>`) can execute any number of invocations.
#[derive(Debug, Clone)]
pub struct RestCli {
    tree: Arc<CommandTree>,
    authorization: Authorization,
    option_appenders: Vec<OptionAppender>,
    header_appenders: Vec<HeaderAppender>,
    client: Option<Client>,
}

impl RestCli {
    pub fn new(tree: impl Into<Arc<CommandTree>>) -> Self {
        Self {
            tree: tree.into(),
            authorization: Authorization::None,
            option_appenders: Vec::new(),
            header_appenders: Vec::new(),
            client: None,
        }
    }

    pub fn authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn option_appender(mut self, appender: OptionAppender) -> Self {
        self.option_appenders.push(appender);
        self
    }

    pub fn header_appender(mut self, appender: HeaderAppender) -> Self {
        self.header_appenders.push(appender);
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, TLS).
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Run one invocation. `args` starts with the program name, as
    /// `std::env::args_os()` does.
    pub fn execute<I, T>(&self, args: I) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        match self.run(args) {
            Ok(code) => code,
            Err(e) => {
                log::error!("{e}");
                eprintln!("{}", error_chain(&e));
                EXIT_FAILURE
            }
        }
    }

    fn run(&self, args: Vec<OsString>) -> Result<i32, DispatchError> {
        let args = self.append_options(args);
        let mut cmd = self.tree.to_command();
        let matches = match cmd.try_get_matches_from_mut(args) {
            Ok(matches) => matches,
            Err(e) => {
                // Help and version requests land here too, with exit code 0.
                if let Err(err) = e.print() {
                    log::debug!("failed to print command-line message: {err}");
                }
                return Ok(e.exit_code());
            }
        };

        if let Some(target) = matches.get_one::<String>(OPT_COMPLETION_SCRIPT) {
            write_completion_script(&mut cmd, target)?;
            return Ok(EXIT_SUCCESS);
        }

        // clap accepts a single sub-command per level, so the last one given
        // is the only one present.
        let Some((path, path_matches)) = matches.subcommand() else {
            eprintln!("No path specified.");
            return Ok(EXIT_FAILURE);
        };
        let Some((method, method_matches)) = path_matches.subcommand() else {
            eprintln!("No method specified.");
            return Ok(EXIT_FAILURE);
        };
        let method: HttpMethod = method.parse()?;

        let request = Resolver::new(&self.tree, &self.authorization)
            .header_appenders(&self.header_appenders)
            .resolve(path, method, method_matches, body_source(&matches))?;
        let expected = asserted_status(&matches)?;
        let output = output_target(&matches);

        let client = match &self.client {
            Some(client) => client.clone(),
            None => default_client()?,
        };
        let mut response = send(&client, request)?;
        let status = response.status().as_u16();
        finalize(status, &mut response, expected, &output)
    }

    /// Append option-appender arguments for the path/method named in `args`.
    fn append_options(&self, mut args: Vec<OsString>) -> Vec<OsString> {
        if self.option_appenders.is_empty() {
            return args;
        }
        let Some((path, method)) = locate_operation(&self.tree, &args) else {
            return args;
        };
        let extra = matcher::collect(&self.option_appenders, &path, method);
        args.extend(extra.into_iter().map(OsString::from));
        args
    }
}

/// Find the path sub-command and the method following it, without parsing.
/// Option appenders need this before the real parse.
///
/// Values of root options given as `--name value` are skipped, so a value
/// that spells a path is never taken for the path itself.
fn locate_operation(tree: &CommandTree, args: &[OsString]) -> Option<(String, HttpMethod)> {
    let root = tree.root();
    let mut tokens = args.iter().skip(1).map(|a| a.to_str().unwrap_or_default());
    let path = loop {
        let token = tokens.next()?;
        let option = token.strip_prefix("--").and_then(|name| root.option(name));
        if let Some(option) = option {
            if option.takes_separate_value() {
                tokens.next();
            }
            continue;
        }
        if root.child(token).is_some() {
            break token;
        }
    };
    let path_node = root.child(path)?;
    let method = tokens.find(|t| path_node.child(t).is_some())?;
    Some((path.to_string(), method.parse().ok()?))
}

fn body_source(matches: &ArgMatches) -> BodySource {
    BodySource::select(
        matches.get_one::<String>(OPT_REQUEST_BODY).cloned(),
        matches.get_one::<String>(OPT_INPUT_FILE).map(PathBuf::from),
        matches.get_flag(OPT_STDIN),
    )
}

fn asserted_status(matches: &ArgMatches) -> Result<Option<u16>, DispatchError> {
    let Some(value) = matches.get_one::<i64>(OPT_ASSERT_STATUS) else {
        return Ok(None);
    };
    match u16::try_from(*value) {
        Ok(status) if (100..=999).contains(&status) => Ok(Some(status)),
        _ => Err(DispatchError::InvalidStatusCode {
            value: value.to_string(),
        }),
    }
}

fn output_target(matches: &ArgMatches) -> OutputTarget {
    matches
        .get_one::<String>(OPT_OUTPUT_FILE)
        .map_or(OutputTarget::Stdout, |path| OutputTarget::File(PathBuf::from(path)))
}

fn default_client() -> Result<Client, DispatchError> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DispatchError::RequestFailed)
}

/// Print the bash completion script to stdout (empty target) or to a new file.
fn write_completion_script(cmd: &mut clap::Command, target: &str) -> Result<(), DispatchError> {
    let name = cmd.get_name().to_string();
    if target.is_empty() {
        let stdout = io::stdout();
        clap_complete::generate(Shell::Bash, cmd, name, &mut stdout.lock());
        return Ok(());
    }

    let path = Path::new(target);
    let to_error = |source| DispatchError::CompletionScript {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(to_error)?;
    clap_complete::generate(Shell::Bash, cmd, name, &mut file);
    file.flush().map_err(to_error)?;
    log::info!("wrote bash completion script to {}", path.display());
    Ok(())
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_commands, CliConfig};
    use crate::matcher::PathMatcher;
    use crate::spec::ApiDocument;
    use serde_json::json;

    fn tree() -> CommandTree {
        let doc = ApiDocument::from_value(&json!({
            "info": { "title": "KVS", "version": "0.0.1" },
            "servers": [{ "url": "http://127.0.0.1:9" }],
            "paths": {
                "/": { "get": {}, "post": {} },
                "/{key}": {
                    "get": { "parameters": [{ "name": "key", "in": "path", "schema": { "type": "integer" } }] }
                }
            }
        }))
        .unwrap();
        build_commands(&CliConfig::new("kvscli"), &doc).unwrap()
    }

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn locate_operation_finds_path_and_method() {
        let tree = tree();
        let found = locate_operation(&tree, &args(&["kvscli", "--stdin", "/{key}", "get", "--key=1"]));
        assert_eq!(found, Some(("/{key}".to_string(), HttpMethod::Get)));
    }

    #[test]
    fn locate_operation_skips_values_of_root_options() {
        let tree = tree();
        let argv = args(&["kvscli", "--output-file", "/", "/{key}", "get", "--key=1"]);

        let matches = tree.to_command().try_get_matches_from(argv.clone()).unwrap();
        assert_eq!(matches.subcommand_name(), Some("/{key}"));
        assert_eq!(
            locate_operation(&tree, &argv),
            Some(("/{key}".to_string(), HttpMethod::Get))
        );

        let argv = args(&["kvscli", "--request-body", "/{key}", "/", "post"]);
        assert_eq!(locate_operation(&tree, &argv), Some(("/".to_string(), HttpMethod::Post)));
    }

    #[test]
    fn append_options_follows_parsed_operation() {
        let cli = RestCli::new(tree()).option_appender(OptionAppender::new(
            PathMatcher::exact("/"),
            [HttpMethod::Get],
            |opts| opts.push("--unexpected".into()),
        ));

        let argv = args(&["kvscli", "--output-file", "/", "/{key}", "get", "--key=1"]);
        assert_eq!(cli.append_options(argv.clone()), argv);
    }

    #[test]
    fn locate_operation_needs_both_levels() {
        let tree = tree();
        assert_eq!(locate_operation(&tree, &args(&["kvscli", "/{key}"])), None);
        assert_eq!(locate_operation(&tree, &args(&["kvscli", "get"])), None);
    }

    #[test]
    fn append_options_adds_arguments_for_matching_operation() {
        let cli = RestCli::new(tree()).option_appender(OptionAppender::new(
            PathMatcher::exact("/{key}"),
            [HttpMethod::Get],
            |opts| opts.push("--key=7".into()),
        ));

        let appended = cli.append_options(args(&["kvscli", "/{key}", "get"]));
        assert_eq!(appended, args(&["kvscli", "/{key}", "get", "--key=7"]));

        let untouched = cli.append_options(args(&["kvscli", "/", "get"]));
        assert_eq!(untouched, args(&["kvscli", "/", "get"]));
    }

    #[test]
    fn execute_without_path_fails() {
        assert_eq!(RestCli::new(tree()).execute(["kvscli"]), EXIT_FAILURE);
    }

    #[test]
    fn execute_without_method_fails() {
        assert_eq!(RestCli::new(tree()).execute(["kvscli", "/"]), EXIT_FAILURE);
    }

    #[test]
    fn execute_help_and_version_succeed() {
        let cli = RestCli::new(tree());
        assert_eq!(cli.execute(["kvscli", "--help"]), EXIT_SUCCESS);
        assert_eq!(cli.execute(["kvscli", "--version"]), EXIT_SUCCESS);
        assert_eq!(cli.execute(["kvscli", "/{key}", "--help"]), EXIT_SUCCESS);
        assert_eq!(cli.execute(["kvscli", "/{key}", "get", "--help"]), EXIT_SUCCESS);
    }

    #[test]
    fn execute_rejects_missing_required_path_option() {
        assert_ne!(RestCli::new(tree()).execute(["kvscli", "/{key}", "get"]), EXIT_SUCCESS);
    }

    #[test]
    fn execute_reports_transport_failure() {
        // Nothing listens on the discard port.
        assert_eq!(RestCli::new(tree()).execute(["kvscli", "/", "get"]), EXIT_FAILURE);
    }

    #[test]
    fn asserted_status_rejects_out_of_range_values() {
        let tree = tree();
        let matches = tree
            .to_command()
            .try_get_matches_from(["kvscli", "--assert-http-status-code=70000", "/", "get"])
            .unwrap();
        assert!(matches!(
            asserted_status(&matches),
            Err(DispatchError::InvalidStatusCode { .. })
        ));
    }

    #[test]
    fn completion_script_goes_to_new_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("kvscli.bash");
        let target = script.to_str().unwrap();
        let cli = RestCli::new(tree());

        let flag = format!("--generate-bash-auto-completion-script={target}");
        assert_eq!(cli.execute(["kvscli", flag.as_str()]), EXIT_SUCCESS);
        assert!(std::fs::read_to_string(&script).unwrap().contains("kvscli"));

        assert_eq!(cli.execute(["kvscli", flag.as_str()]), EXIT_FAILURE);
    }

    #[test]
    fn error_chain_joins_sources() {
        let err = DispatchError::OutputWrite(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(error_chain(&err), "failed to write response body: disk full");
    }
}
