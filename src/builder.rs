//! API document → command tree builder
//!
//! Synthesizes a three-level tree (root → path → method) from an
//! [`ApiDocument`] and translates it into a clap `Command`.
//!
//! Structure: `<name> [global options] <path> <method> [--parameter options]`

use std::collections::BTreeMap;

use clap::{value_parser, Arg, ArgAction, ArgGroup, Command};
use indexmap::IndexMap;

use crate::error::BuildError;
use crate::merge::{merge, MergedParameters};
use crate::naming::{checked_value_kind, option_name, CliValueKind};
use crate::spec::{ApiDocument, HttpMethod, Operation, ParameterLocation};

pub const OPT_COMPLETION_SCRIPT: &str = "generate-bash-auto-completion-script";
pub const OPT_REQUEST_BODY: &str = "request-body";
pub const OPT_STDIN: &str = "stdin";
pub const OPT_INPUT_FILE: &str = "input-file";
pub const OPT_OUTPUT_FILE: &str = "output-file";
pub const OPT_ASSERT_STATUS: &str = "assert-http-status-code";

const BODY_SOURCE_GROUP: &str = "body-source";
const DEFAULT_ASSERTED_STATUS: &str = "200";

/// Option names clap already defines on every sub-command.
const RESERVED_OPTIONS: &[&str] = &["help"];

/// Configuration for building a CLI from an API document.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CliConfig {
    /// Root command name (e.g. "kvscli", "restcli")
    pub name: String,
    /// Root command description; defaults to the document's `info.summary`
    pub about: Option<String>,
    /// Version printed by `--version`; defaults to `info.version`
    pub version: Option<String>,
    /// Base URL used instead of the document's first server
    pub base_url: Option<String>,
}

impl CliConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: None,
            version: None,
            base_url: None,
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Level of a node in the command tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Path,
    Method,
}

/// A synthesized command-line option.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct OptionSpec {
    /// Long name without the leading `--`; also the clap argument id
    pub name: String,
    pub required: bool,
    pub value_kind: CliValueKind,
    pub description: String,
    /// Set for options generated from a document parameter
    pub location: Option<ParameterLocation>,
    pub value_name: Option<String>,
    /// Value used when the option is given without `=value`
    pub optional_value: Option<String>,
    /// Mutually exclusive group the option belongs to
    pub group: Option<String>,
}

impl OptionSpec {
    fn new(name: &str, value_kind: CliValueKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            value_kind,
            description: description.to_string(),
            location: None,
            value_name: value_kind.value_name().map(String::from),
            optional_value: None,
            group: None,
        }
    }

    fn value_name(mut self, value_name: &str) -> Self {
        self.value_name = Some(value_name.to_string());
        self
    }

    fn optional_value(mut self, value: &str) -> Self {
        self.optional_value = Some(value.to_string());
        self
    }

    fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    /// Whether `--name <value>` consumes the following argument.
    pub(crate) fn takes_separate_value(&self) -> bool {
        self.value_kind != CliValueKind::Flag
            && self.value_kind != CliValueKind::Boolean
            && self.optional_value.is_none()
    }

    /// The option as typed on the command line, e.g. `--id-in-path`.
    pub fn flag(&self) -> String {
        format!("--{}", self.name)
    }
}

/// One node of the synthesized command tree.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CommandNode {
    pub name: String,
    pub kind: NodeKind,
    pub about: String,
    pub options: Vec<OptionSpec>,
    pub children: Vec<CommandNode>,
}

impl CommandNode {
    fn new(name: impl Into<String>, kind: NodeKind, about: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            about: about.into(),
            options: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&CommandNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// The merged parameter table of one path/method pair.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ResolvedOperation {
    pub path: String,
    pub method: HttpMethod,
    pub parameters: MergedParameters,
}

/// A fully built command tree. Read-only; share it through `Arc` to reuse it
/// across invocations.
#[derive(Debug, Clone)]
pub struct CommandTree {
    root: CommandNode,
    version: String,
    base_url: Option<String>,
    operations: BTreeMap<(String, HttpMethod), ResolvedOperation>,
}

impl CommandTree {
    pub fn root(&self) -> &CommandNode {
        &self.root
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Configured base URL, or the document's first server.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&ResolvedOperation> {
        self.operations.get(&(path.to_string(), method))
    }

    /// Translate the tree into a clap `Command`.
    pub fn to_command(&self) -> Command {
        node_command(&self.root).version(self.version.clone())
    }
}

/// Build the command tree for `document`.
///
/// Fails only on parameter declarations that cannot become options. A
/// document without servers is accepted; that is reported when a request is
/// resolved.
pub fn build_commands(config: &CliConfig, document: &ApiDocument) -> Result<CommandTree, BuildError> {
    let about = config.about.clone().unwrap_or_else(|| document.summary.clone());
    let mut root = CommandNode::new(config.name.clone(), NodeKind::Root, about);
    root.options = infrastructure_options();

    let mut operations = BTreeMap::new();
    for (path, item) in &document.paths {
        let mut path_node = CommandNode::new(path.clone(), NodeKind::Path, item.summary.clone());

        for (method, operation) in item.operations() {
            let parameters = merge(&item.parameters, &operation.parameters);
            path_node
                .children
                .push(method_node(path, method, operation, &parameters)?);
            operations.insert(
                (path.clone(), method),
                ResolvedOperation {
                    path: path.clone(),
                    method,
                    parameters,
                },
            );
        }

        log::debug!("built path command {path} with {} method(s)", path_node.children.len());
        root.children.push(path_node);
    }

    Ok(CommandTree {
        root,
        version: config.version.clone().unwrap_or_else(|| document.version.clone()),
        base_url: config
            .base_url
            .clone()
            .or_else(|| document.servers.first().cloned()),
        operations,
    })
}

fn method_node(
    path: &str,
    method: HttpMethod,
    operation: &Operation,
    parameters: &MergedParameters,
) -> Result<CommandNode, BuildError> {
    let mut node = CommandNode::new(method.as_str(), NodeKind::Method, operation.summary.clone());

    for (name, locations) in parameters.iter() {
        for (location, param) in locations {
            let option = option_name(name, *location, locations.len());
            if RESERVED_OPTIONS.contains(&option.as_str()) || node.option(&option).is_some() {
                return Err(BuildError::OptionNameCollision {
                    path: path.to_string(),
                    method: method.as_str().to_string(),
                    option,
                });
            }

            if let Some(reason) = long_name_defect(&option) {
                return Err(BuildError::InvalidOptionName {
                    path: path.to_string(),
                    method: method.as_str().to_string(),
                    option,
                    reason,
                });
            }

            let value_kind = checked_value_kind(&param.value_kind, path, method.as_str(), name, *location)?;
            let mut spec = OptionSpec::new(&option, value_kind, &param.description);
            // An unresolved path segment can never produce a valid URI.
            spec.required = param.required || *location == ParameterLocation::Path;
            spec.location = Some(*location);
            node.options.push(spec);
        }
    }

    Ok(node)
}

/// Why `name` cannot be typed as `--name`, if it cannot.
fn long_name_defect(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("name is empty")
    } else if name.starts_with('-') {
        Some("name starts with `-`")
    } else if name.contains('=') {
        Some("name contains `=`")
    } else if name.chars().any(char::is_whitespace) {
        Some("name contains whitespace")
    } else {
        None
    }
}

fn infrastructure_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec::new(
            OPT_COMPLETION_SCRIPT,
            CliValueKind::String,
            "Generate Bash auto completion script and exit.",
        )
        .value_name("file")
        .optional_value(""),
        OptionSpec::new(OPT_REQUEST_BODY, CliValueKind::String, "Request body.")
            .value_name("text")
            .group(BODY_SOURCE_GROUP),
        OptionSpec::new(OPT_STDIN, CliValueKind::Flag, "Read the request body from standard input.")
            .group(BODY_SOURCE_GROUP),
        OptionSpec::new(OPT_INPUT_FILE, CliValueKind::String, "Read the request body from a file.")
            .value_name("path")
            .group(BODY_SOURCE_GROUP),
        OptionSpec::new(
            OPT_OUTPUT_FILE,
            CliValueKind::String,
            "Write the response body to a file instead of standard output.",
        )
        .value_name("path"),
        OptionSpec::new(
            OPT_ASSERT_STATUS,
            CliValueKind::Integer,
            "Fail unless the response has this HTTP status code (200 when no value is given).",
        )
        .value_name("int")
        .optional_value(DEFAULT_ASSERTED_STATUS),
    ]
}

fn node_command(node: &CommandNode) -> Command {
    let mut cmd = Command::new(node.name.clone());
    if !node.about.is_empty() {
        cmd = cmd.about(node.about.clone());
    }

    let mut groups: IndexMap<&str, Vec<String>> = IndexMap::new();
    for option in &node.options {
        cmd = cmd.arg(option_arg(option));
        if let Some(group) = &option.group {
            groups.entry(group.as_str()).or_default().push(option.name.clone());
        }
    }
    for (group, members) in groups {
        cmd = cmd.group(ArgGroup::new(group.to_string()).args(members).multiple(false));
    }

    for child in &node.children {
        cmd = cmd.subcommand(node_command(child));
    }
    cmd
}

fn option_arg(option: &OptionSpec) -> Arg {
    let mut arg = Arg::new(option.name.clone())
        .long(option.name.clone())
        .help(option.description.clone())
        .required(option.required);
    if let Some(value_name) = &option.value_name {
        arg = arg.value_name(value_name.clone());
    }

    arg = match option.value_kind {
        CliValueKind::Flag => arg.action(ArgAction::SetTrue),
        CliValueKind::String => arg.action(ArgAction::Set),
        CliValueKind::Integer => arg.action(ArgAction::Set).value_parser(value_parser!(i64)),
        CliValueKind::Boolean => arg
            .action(ArgAction::Set)
            .value_parser(value_parser!(bool))
            .num_args(0..=1)
            .default_missing_value("true"),
        CliValueKind::StringList => arg.action(ArgAction::Append).value_delimiter(','),
    };

    if let Some(value) = &option.optional_value {
        arg = arg
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value(value.clone());
    }
    arg
}
