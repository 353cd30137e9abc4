//! `restcli <openapi-document> [<global-options>] <path> <method> [<method-options>]`
//!
//! Authorization comes from the environment: `RESTCLI_AUTHORIZATION` is sent
//! as the `Authorization` header; otherwise `RESTCLI_USERNAME` and
//! `RESTCLI_PASSWORD` are embedded in the request URL.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use openapi_restcli::{build_commands, parse_document, Authorization, CliConfig, RestCli, EXIT_FAILURE};

const COMMAND_NAME: &str = "restcli";

fn main() {
    env_logger::init();

    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let mut args = std::env::args_os().skip(1);
    let Some(document_path) = args.next().map(PathBuf::from) else {
        eprintln!(
            "usage: {COMMAND_NAME} <openapi-document> [<global-options>] <path> <method> [<method-options>]"
        );
        return Ok(EXIT_FAILURE);
    };

    let text = fs::read_to_string(&document_path)
        .with_context(|| format!("failed to read {}", document_path.display()))?;
    let document = parse_document(&text)
        .with_context(|| format!("failed to parse {}", document_path.display()))?;
    let tree = build_commands(&CliConfig::new(COMMAND_NAME), &document)?;

    let cli = RestCli::new(tree).authorization(authorization_from_env());
    let invocation = std::iter::once(OsString::from(COMMAND_NAME)).chain(args);
    Ok(cli.execute(invocation))
}

fn authorization_from_env() -> Authorization {
    if let Ok(header) = std::env::var("RESTCLI_AUTHORIZATION") {
        return Authorization::header(header);
    }
    match (std::env::var("RESTCLI_USERNAME"), std::env::var("RESTCLI_PASSWORD")) {
        (Ok(username), Ok(password)) => Authorization::user_info(username, password),
        _ => Authorization::None,
    }
}
