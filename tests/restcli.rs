//! End-to-end runs of a generated CLI against a mock HTTP server.

use std::fs;
use std::path::Path;

use mockito::{Matcher, Server};
use openapi_restcli::{
    build_commands, parse_document, Authorization, CliConfig, CommandTree, HeaderAppender,
    HttpMethod, OptionAppender, PathMatcher, RestCli, EXIT_FAILURE, EXIT_SUCCESS,
};

/// A small key-value store API, served from `server_url`.
fn kvs_tree(server_url: &str) -> CommandTree {
    let spec = format!(
        r#"{{
  "openapi": "3.0.0",
  "info": {{ "title": "KVS", "summary": "Key-value store", "version": "0.0.1" }},
  "servers": [{{ "url": "{server_url}" }}],
  "paths": {{
    "/": {{
      "get": {{ "summary": "List keys" }},
      "post": {{ "summary": "Create a value" }}
    }},
    "/{{key}}": {{
      "parameters": [{{ "name": "key", "in": "path", "required": true, "schema": {{ "type": "integer" }} }}],
      "get": {{ "summary": "Read a value" }},
      "put": {{ "summary": "Replace a value" }},
      "delete": {{ "summary": "Delete a value" }}
    }},
    "/search": {{
      "get": {{
        "parameters": [
          {{ "name": "q", "in": "query", "required": true }},
          {{ "name": "tags", "in": "query", "schema": {{ "type": "array", "items": {{ "type": "string" }} }} }},
          {{ "name": "X-Request-Id", "in": "header" }}
        ]
      }}
    }}
  }}
}}"#
    );
    let document = parse_document(&spec).unwrap();
    build_commands(&CliConfig::new("kvscli"), &document).unwrap()
}

fn output_flag(path: &Path) -> String {
    format!("--output-file={}", path.display())
}

#[test]
fn post_with_literal_body_and_matching_assertion() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/")
        .match_body("foo")
        .with_status(201)
        .with_body("0")
        .create();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("created.txt");

    let code = RestCli::new(kvs_tree(&server.url())).execute([
        "kvscli",
        "--request-body=foo",
        output_flag(&out).as_str(),
        "--assert-http-status-code=201",
        "/",
        "post",
    ]);

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(fs::read_to_string(&out).unwrap(), "0");
    mock.assert();
}

#[test]
fn status_mismatch_fails_but_still_writes_body() {
    let mut server = Server::new();
    server
        .mock("GET", "/3")
        .with_status(404)
        .with_body("not found")
        .create();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("value.txt");

    let code = RestCli::new(kvs_tree(&server.url())).execute([
        "kvscli",
        output_flag(&out).as_str(),
        "--assert-http-status-code",
        "/{key}",
        "get",
        "--key=3",
    ]);

    assert_eq!(code, EXIT_FAILURE);
    assert_eq!(fs::read_to_string(&out).unwrap(), "not found");
}

#[test]
fn error_status_without_assertion_succeeds() {
    let mut server = Server::new();
    server.mock("DELETE", "/9").with_status(500).create();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let code = RestCli::new(kvs_tree(&server.url())).execute([
        "kvscli",
        output_flag(&out).as_str(),
        "/{key}",
        "delete",
        "--key=9",
    ]);
    assert_eq!(code, EXIT_SUCCESS);
}

#[test]
fn put_streams_body_from_input_file() {
    let mut server = Server::new();
    let mock = server
        .mock("PUT", "/0")
        .match_body("bar")
        .with_status(200)
        .create();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("value.txt");
    fs::write(&input, "bar").unwrap();
    let out = dir.path().join("out.txt");

    let input_flag = format!("--input-file={}", input.display());
    let code = RestCli::new(kvs_tree(&server.url())).execute([
        "kvscli",
        input_flag.as_str(),
        output_flag(&out).as_str(),
        "--assert-http-status-code=200",
        "/{key}",
        "put",
        "--key=0",
    ]);

    assert_eq!(code, EXIT_SUCCESS);
    mock.assert();
}

#[test]
fn body_sources_are_mutually_exclusive() {
    let code = RestCli::new(kvs_tree("http://127.0.0.1:9")).execute([
        "kvscli",
        "--request-body=foo",
        "--stdin",
        "/",
        "post",
    ]);
    assert_ne!(code, EXIT_SUCCESS);
}

#[test]
fn query_and_header_parameters_are_sent() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "a b".into()),
            Matcher::Regex("tags=x&tags=y".into()),
        ]))
        .match_header("x-request-id", "r-1")
        .with_status(200)
        .create();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let code = RestCli::new(kvs_tree(&server.url())).execute([
        "kvscli",
        output_flag(&out).as_str(),
        "/search",
        "get",
        "--q=a b",
        "--tags=x,y",
        "--X-Request-Id=r-1",
    ]);

    assert_eq!(code, EXIT_SUCCESS);
    mock.assert();
}

#[test]
fn header_authorization_is_sent() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/")
        .match_header("authorization", "token abc")
        .with_status(200)
        .create();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let code = RestCli::new(kvs_tree(&server.url()))
        .authorization(Authorization::header("token abc"))
        .execute(["kvscli", output_flag(&out).as_str(), "/", "get"]);

    assert_eq!(code, EXIT_SUCCESS);
    mock.assert();
}

#[test]
fn user_info_authorization_reaches_server_as_basic_auth() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/")
        .match_header("authorization", "Basic YWxpY2U6czNjcmV0")
        .with_status(200)
        .create();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let code = RestCli::new(kvs_tree(&server.url()))
        .authorization(Authorization::user_info("alice", "s3cret"))
        .execute(["kvscli", output_flag(&out).as_str(), "/", "get"]);

    assert_eq!(code, EXIT_SUCCESS);
    mock.assert();
}

#[test]
fn option_appender_supplies_missing_parameter() {
    let mut server = Server::new();
    let mock = server.mock("GET", "/7").with_status(200).create();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let cli = RestCli::new(kvs_tree(&server.url())).option_appender(OptionAppender::new(
        PathMatcher::exact("/{key}"),
        [HttpMethod::Get],
        |options| options.push("--key=7".into()),
    ));
    let code = cli.execute(["kvscli", output_flag(&out).as_str(), "/{key}", "get"]);

    assert_eq!(code, EXIT_SUCCESS);
    mock.assert();
}

#[test]
fn header_appender_adds_headers_to_matching_operations() {
    let mut server = Server::new();
    let listed = server
        .mock("GET", "/")
        .match_header("x-api-version", "2")
        .with_status(200)
        .create();
    let created = server
        .mock("POST", "/")
        .match_header("x-api-version", Matcher::Missing)
        .with_status(201)
        .create();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let cli = RestCli::new(kvs_tree(&server.url())).header_appender(HeaderAppender::new(
        PathMatcher::all().except(PathMatcher::regex("/\\{.*\\}").unwrap()),
        [HttpMethod::Get],
        |headers| headers.push(("X-API-Version".into(), "2".into())),
    ));

    assert_eq!(cli.execute(["kvscli", output_flag(&out).as_str(), "/", "get"]), EXIT_SUCCESS);
    assert_eq!(cli.execute(["kvscli", output_flag(&out).as_str(), "/", "post"]), EXIT_SUCCESS);
    listed.assert();
    created.assert();
}

#[test]
fn help_and_version_exit_successfully() {
    let cli = RestCli::new(kvs_tree("http://127.0.0.1:9"));
    assert_eq!(cli.execute(["kvscli", "--help"]), EXIT_SUCCESS);
    assert_eq!(cli.execute(["kvscli", "--version"]), EXIT_SUCCESS);
    assert_eq!(cli.execute(["kvscli", "/search", "get", "--help"]), EXIT_SUCCESS);
}

#[test]
fn missing_required_parameter_is_a_usage_error() {
    let cli = RestCli::new(kvs_tree("http://127.0.0.1:9"));
    assert_ne!(cli.execute(["kvscli", "/{key}", "get"]), EXIT_SUCCESS);
    assert_ne!(cli.execute(["kvscli", "/search", "get"]), EXIT_SUCCESS);
}

#[test]
fn unknown_path_is_a_usage_error() {
    let cli = RestCli::new(kvs_tree("http://127.0.0.1:9"));
    assert_ne!(cli.execute(["kvscli", "/nope", "get"]), EXIT_SUCCESS);
}

#[test]
fn document_without_servers_fails_at_dispatch() {
    let document = parse_document(
        r#"
openapi: 3.0.0
info:
  title: Offline
  version: 1.0.0
paths:
  /ping:
    get: {}
"#,
    )
    .unwrap();
    let tree = build_commands(&CliConfig::new("offline"), &document).unwrap();

    let cli = RestCli::new(tree);
    assert_eq!(cli.execute(["offline", "--help"]), EXIT_SUCCESS);
    assert_eq!(cli.execute(["offline", "/ping", "get"]), EXIT_FAILURE);
}

#[test]
fn configured_base_url_overrides_document_server() {
    let mut server = Server::new();
    let mock = server.mock("GET", "/ping").with_status(200).create();
    let document = parse_document(
        r#"
openapi: 3.0.0
info:
  title: Offline
  version: 1.0.0
servers:
  - url: http://127.0.0.1:9
paths:
  /ping:
    get: {}
"#,
    )
    .unwrap();
    let config = CliConfig::new("offline").base_url(server.url());
    let tree = build_commands(&config, &document).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let code = RestCli::new(tree).execute(["offline", output_flag(&out).as_str(), "/ping", "get"]);
    assert_eq!(code, EXIT_SUCCESS);
    mock.assert();
}
