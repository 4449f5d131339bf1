//! Courier CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load the client config from `--config` and
//!    apply `--base-url` on top.
//! 2. **Wire observability**: see [`telemetry`].
//! 3. **Declare one method** from the command line (verb, path template and
//!    `--path`/`--query`/`--header`/`--body` bindings), awaiting
//!    `Response<Json>` (or `Response<()>` for HEAD).
//! 4. **Invoke it** through a [`client::Client`] and print the status to
//!    stderr and the body to stdout. Non-2xx responses exit with status 1.

mod telemetry;

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use adapters::{JsonConverterFactory, ScalarConverterFactory};
use anyhow::{bail, Context};
use clap::Parser;
use client::{Client, ClientConfig};
use dispatch::{
    AnyValue, Arguments, DeclaredReturn, MethodDescriptor, MethodId, ParameterBinding, Response,
    TypeRef,
};
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::telemetry::LogFormat;

const METHOD_ID: &str = "cli.request";

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Issue one declared HTTP call")]
struct Args {
    /// Client config file (TOML).
    #[arg(long, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `base_url` from the config file.
    #[arg(long, env = "COURIER_BASE_URL")]
    base_url: Option<Url>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Path placeholder value, `name=value`. Repeatable.
    #[arg(long = "path", value_parser = parse_key_value)]
    path_params: Vec<(String, String)>,

    /// Query parameter, `name=value`. Repeatable.
    #[arg(long = "query", value_parser = parse_key_value)]
    query: Vec<(String, String)>,

    /// Request header, `name=value`. Repeatable.
    #[arg(long = "header", value_parser = parse_key_value)]
    headers: Vec<(String, String)>,

    /// JSON request body.
    #[arg(long)]
    body: Option<String>,

    /// HTTP verb.
    verb: http::Method,

    /// Path template relative to the base URL, e.g. `repos/{owner}/{repo}`.
    path: String,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty name in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

/// Turns the command line into one declared method and its argument list.
fn declare(args: &Args) -> anyhow::Result<(MethodDescriptor, Arguments)> {
    let awaited = if args.verb == http::Method::HEAD {
        TypeRef::response(TypeRef::unit())
    } else {
        TypeRef::response(TypeRef::named(adapters::JSON_VALUE))
    };
    let id = MethodId::new(METHOD_ID).context("method id must not be empty")?;
    let mut descriptor = MethodDescriptor::new(
        id,
        args.verb.clone(),
        args.path.clone(),
        DeclaredReturn::Suspending(awaited),
    );
    let mut values = Vec::new();

    let mut seen = HashSet::new();
    for (name, _) in &args.path_params {
        if !seen.insert(name.as_str()) {
            bail!("--path {name} given more than once");
        }
    }

    let bindings = [
        (ParameterBinding::Path, &args.path_params),
        (ParameterBinding::Query, &args.query),
        (ParameterBinding::Header, &args.headers),
    ];
    for (binding, pairs) in bindings {
        for (name, value) in pairs {
            descriptor = descriptor.with_parameter(name.clone(), binding);
            values.push(Value::String(value.clone()));
        }
    }

    if let Some(body) = &args.body {
        let body: Value = serde_json::from_str(body).context("--body is not valid JSON")?;
        descriptor = descriptor.with_parameter("body", ParameterBinding::Body);
        values.push(body);
    }

    Ok((descriptor, Arguments::new(values)))
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let config = match (&args.config, &args.base_url) {
        (Some(path), base_url) => {
            let config = ClientConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            match base_url {
                Some(url) => config.with_base_url(url.clone())?,
                None => config,
            }
        }
        (None, Some(url)) => ClientConfig::new(url.clone())?,
        (None, None) => bail!("either --config or --base-url is required"),
    };
    Ok(config)
}

fn print_response(response: Response<AnyValue>) -> anyhow::Result<ExitCode> {
    eprintln!("{}", response.status());
    if !response.is_successful() {
        if let Some(body) = response.error_body() {
            println!("{}", String::from_utf8_lossy(body));
        }
        return Ok(ExitCode::FAILURE);
    }

    if let Some(body) = response.into_body() {
        if let Ok(json) = body.downcast::<Value>() {
            println!("{}", serde_json::to_string_pretty(&*json)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let telemetry = telemetry::init(args.log_format)?;

    let result = run(&args).await;
    telemetry.shutdown();
    result
}

async fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let (descriptor, arguments) = declare(args)?;
    let id = descriptor.id.clone();
    info!(method = %args.verb, path = %args.path, base_url = %config.base_url, "issuing request");

    let client = Client::builder(config)
        .add_converter_factory(Arc::new(JsonConverterFactory::new()))
        .add_converter_factory(Arc::new(ScalarConverterFactory))
        .declare(descriptor)
        .build()?;

    let response: Response<AnyValue> = client.invoke(&id, arguments)?.resolve_as().await?;
    print_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("courier").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn key_value_requires_separator() {
        assert_eq!(
            parse_key_value("owner=rust-lang").unwrap(),
            ("owner".to_owned(), "rust-lang".to_owned())
        );
        assert!(parse_key_value("owner").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn bindings_follow_flag_groups() {
        let args = args(&[
            "--base-url",
            "https://api.example.com/",
            "--query",
            "page=2",
            "--path",
            "owner=rust-lang",
            "--header",
            "x-trace=abc",
            "--body",
            r#"{"title":"hi"}"#,
            "POST",
            "repos/{owner}/issues",
        ]);
        let (descriptor, arguments) = declare(&args).unwrap();

        let bindings: Vec<_> = descriptor
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.binding))
            .collect();
        assert_eq!(
            bindings,
            vec![
                ("owner", ParameterBinding::Path),
                ("page", ParameterBinding::Query),
                ("x-trace", ParameterBinding::Header),
                ("body", ParameterBinding::Body),
            ]
        );
        assert_eq!(arguments.len(), 4);
        assert_eq!(arguments.get(3), Some(&serde_json::json!({"title": "hi"})));
        assert_eq!(
            descriptor.returns,
            DeclaredReturn::Suspending("Response<Json>".parse().unwrap())
        );
    }

    #[test]
    fn repeated_path_name_is_rejected() {
        let args = args(&[
            "--base-url",
            "https://api.example.com/",
            "--path",
            "owner=a",
            "--path",
            "owner=b",
            "GET",
            "repos/{owner}",
        ]);
        let err = declare(&args).unwrap_err();
        assert!(err.to_string().contains("--path owner"));
    }

    #[test]
    fn repeated_query_name_is_kept() {
        let args = args(&[
            "--base-url",
            "https://api.example.com/",
            "--query",
            "label=bug",
            "--query",
            "label=help",
            "GET",
            "issues",
        ]);
        let (descriptor, arguments) = declare(&args).unwrap();
        assert_eq!(descriptor.parameters.len(), 2);
        assert_eq!(arguments.len(), 2);
    }

    #[test]
    fn head_awaits_unit_response() {
        let args = args(&["--base-url", "https://api.example.com/", "HEAD", "ping"]);
        let (descriptor, _) = declare(&args).unwrap();
        assert_eq!(
            descriptor.returns,
            DeclaredReturn::Suspending("Response<()>".parse().unwrap())
        );
    }

    #[test]
    fn config_or_base_url_is_required() {
        let args = args(&["GET", "ping"]);
        assert!(load_config(&args).is_err());
    }
}
