//! Purpose: Hold top-level CLI command dispatch for `formnest`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Command output envelopes (`params`, `pairs`, `version`) stay stable.
//! Invariants: Decode failures surface as typed `Error`s so exit codes stay meaningful.

use std::net::SocketAddr;

use clap::CommandFactory;
use formnest::api::{Object, Pair, ParamSource, assemble, parse_form_string};
use url::Url;

use super::*;
use crate::render::pairs_node;

pub(super) fn dispatch_command(command: Command, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "formnest", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            let mut info = Object::new();
            info.insert("name".to_string(), Node::from("formnest"));
            info.insert("version".to_string(), Node::from(env!("CARGO_PKG_VERSION")));
            emit_bare(&Node::Object(info), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Decode {
            input,
            url,
            pairs_json,
        } => {
            let params = if let Some(url) = url {
                let url = Url::parse(&url).map_err(|err| {
                    Error::new(ErrorKind::Usage)
                        .with_message("invalid --url")
                        .with_hint("Provide an absolute URL such as http://localhost/v1/items?a[]=1.")
                        .with_source(err)
                })?;
                ParamSource::Query(url.query().unwrap_or_default()).decode()?
            } else if pairs_json {
                let pairs = parse_pairs_json(&read_input(input)?)?;
                assemble(&pairs)?
            } else {
                ParamSource::Query(&read_input(input)?).decode()?
            };
            emit_node("params", &Node::Object(params), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Pairs { input } => {
            let pairs = parse_form_string(&read_input(input)?)?;
            emit_node("pairs", &pairs_node(&pairs), color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let bind: SocketAddr = args.bind.parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid bind address")
                    .with_hint("Use a host:port value like 127.0.0.1:9780.")
            })?;
            let config = serve::ServeConfig {
                bind,
                allow_non_loopback: args.allow_non_loopback,
                max_body_bytes: args.max_body_bytes,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start async runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn parse_pairs_json(text: &str) -> Result<Vec<Pair>, Error> {
    let raw: Vec<(String, String)> = serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid pairs json")
            .with_hint(r#"Provide a JSON array of [key, value] string pairs, e.g. [["a[]","1"]]."#)
            .with_source(err)
    })?;
    Ok(raw.into_iter().map(Pair::from).collect())
}
