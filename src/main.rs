//! Purpose: `formnest` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (pretty on a TTY, compact otherwise).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read};

use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;

mod command_dispatch;
mod render;
mod serve;

use formnest::api::{Error, ErrorKind, Node, to_exit_code};
use render::{Layout, render_envelope, render_node};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint("Try `formnest --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, color_mode).map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "formnest",
    version,
    about = "Decode bracket-path form parameters into nested JSON",
    long_about = None,
    before_help = r#"Keys carry structure: `a[b]=1` sets a field, `a[]=1` appends to a list,
and `a[][x]=1&a[][y]=2` fills one list object until a field repeats."#,
    after_help = r#"EXAMPLES
  $ formnest decode 'card[number]=4242&expand[]=customer&expand[]=invoice'
  $ formnest decode --url 'http://localhost/v1/charges?amount=100&metadata[order]=7'
  $ printf 'a[]=1&a[]=2' | formnest decode
  $ formnest pairs 'full+name=Ada%20Lovelace'
  $ formnest serve --bind 127.0.0.1:9780"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        help = "Colorize JSON output (auto|always|never)"
    )]
    color: ColorMode,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Decode form-encoded params into a nested JSON tree")]
    Decode {
        #[arg(help = "Form-encoded text; reads stdin when omitted or `-`")]
        input: Option<String>,
        #[arg(
            long,
            conflicts_with_all = ["input", "pairs_json"],
            help = "Decode the query string of this URL"
        )]
        url: Option<String>,
        #[arg(
            long,
            help = "Treat the input as a JSON array of [key, value] pairs (skips percent-decoding)"
        )]
        pairs_json: bool,
    },
    #[command(about = "Split and percent-decode form text into ordered pairs")]
    Pairs {
        #[arg(help = "Form-encoded text; reads stdin when omitted or `-`")]
        input: Option<String>,
    },
    #[command(about = "Serve /v0/decode over HTTP")]
    Serve(ServeArgs),
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info as JSON")]
    Version,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:9780", help = "Bind address (host:port)")]
    bind: String,
    #[arg(
        long,
        default_value_t = formnest::api::DEFAULT_MAX_BODY_BYTES as u64,
        help = "Maximum request body size in bytes"
    )]
    max_body_bytes: u64,
    #[arg(long, help = "Allow binding to a non-loopback address")]
    allow_non_loopback: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn stdout_layout(color_mode: ColorMode) -> Layout {
    let is_tty = io::stdout().is_terminal();
    let color = color_mode.use_color(is_tty);
    if is_tty || color {
        Layout::Pretty { color }
    } else {
        Layout::Compact
    }
}

fn emit_node(label: &str, node: &Node, color_mode: ColorMode) {
    println!("{}", render_envelope(label, node, stdout_layout(color_mode)));
}

fn emit_bare(node: &Node, color_mode: ColorMode) {
    println!("{}", render_node(node, stdout_layout(color_mode)));
}

/// Read the positional input, falling back to stdin for `None` or `-`.
fn read_input(input: Option<String>) -> Result<String, Error> {
    match input {
        Some(text) if text != "-" => Ok(text),
        _ => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            stdin_text(buf)
        }
    }
}

/// Stdin bytes are caller data: non-UTF-8 input is an encoding error, not an I/O fault.
fn stdin_text(mut buf: Vec<u8>) -> Result<String, Error> {
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|err| {
        Error::new(ErrorKind::MalformedEncoding)
            .with_message("stdin input is not valid UTF-8")
            .with_source(err)
    })
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::MalformedEncoding => "malformed percent-encoding".to_string(),
        ErrorKind::MalformedKey => "malformed parameter key".to_string(),
        ErrorKind::Conflict => "conflicting parameter shapes".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, "31"),
        error_message(err)
    )];
    if let Some(key) = err.key() {
        lines.push(format!("{} {key}", colorize_label("key:", use_color, "33")));
    }
    if let Some(hint) = err.hint() {
        lines.push(format!("{} {hint}", colorize_label("hint:", use_color, "33")));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, "33")
        ));
    }
    lines.join("\n")
}

fn colorize_label(label: &str, enabled: bool, code: &str) -> String {
    if !enabled {
        return label.to_string();
    }
    format!("\u{1b}[1;{code}m{label}\u{1b}[0m")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
