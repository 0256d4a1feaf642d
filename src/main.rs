//! http-transfer command line front end.
//!
//! ```text
//! http-transfer [OPTIONS] <URL>...
//!
//!   one URL    → blocking send
//!   many URLs  → submitted together as promises, then waited on
//!
//!   every response is replayed to stdout (status line, headers, body)
//!   logs and --stats output go to stderr
//! ```

use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use http::{Request, Version};

use http_transfer::config::{load_config, ClientConfig};
use http_transfer::engine::TransferInfo;
use http_transfer::error::ConfigurationError;
use http_transfer::observability::{init_logging, metrics};
use http_transfer::{Body, Client, Responder, Response, TransferOptions};

#[derive(Parser)]
#[command(name = "http-transfer")]
#[command(about = "Send HTTP requests and replay the responses to stdout", long_about = None)]
struct Cli {
    /// Request URLs (http:// only)
    #[arg(required = true)]
    urls: Vec<String>,

    /// Request method; defaults to GET, or POST when a body is given
    #[arg(short = 'X', long)]
    method: Option<String>,

    /// Extra request header, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long, conflicts_with = "data_file")]
    data: Option<String>,

    /// Read the request body from a file
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Protocol version
    #[arg(long, default_value = "1.1", value_parser = ["1.0", "1.1", "2.0"])]
    http_version: String,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Whole-transfer timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print transfer statistics as JSON to stderr
    #[arg(long)]
    stats: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: failed to load {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::default(),
    };

    init_logging(&config.observability);
    metrics::set_enabled(config.observability.metrics_enabled);
    tracing::debug!(urls = cli.urls.len(), "http-transfer v{} starting", env!("CARGO_PKG_VERSION"));

    match run(&cli, config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Returns false if any transfer failed.
fn run(cli: &Cli, config: ClientConfig) -> Result<bool, Box<dyn Error>> {
    let mut options = TransferOptions::default();
    if let Some(timeout_ms) = cli.timeout_ms {
        options = options.with_timeout_ms(timeout_ms);
    }

    let mut client = Client::new(config)?;
    let stdout = std::io::stdout();
    let mut responder = Responder::new(stdout.lock());

    if let [url] = cli.urls.as_slice() {
        let mut response = client.send_with(build_request(cli, url)?, &options)?;
        emit(&mut responder, &mut response, cli.stats)?;
        return Ok(true);
    }

    let mut promises = Vec::with_capacity(cli.urls.len());
    for url in &cli.urls {
        promises.push(client.send_async_with(build_request(cli, url)?, &options)?);
    }
    client.wait_all();

    let mut all_ok = true;
    for promise in promises {
        match promise.wait() {
            Ok(mut response) => emit(&mut responder, &mut response, cli.stats)?,
            Err(err) => {
                eprintln!("error: {err}");
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

fn build_request(cli: &Cli, url: &str) -> Result<Request<Body>, Box<dyn Error>> {
    let has_body = cli.data.is_some() || cli.data_file.is_some();
    let method = cli
        .method
        .as_deref()
        .unwrap_or(if has_body { "POST" } else { "GET" });
    let version = match cli.http_version.as_str() {
        "1.0" => Version::HTTP_10,
        "2.0" => Version::HTTP_2,
        _ => Version::HTTP_11,
    };

    let mut builder = Request::builder().method(method).uri(url).version(version);
    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| ConfigurationError::InvalidHeader(header.clone()))?;
        builder = builder.header(name.trim(), value.trim());
    }

    let body = match (&cli.data, &cli.data_file) {
        (Some(data), _) => Body::from(data.clone()),
        (None, Some(path)) => Body::from_file(File::open(path)?)?,
        (None, None) => Body::empty(),
    };
    Ok(builder.body(body)?)
}

fn emit<W: Write>(responder: &mut Responder<W>, response: &mut Response, stats: bool) -> Result<(), Box<dyn Error>> {
    if stats {
        if let Some(info) = response.extensions().get::<TransferInfo>() {
            eprintln!("{}", serde_json::to_string(info)?);
        }
    }
    responder.send(response)?;
    Ok(())
}
