//! tlsserve: serve the program's directory over HTTPS.
//!
//! This is the application entry point. It initializes tracing, resolves the
//! served root, installs the signal handler and runs the HTTPS server until
//! shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tlsserve::config::{DEFAULT_LOG_FILTER, DEFAULT_LOG_FORMAT, DEFAULT_PORT, LOG_FORMAT_ENV};
use tlsserve::http::setup_shutdown_handler;
use tlsserve::{start_server, OpensslIssuer, ServerConfig, ServerError, ShutdownHandle};

const ABOUT: &str = "HTTPS development server with a self-signed certificate.\n\n\
Serves the directory containing this executable and writes server.crt and \
server.key there. Copy the binary next to your site before running it \
(under `cargo run` the served directory is target/debug/).";

#[derive(Parser, Debug)]
#[command(name = "tlsserve", version, about = ABOUT)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn init_tracing() {
    // RUST_LOG takes priority over the built-in default
    let log_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let json = std::env::var(LOG_FORMAT_ENV)
        .unwrap_or_else(|_| DEFAULT_LOG_FORMAT.to_string())
        .eq_ignore_ascii_case("json");

    // stdout is reserved for the banner
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_filter))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn report(error: &ServerError) {
    tracing::error!(error = %error, "Server failed");
    eprintln!("Error: {}", error);
    if let ServerError::Provision(provision) = error {
        if let Some(hint) = provision.remediation() {
            eprintln!("{}", hint);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let config = match ServerConfig::from_executable(args.port) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Could not locate executable directory");
            eprintln!("Error: could not locate executable directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(root = %config.root.display(), port = config.port, "Loaded configuration");

    let issuer = Arc::new(OpensslIssuer::new(&config.openssl));
    let shutdown = ShutdownHandle::new();
    setup_shutdown_handler(shutdown.clone());

    match start_server(config, issuer, shutdown).await {
        Ok(()) => {
            println!("\n🛑 Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
