//! selectkv - A Single-Threaded In-Memory Key-Value Server
//!
//! This is the main entry point for the selectkv server.
//! It reads the configuration, sets up logging, binds the listener and
//! runs the event loop on a current-thread runtime.

use selectkv::config::{Config, Invocation};
use selectkv::server::EventLoop;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
selectkv - A Single-Threaded In-Memory Key-Value Server

USAGE:
    selectkv [PORT] [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: {host})
    -p, --port <PORT>    Port to listen on (default: {port})
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    selectkv                       # Start on {host}:{port}
    selectkv 7878                  # Start on port 7878
    selectkv --host 0.0.0.0        # Listen on all interfaces

CONNECTING:
    $ nc localhost {port}
    SET name Ariz
    OK
    GET name
    Ariz
"#,
        host = selectkv::DEFAULT_HOST,
        port = selectkv::DEFAULT_PORT,
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(Invocation::Serve(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("selectkv version {}", selectkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Bind the TCP listener; failing here is fatal
    let server = EventLoop::bind(&config.bind_address()).await?;
    info!("Listening on {}", server.local_addr()?);

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = server.run() => {}
        _ = shutdown => {}
    }

    info!("Server stopped");
    Ok(())
}
