//! MatList — collaborative material-list session server.
//!
//! A single-process server where multiple clients view and update a shared
//! checklist of materials over WebSocket and see each other's edits live.
//! List files are uploaded, saved, and deleted through a small HTTP API on
//! the same port.
//!
//! Usage:
//!   matlist                              # Default port 5000
//!   matlist --port 8080                  # Custom port
//!   matlist --upload-dir /srv/lists      # Custom snapshot directory
//!   matlist --enable-cors                # Browsers served from other hosts

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use matlist_server::SessionCoordinator;
use matlist_services::{Catalog, routes};
use matlist_transport::{EventSink, GroupRegistry, TransportConfig, TransportServer};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "matlist", about = "MatList server — shared material-list sessions")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "5000")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "0.0.0.0")]
    hostname: String,

    /// Directory for uploaded and saved material-list files
    #[arg(long, default_value = "uploads")]
    upload_dir: PathBuf,

    /// Maximum concurrent connections
    #[arg(long, default_value = "64")]
    max_connections: usize,

    /// Allow cross-origin browser requests
    #[arg(long)]
    enable_cors: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ./matlist.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(ref log_file_arg) = cli.log_file {
        let log_path = if log_file_arg == "DEFAULT" {
            PathBuf::from("matlist.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .unwrap_or_else(|e| panic!("Failed to open log file {}: {e}", log_path.display()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // File catalog — the durable side of the system
    let catalog = Arc::new(Catalog::new(&cli.upload_dir));
    if let Err(e) = catalog.init().await {
        error!(
            "Failed to prepare upload directory {}: {e}",
            cli.upload_dir.display()
        );
        std::process::exit(1);
    }

    // Broadcast groups, then the coordinator that fans out through them
    let groups = Arc::new(GroupRegistry::new());
    let sink: Arc<dyn EventSink> = groups.clone();
    let coordinator = Arc::new(SessionCoordinator::new(sink));

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        enable_cors: cli.enable_cors,
        max_connections: Some(cli.max_connections),
        verbose_logging: cli.verbose,
    };

    let mut transport = match TransportServer::start(
        transport_config,
        coordinator,
        groups,
        routes::router(catalog),
    )
    .await
    {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to start transport: {e}");
            std::process::exit(1);
        }
    };

    let actual_port = transport.port();
    println!();
    println!("  MatList server running");
    println!();
    println!(
        "  WebSocket endpoint:   ws://{}:{}/ws",
        cli.hostname, actual_port
    );
    println!(
        "  File API:             http://{}:{}/files",
        cli.hostname, actual_port
    );
    println!("  Upload directory:     {}", cli.upload_dir.display());
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    let _ = tokio::signal::ctrl_c().await;

    println!();
    println!("  Shutting down...");
    transport.stop().await;
    println!("  Server stopped.");
}
