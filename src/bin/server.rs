//! CineVault Server Binary
//!
//! Sets up the store, installs the termination handler, and serves until a
//! signal arrives.

use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use cinevault::config::{DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY};
use cinevault::{db, Config, Server};

/// CineVault server
#[derive(Parser, Debug)]
#[command(name = "cinevault-server")]
#[command(about = "Concurrent movie-record server speaking YAML over TCP")]
#[command(version)]
struct Args {
    /// Path of the store file
    #[arg(short, long, default_value = "movies.db")]
    database: String,

    /// Listener TCP port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Number of worker threads (default: host CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Work queue capacity; must be a power of two
    #[arg(short = 'q', long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Receive/send timeout for client sockets, in seconds
    #[arg(short = 't', long, default_value_t = 60)]
    client_timeout: u64,

    /// Admission retries before a connection is rejected on a full queue
    #[arg(short = 'r', long, default_value_t = 100)]
    max_enqueue_retries: u32,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cinevault=debug"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let mut builder = Config::builder()
        .database_path(&args.database)
        .port(args.port)
        .queue_capacity(args.queue_capacity)
        .client_timeout(Duration::from_secs(args.client_timeout))
        .max_enqueue_retries(args.max_enqueue_retries);
    if let Some(workers) = args.workers {
        builder = builder.worker_count(workers);
    }
    let config = builder.build();

    tracing::info!("CineVault Server v{}", cinevault::VERSION);
    tracing::info!(database = %args.database, port = args.port, "starting up");

    if let Err(err) = db::setup(&config.database_path) {
        tracing::error!(error = %err, "store setup failed");
        std::process::exit(1);
    }

    let mut server = match Server::bind(config) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "initialization failed");
            std::process::exit(1);
        }
    };

    // SIGINT/SIGTERM raise the flag; the accept loop notices and drains.
    let shutdown = server.shutdown_flag();
    if let Err(err) = ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    }) {
        tracing::error!(error = %err, "failed to install signal handler");
        std::process::exit(1);
    }

    if let Err(err) = server.run() {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }
}
