mod config;
mod cors;
mod listing;
mod ports;
mod server;

use anyhow::Context as _;
use env_flags::env_flags;
use once_cell::sync::OnceCell;

use crate::config::ServeSettings;

fn init_tracing() {
    env_flags! {
        /// Tracing filter, e.g. "info", "debug", or targets format.
        RUST_LOG: &str = "info";
        /// Preferred filter env (alias). If set, overrides RUST_LOG.
        TRACING_FILTER: &str = "";
        /// JSON formatting for logs
        TRACING_JSON: bool = false;
        /// Pretty multi-line formatting for logs (ignored if TRACING_JSON=true)
        TRACING_PRETTY: bool = false;
        /// If true, also log to a daily-rolling file under LOG_DIR
        LOG_TO_FILE: bool = false;
        /// Log directory used when LOG_TO_FILE=true
        LOG_DIR: &str = ".localserve/logs";
    }

    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, prelude::*};

    let rust_log = if !(*TRACING_FILTER).is_empty() {
        (*TRACING_FILTER).to_string()
    } else {
        (*RUST_LOG).to_string()
    };
    let filter = EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

    // The banner owns stdout; diagnostics stay on stderr.
    let stderr_base = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
    let file_writer = if *LOG_TO_FILE {
        let dir = std::path::PathBuf::from((*LOG_DIR).to_string());
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "localserve.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);
                Some(writer)
            }
            Err(e) => {
                eprintln!("failed to create log dir {}: {}", dir.display(), e);
                None
            }
        }
    } else {
        None
    };
    fn file_base<S>(
        writer: tracing_appender::non_blocking::NonBlocking,
    ) -> tracing_subscriber::fmt::Layer<
        S,
        tracing_subscriber::fmt::format::DefaultFields,
        tracing_subscriber::fmt::format::Format,
        tracing_appender::non_blocking::NonBlocking,
    >
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
    }

    let reg = tracing_subscriber::registry().with(filter);
    let init_result = if *TRACING_JSON {
        reg.with(stderr_base.json())
            .with(file_writer.map(|w| file_base(w).json()))
            .try_init()
    } else if *TRACING_PRETTY {
        reg.with(stderr_base.pretty())
            .with(file_writer.map(|w| file_base(w).pretty()))
            .try_init()
    } else {
        reg.with(stderr_base.compact())
            .with(file_writer.map(|w| file_base(w).compact()))
            .try_init()
    };
    if let Err(e) = init_result {
        tracing::debug!("tracing already set: {:?}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    env_flags! {
        /// Bind address for the listener.
        HOST: &str = "0.0.0.0";
        /// Preferred port. The first free port in a small window starting
        /// here is used; 0 asks the OS for any free port.
        PORT: u16 = 8000;
        /// Directory to serve. If empty, defaults to the current execution directory.
        ROOT_DIR: &str = "";
        /// Serve generated HTML listings for directories without an index file.
        DIR_LISTINGS: bool = true;
        /// Open the default browser once the server is listening.
        OPEN_BROWSER: bool = true;
    }

    let root = ServeSettings::resolve_root(*ROOT_DIR)?;
    let settings = ServeSettings {
        host: (*HOST).to_string(),
        port: *PORT,
        root,
        dir_listings: *DIR_LISTINGS,
        open_browser: *OPEN_BROWSER,
    };
    tracing::info!(
        "starting localserve (root={}, preferred_port={})",
        settings.root.display(),
        settings.port
    );

    // Preferred port 0 bypasses the scan; the OS hands out a free port at
    // bind time, which has no probe/bind race.
    let port = if settings.port == 0 {
        0
    } else {
        ports::find_free_port(&settings.host, settings.port)?
    };

    // A failure here despite a successful probe is the accepted race
    // between probe and bind; it is fatal, not retried.
    let listener = tokio::net::TcpListener::bind((settings.host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{}", settings.host, port))?;
    let local = listener.local_addr().context("listener has no local address")?;

    let router = server::build_router(&settings);
    let url = settings.display_url(local.port());

    println!("serving {}", settings.root.display());
    println!("listening on {url}");
    println!("press Ctrl+C to stop");

    if settings.open_browser {
        if let Err(e) = open::that(&url) {
            tracing::warn!("failed to open browser: {} (open {} manually)", e, url);
        }
    }

    server::serve(listener, router).await?;

    println!("server stopped");
    Ok(())
}
