//! Serverless dispatch runner.
//!
//! Serves a small demo application over standard input/output, or over a
//! socket inherited as file descriptor 0, one exchange at a time until the
//! input closes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use http::StatusCode;
use serde_json::json;

use serverless_dispatch::config::{load_config, EngineConfig};
use serverless_dispatch::dispatch::DispatchEngine;
use serverless_dispatch::framing::ServerlessApplication;
use serverless_dispatch::lifecycle::{spawn_signal_listener, Shutdown};
use serverless_dispatch::observability::logging::init_logging;
use serverless_dispatch::routing::{Param, Route, RouteTable, RoutingError};
use serverless_dispatch::Outcome;

#[derive(Debug, Parser)]
#[command(name = "serverless-dispatch", version, about)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Always use stdin/stdout, even when fd 0 is a socket.
    #[arg(long)]
    stdio: bool,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

fn demo_routes() -> Result<RouteTable, RoutingError> {
    let mut routes = RouteTable::new();
    routes
        .add(Route::get("/", |_| async {
            Ok("Hello from the serverless dispatcher".into())
        }))?
        .add(
            Route::post("/{name}", |inv| async move {
                let name: String = inv.args().get("name")?;
                Ok(Outcome::text(format!("Created {name}")))
            })
            .param(Param::path("name"))
            .status(StatusCode::CREATED),
        )?
        .add(
            Route::put("/{name}", |inv| async move {
                let name: String = inv.args().get("name")?;
                Ok(Outcome::text(format!("Updated {name}")))
            })
            .param(Param::path("name")),
        )?
        .add(Route::get("/cactus", |_| async {
            Ok(json!({"name": "cactus", "thorny": true}).into())
        }))?
        .add(Route::delete("/", |_| async { Ok(Outcome::Empty) }))?;
    Ok(routes)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if cli.stdio {
        config.framing.use_inherited_channel = false;
    }

    // Logs go to stderr; stdout may be the response channel.
    init_logging(&config.observability, cli.log_level.as_deref())?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        input_buffer_size = config.framing.input_buffer_size,
        output_buffer_size = config.framing.output_buffer_size,
        "serverless-dispatch starting"
    );

    let routes = demo_routes()?;
    tracing::info!(routes = routes.len(), "routes registered");
    let engine = DispatchEngine::builder(routes)
        .config(config.dispatch.clone())
        .build();
    let app = ServerlessApplication::new(Arc::new(engine), config.framing.clone());

    let shutdown = Arc::new(Shutdown::new());
    let signals = spawn_signal_listener(Arc::clone(&shutdown));
    let summary = app.run_stdio(shutdown.subscribe()).await?;
    signals.abort();

    tracing::info!(
        exchanges = summary.exchanges,
        protocol_errors = summary.protocol_errors,
        "Shutdown complete"
    );
    Ok(())
}
