use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;

// Error tracing
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use server::handlers::http::routes::build_router;
use server::security::{TokenCodec, TokenKeys};
use server::tower_middle::{HyperToTowerAdapter, IdentityLayer};
use server::{AppState, dispatch};
use shared::config::load_config;

#[derive(Parser, Debug)]
#[command(name = "server", about = "Identity and secure-link service")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let keys = TokenKeys::load(&config.auth).context("Failed to load token keys")?;
    let tokens = TokenCodec::from_config(keys, &config.auth);

    let addr: SocketAddr = config
        .server
        .addr()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.addr()))?;
    let public_paths = config.auth.public_paths.clone();
    let router = Arc::new(build_router(&config.links));
    let state = AppState::new(config, tokens);
    let identity = IdentityLayer::new(state.resolver.clone(), public_paths);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };
        let io = TokioIo::new(stream);

        let router = router.clone();
        let state = state.clone();
        let handler = service_fn(move |req: Request<Incoming>| {
            dispatch(router.clone(), state.clone(), req)
        });
        let svc = ServiceBuilder::new()
            .layer(identity.clone())
            .service(HyperToTowerAdapter::new(handler));

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, TowerToHyperService::new(svc))
                .await
            {
                error!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}
