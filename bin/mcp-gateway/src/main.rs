use anyhow::{Context, Result};
use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::tokio::TokioIo;
use mcp_core::{ProxyConfig, ServerRegistry};
use mcp_proxy::{LoggingMiddleware, McpProxy, MetricsCollector, MetricsMiddleware, MiddlewareChain};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod gateway;

use gateway::Gateway;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting mcp-gateway...");

    let config = ProxyConfig::from_env().context("Failed to read proxy configuration")?;

    let registry = ServerRegistry::load(config.servers_json.as_deref())
        .context("Failed to load MCP_SERVERS")?;
    if registry.is_empty() {
        warn!("No MCP servers configured; every proxied request will fail with 500");
    }
    for server in registry.servers() {
        info!(
            "  - {} ({}) -> {} [auth: {}]",
            server.name,
            server.id,
            server.url,
            server.auth_required()
        );
    }

    let listen_addr = config.listen_addr;
    let proxy = McpProxy::from_config(config, registry)?;

    let metrics_collector = MetricsCollector::new().context("Failed to create metrics collector")?;
    info!("Metrics collector initialized");

    let middleware = MiddlewareChain::new()
        .add(LoggingMiddleware)
        .add(MetricsMiddleware::new(metrics_collector.clone()));
    info!("Middleware chain initialized with logging and metrics");

    let gateway = Gateway::new(proxy, middleware, metrics_collector);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("HTTP server listening on {}", listen_addr);

    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping listener");
                break;
            }
        };
        let io = TokioIo::new(stream);
        let gateway = gateway.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let gateway = gateway.clone();
                async move { gateway.handle(req).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving HTTP connection from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// `RUST_LOG` filter (default `info`); JSON lines when `LOG_FORMAT=json`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
