use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use storj_exporter::collector::Collector;
use storj_exporter::config::Config;
use storj_exporter::http;
use tokio::net::TcpListener;

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,storj_exporter=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "failed to bind storj-exporter on {addr}: port already in use; set STORJ_EXPORTER_PORT to choose another port"
            );
        }
        Err(err) => Err(err).with_context(|| format!("failed to bind storj-exporter on {addr}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing()?;

    let collector = Collector::new(&config)?;
    tracing::info!(upstream=%collector.upstream().base_url(), "storage node API");

    let app = http::router(http::HttpState {
        collector: Arc::new(collector),
    });
    let addr = config.listen_addr();
    let listener = bind_listener(addr).await?;
    tracing::info!(bind=%addr, "storj-exporter HTTP listening");

    tokio::select! {
        res = axum::serve(listener, app).into_future() => {
            res.context("HTTP server exited")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
