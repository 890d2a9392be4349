//! # Demo: sse_broker
//!
//! Serves a [`Broker`] over server-sent events and publishes a heartbeat.
//!
//! ## Run
//! ```bash
//! cargo run --example sse_broker
//! curl -N http://127.0.0.1:8080/events
//! ```
//!
//! Every client first receives a greeting carrying its own `consumer_id`,
//! then one `tick` broadcast per second.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use eventvisor::broker::sse;
use eventvisor::{Broker, Config, StreamEvent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("eventvisor=debug,info")),
        )
        .init();

    let cfg = Config::load(None).context("load config")?;
    let broker = Broker::from_config(&cfg);

    tokio::spawn({
        let broker = broker.clone();
        async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            loop {
                tick.tick().await;
                match StreamEvent::broadcast("tick", broker.ids()) {
                    Ok(ev) => {
                        broker.publish(ev).await;
                    }
                    Err(e) => tracing::warn!(error = e.as_label(), "id generation failed"),
                }
            }
        }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], 8080));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;
    tracing::info!(%addr, "sse broker listening");

    // Open streams end only when the broker closes, so close it before
    // axum waits for in-flight responses.
    axum::serve(listener, sse::router(broker.clone()))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            broker.close().await;
        })
        .await
        .context("server terminated with error")?;

    Ok(())
}
