//! # Demo: consumer_server
//!
//! Runs two consumers fed by in-process channels until Ctrl-C.
//!
//! Shows how to:
//! - Load [`Config`] (defaults, optional `eventvisor.toml`, `EVENTVISOR_*` env).
//! - Bind a [`ChannelSubscription`] and a [`HandlerFn`] into a [`Consumer`].
//! - Ship [`EventContext`] bodies and read them back with `Request::context`.
//! - Run the [`Server`] until an OS signal and drain in-flight handlers.
//!
//! ## Run
//! ```bash
//! RUST_LOG=eventvisor=debug cargo run --example consumer_server
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use eventvisor::consumer::{ChannelSubscription, HandlerFn, Message, Request};
use eventvisor::record::{EventContext, EventType, Priority};
use eventvisor::{Config, Consumer, HandlerError, Server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eventvisor=info")),
        )
        .init();

    let cfg = Config::load(Some(Path::new("eventvisor.toml"))).context("load config")?;
    let server = Server::new(cfg.clone());

    let (orders_tx, orders) = ChannelSubscription::new(32);
    let orders_handler = HandlerFn::arc(|req: Request| async move {
        let ctx = req.context()?;
        tokio::select! {
            _ = req.token.cancelled() => {
                req.message.nack();
                return Err(HandlerError::Canceled);
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
        tracing::info!(
            event = ctx.event.id(),
            priority = ctx.event.priority().as_str(),
            "order processed"
        );
        req.message.ack();
        Ok(())
    });
    server.add_consumer(Consumer::with_defaults(
        "orders",
        Arc::new(orders),
        orders_handler,
        &cfg,
    ))?;

    let (audit_tx, audit) = ChannelSubscription::new(32);
    let audit_handler = HandlerFn::arc(|req: Request| async move {
        tracing::info!(bytes = req.message.body().len(), "audit entry");
        req.message.ack();
        Ok(())
    });
    server.add_consumer(Consumer::new("audit", Arc::new(audit), audit_handler, 1))?;

    tokio::spawn(async move {
        for n in 0u64.. {
            let record = cfg
                .record(format!(r#"{{"order":{n}}}"#).into_bytes())
                .event_type(EventType::Domain)
                .priority(if n % 5 == 0 { Priority::High } else { Priority::Mid })
                .build();
            let audit = Message::new(record.id(), record.content().to_vec());
            let Ok(order) = Message::from_context(&EventContext::new(record)) else { break };
            if orders_tx.send(order).await.is_err() || audit_tx.send(audit).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    server.serve_until_signal().await?;
    Ok(())
}
