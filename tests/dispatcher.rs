use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eventvisor::consumer::{ChannelSubscription, HandlerFn, Message, Request};
use eventvisor::record::{EventContext, EventType, Priority, Transaction};
use eventvisor::{Config, Consumer, ErrorKind, HandlerError, Server, ServerState};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn two_slots_hold_back_the_third_message() {
    let (tx, sub) = ChannelSubscription::new(8);
    let started = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let handler = {
        let (started, gate) = (started.clone(), gate.clone());
        HandlerFn::arc(move |req: Request| {
            let (started, gate) = (started.clone(), gate.clone());
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                if let Ok(p) = gate.acquire().await {
                    p.forget();
                }
                req.message.ack();
                Ok(())
            }
        })
    };

    let consumer = Consumer::new("pair", Arc::new(sub), handler, 2);
    let token = CancellationToken::new();
    let serving = tokio::spawn({
        let token = token.clone();
        async move { consumer.serve(token).await }
    });

    for i in 0..3 {
        tx.send(Message::new(i.to_string(), Vec::new())).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(started.load(Ordering::SeqCst), 2);

    gate.add_permits(1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(started.load(Ordering::SeqCst), 3);

    gate.add_permits(2);
    token.cancel();
    serving.await.unwrap();
}

#[tokio::test]
async fn server_close_drains_every_consumer() {
    let cfg = Config {
        max_handlers: 4,
        ..Config::default()
    };
    let server = Arc::new(Server::new(cfg.clone()));
    let finished = Arc::new(AtomicUsize::new(0));
    let mut senders = Vec::new();

    for name in ["orders", "payments"] {
        let (tx, sub) = ChannelSubscription::new(8);
        let handler = {
            let finished = finished.clone();
            HandlerFn::arc(move |_req: Request| {
                let finished = finished.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        server
            .add_consumer(Consumer::with_defaults(name, Arc::new(sub), handler, &cfg))
            .unwrap();
        senders.push(tx);
    }

    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve().await }
    });
    for tx in &senders {
        for i in 0..3 {
            tx.send(Message::new(i.to_string(), Vec::new())).await.unwrap();
        }
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(server.state(), ServerState::Serving);

    server.close();
    serving.await.unwrap().unwrap();
    assert_eq!(finished.load(Ordering::SeqCst), 6);
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn handler_token_is_cancelled_on_shutdown() {
    let token = CancellationToken::new();
    let server = Arc::new(Server::with_token(Config::default(), token.clone()));
    let saw_cancel = Arc::new(AtomicBool::new(false));

    let (tx, sub) = ChannelSubscription::new(1);
    let handler = {
        let saw_cancel = saw_cancel.clone();
        HandlerFn::arc(move |req: Request| {
            let saw_cancel = saw_cancel.clone();
            async move {
                req.token.cancelled().await;
                saw_cancel.store(true, Ordering::SeqCst);
                req.message.nack();
                Ok(())
            }
        })
    };
    server
        .add_consumer(Consumer::new("watcher", Arc::new(sub), handler, 1))
        .unwrap();

    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve().await }
    });
    tx.send(Message::new("1", Vec::new())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    token.cancel();
    serving.await.unwrap().unwrap();
    assert!(saw_cancel.load(Ordering::SeqCst));
}

#[tokio::test]
async fn handlers_read_the_event_and_its_transaction() {
    let cfg = Config {
        service_name: "authors".into(),
        ..Config::default()
    };
    let record = cfg
        .record(br#"{"name":"Ursula"}"#.to_vec())
        .event_type(EventType::Integration)
        .priority(Priority::High)
        .transaction_id(42)
        .build();
    let ctx = EventContext::new(record.clone())
        .with_transaction(Transaction::new("tx-42", "author-7", "CREATE"));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = {
        let seen = seen.clone();
        HandlerFn::arc(move |req: Request| {
            let seen = seen.clone();
            async move {
                let ctx = req.context()?;
                let op = ctx.transaction.map(|tx| tx.operation);
                seen.lock().unwrap().push((ctx.event, op));
                req.message.ack();
                Ok(())
            }
        })
    };
    let failures = Arc::new(AtomicUsize::new(0));
    let rejecting = {
        let failures = failures.clone();
        HandlerFn::arc(move |req: Request| {
            let failures = failures.clone();
            async move {
                match req.context() {
                    Err(HandlerError::Failed { kind: ErrorKind::InvalidField, .. }) => {
                        failures.fetch_add(1, Ordering::SeqCst);
                        req.message.nack();
                        Ok(())
                    }
                    other => other.map(|_| ()),
                }
            }
        })
    };

    let (tx, sub) = ChannelSubscription::new(4);
    tx.send(Message::from_context(&ctx).unwrap()).await.unwrap();
    drop(tx);
    Consumer::new("authors", Arc::new(sub), handler, 2)
        .serve(CancellationToken::new())
        .await;

    let (raw_tx, raw_sub) = ChannelSubscription::new(4);
    raw_tx.send(Message::new("raw", b"plain bytes".to_vec())).await.unwrap();
    drop(raw_tx);
    Consumer::new("raw", Arc::new(raw_sub), rejecting, 1)
        .serve(CancellationToken::new())
        .await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let (event, op) = &seen[0];
    assert_eq!(event, &record);
    assert_eq!(event.service_name(), "AUTHORS");
    assert_eq!(event.transaction_id(), Some(42));
    assert_eq!(op.as_deref(), Some("CREATE"));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}
