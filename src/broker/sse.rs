//! # Server-sent events endpoint for a [`Broker`].
//!
//! Every request subscribes one client. The first frame is the greeting
//! carrying the client's id; later frames are the events routed to it. The
//! registration is removed when axum drops the response stream, i.e. when
//! the client disconnects.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Router,
};

use super::broker::{Broker, Subscriber};
use super::event::StreamEvent;

/// Router exposing the broker at `GET /events`.
pub fn router(broker: Broker) -> Router {
    Router::new()
        .route("/events", get(stream_events))
        .with_state(broker)
}

/// `GET` handler streaming broker events to one client.
pub async fn stream_events(State(broker): State<Broker>) -> Result<Response, (StatusCode, String)> {
    let sub = broker.subscribe().await.map_err(internal)?;
    let id = sub.id();
    let mut guard = StreamGuard {
        broker: broker.clone(),
        sub: Some(sub),
    };
    broker.greet(id).map_err(internal)?;

    let events = stream! {
        while let Some(ev) = guard.recv().await {
            yield Ok::<_, Infallible>(SseEvent::default().data(frame_data(&ev)));
        }
    };

    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    ];
    let sse = Sse::new(events);
    // Keep-alive wraps the stream in a different type; erase both into a Response.
    Ok(match broker.keepalive() {
        Some(interval) => (headers, sse.keep_alive(KeepAlive::new().interval(interval))).into_response(),
        None => (headers, sse).into_response(),
    })
}

/// JSON frame body; falls back to the display form if encoding fails.
fn frame_data(ev: &StreamEvent) -> String {
    serde_json::to_string(&ev.to_wire()).unwrap_or_else(|_| ev.to_string())
}

fn internal(err: crate::error::BrokerError) -> (StatusCode, String) {
    tracing::warn!(target: "eventvisor::broker", error = err.as_label(), "stream subscribe failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// Owns a registration for the lifetime of one response stream.
struct StreamGuard {
    broker: Broker,
    sub: Option<Subscriber>,
}

impl StreamGuard {
    async fn recv(&mut self) -> Option<StreamEvent> {
        match self.sub.as_mut() {
            Some(sub) => sub.recv().await,
            None => None,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let Some(sub) = self.sub.take() else { return };
        let id = sub.id();
        drop(sub);
        let broker = self.broker.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                broker.unsubscribe(id).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::WireEvent;
    use crate::ids::CounterIds;
    use axum::body::Body;
    use axum::http::Request;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn streams_greeting_with_headers_and_unsubscribes_on_drop() {
        let broker = Broker::new(Arc::new(CounterIds::new(10, 10)));
        let app = router(broker.clone());

        let res = app
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(broker.len().await, 1);

        let mut body = res.into_body().into_data_stream();
        let chunk = body.next().await.unwrap().unwrap();
        let text = std::str::from_utf8(&chunk).unwrap();
        let json = text.trim().strip_prefix("data: ").unwrap();
        let greeting: WireEvent = serde_json::from_str(json).unwrap();
        assert_eq!(greeting.consumer_id, 10);
        assert_eq!(greeting.message, "");

        drop(body);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(broker.is_empty().await);
    }

    #[tokio::test]
    async fn keepalive_streams_still_greet_first() {
        let broker = Broker::with_keepalive(
            Arc::new(CounterIds::new(7, 1)),
            Some(Duration::from_secs(30)),
        );
        let app = router(broker.clone());

        let res = app
            .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CACHE_CONTROL], "no-cache");

        let mut body = res.into_body().into_data_stream();
        let chunk = body.next().await.unwrap().unwrap();
        let text = std::str::from_utf8(&chunk).unwrap();
        let greeting: WireEvent =
            serde_json::from_str(text.trim().strip_prefix("data: ").unwrap()).unwrap();
        assert_eq!(greeting.consumer_id, 7);
    }
}
