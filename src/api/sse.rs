//! Server-sent event stream of pipeline notifications

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::Serialize;

use super::state::AppState;
use crate::notify::{Notification, RecvError};

/// Payloads sent over the stream, tagged by `type`
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseEvent {
    /// First event on every connection
    Connected { sequence_id: u64, version: String },
    Notification(Notification),
    Error { code: String, message: String },
}

impl SseEvent {
    fn name(&self) -> &'static str {
        match self {
            SseEvent::Connected { .. } => "connected",
            SseEvent::Notification(_) => "notification",
            SseEvent::Error { .. } => "error",
        }
    }

    fn into_event(self) -> Event {
        Event::default()
            .event(self.name())
            .data(serde_json::to_string(&self).unwrap_or_default())
    }
}

/// GET /api/events - Stream every hub notification
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.pipeline.hub().subscribe_all();
    let sequence_id = state.current_sequence_id();

    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(SseEvent::Connected {
            sequence_id,
            version: crate::VERSION.to_string(),
        }.into_event());

        loop {
            match subscription.recv().await {
                Ok(notification) => {
                    yield Ok(SseEvent::Notification(notification).into_event());
                }
                Err(RecvError::Lagged(n)) => {
                    // Client is too slow
                    yield Ok(SseEvent::Error {
                        code: "lagged".to_string(),
                        message: format!("Missed {} notifications, please refetch", n),
                    }.into_event());
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default().interval(Duration::from_secs(30)))
}
