//! Server-Sent Events stream of wall events.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

use super::super::AppState;
use crate::telemetry;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /events - SSE stream of `photo_created` and `photo_deleted` events.
///
/// No replay: clients load `/api/photos` first, then apply events. The
/// stream ends when shutdown begins so the server can drain.
pub(crate) async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.wall.subscribe();
    let subscribers = state.wall.subscriber_count();
    telemetry::set_subscriber_count(subscribers);
    debug!(subscribers, "Event stream opened");

    let shutdown = state.shutdown.clone();
    let stream = BroadcastStream::new(rx)
        .filter_map(|result| async move {
            match result {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => Some(Ok(Event::default().event(event.name()).data(json))),
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize wall event");
                        None
                    },
                },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged, events dropped for this viewer");
                    None
                },
            }
        })
        .take_until(async move { shutdown.triggered().await });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
