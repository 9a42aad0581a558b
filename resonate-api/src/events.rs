use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events", get(stream_events))
}

/// GET /v1/events
/// Server-sent marketplace events (order created/submitted/delivered)
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| async move {
        // Lagged receivers just skip ahead
        let event = msg.ok()?;
        Event::default().json_data(&event).ok().map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
