//! SSE subscriber handler

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};

use crate::api::state::AppState;
use crate::broadcast::{Broadcaster, SubscriberId, WelcomeMessage};

/// Unsubscribes when the SSE stream is dropped
struct SubscriptionGuard {
    broadcaster: Arc<Broadcaster>,
    id: SubscriberId,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}

/// GET /sse/dashboard - SSE stream of dashboard messages
pub async fn sse_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut subscriber = state.broadcaster.subscribe();
    let guard = SubscriptionGuard {
        broadcaster: Arc::clone(&state.broadcaster),
        id: subscriber.id(),
    };
    let welcome = WelcomeMessage::new(subscriber.id(), state.current_sequence_id());

    let stream = async_stream::stream! {
        let _guard = guard;

        yield Ok::<_, Infallible>(Event::default()
            .event("connected")
            .data(serde_json::to_string(&welcome).unwrap_or_default()));

        // Ends when the broadcaster drops this subscriber or shuts down
        while let Some(payload) = subscriber.recv().await {
            yield Ok(Event::default().event("data_change").data(payload));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default().interval(Duration::from_secs(30)))
}
