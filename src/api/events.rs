use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream};

use crate::core::state::AppState;
use crate::services::events::{EventSubscription, PipelineEvent};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/stream", get(event_stream))
}

/// Live pipeline transitions. The stream ends when the subscriber lags
/// behind; clients resynchronise by polling worksheet status.
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("event stream client connected");
    Sse::new(subscription_stream(state.events().subscribe()))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}

fn subscription_stream(
    subscription: EventSubscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        loop {
            let event = subscription.next().await?;
            match sse_event(&event) {
                Some(sse) => return Some((Ok(sse), subscription)),
                None => continue,
            }
        }
    })
}

fn sse_event(event: &PipelineEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event.as_str()).data(json)),
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize pipeline event");
            None
        }
    }
}
