use std::convert::Infallible;

use axum::extract::{Extension, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::AppState;
use super::auth::AuthCtx;

/// Streams this family's change notifications. A lagging listener gets a
/// `resync` event and should refetch whatever it shows.
pub async fn api_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(family_id = %family_id, username = %auth.claims.sub, "events: subscriber connected");
    let rx = state.routines.events().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |item| {
        let family_id = family_id.clone();
        async move {
            match item {
                Ok(event) if event.family_id() == family_id => {
                    match Event::default().event("change").json_data(&event) {
                        Ok(ev) => Some(Ok(ev)),
                        Err(e) => {
                            tracing::error!(error = %e, "events: serialize failed");
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "events: subscriber lagged");
                    Some(Ok(Event::default().event("resync").data(skipped.to_string())))
                }
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
