//! Live feed for dependency views.
//!
//! Views subscribe with server-sent events and refetch the graph when a
//! `graph` event names their session.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tokio::sync::broadcast;

use dfnb_state::{SessionId, ViewNotification};

use crate::error::ApiError;
use crate::state::AppState;

use super::require_session;

/// Notifications for `session` only. A subscriber that fell behind gets one
/// full redraw in place of what it missed.
pub fn session_notifications(
    mut rx: broadcast::Receiver<ViewNotification>,
    session: SessionId,
) -> impl Stream<Item = ViewNotification> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(notice) if notice.session == session => yield notice,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(%session, skipped, "view feed lagged");
                    yield ViewNotification {
                        session,
                        force_full_redraw: true,
                        flagged: Vec::new(),
                    };
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// `GET /sessions/{id}/views`
pub async fn view_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = require_session(&state, &id)?;
    let events = session_notifications(state.registry.subscribe(), session.id()).filter_map(
        |notice| {
            let event = Event::default()
                .event("graph")
                .json_data(&notice)
                .map_err(|err| tracing::warn!("dropping view notification: {}", err))
                .ok();
            futures::future::ready(event.map(Ok::<Event, Infallible>))
        },
    );
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfnb_core::ShortCellId;
    use dfnb_state::GraphRegistry;

    #[tokio::test]
    async fn feed_keeps_only_its_session() {
        let registry = GraphRegistry::new(8);
        let ours = SessionId::new();
        let mut feed = Box::pin(session_notifications(registry.subscribe(), ours));

        registry.notify_views(SessionId::new(), true);
        registry.notify_flagged(ours, vec![ShortCellId::from_raw(1)]);

        let notice = feed.next().await.unwrap();
        assert_eq!(notice.session, ours);
        assert!(!notice.force_full_redraw);
        assert_eq!(notice.flagged, vec![ShortCellId::from_raw(1)]);
    }

    #[tokio::test]
    async fn lagging_feed_gets_a_full_redraw() {
        let registry = GraphRegistry::new(2);
        let ours = SessionId::new();
        let mut feed = Box::pin(session_notifications(registry.subscribe(), ours));

        for _ in 0..3 {
            registry.notify_views(ours, false);
        }

        assert!(feed.next().await.unwrap().force_full_redraw);
        assert!(!feed.next().await.unwrap().force_full_redraw);
        assert!(!feed.next().await.unwrap().force_full_redraw);
    }
}
