//! One function per route.
//!
//! | Route            | Success                       | Otherwise                     |
//! |------------------|-------------------------------|-------------------------------|
//! | `create_queue`   | 201                           | 500                           |
//! | `get_queue`      | 200                           | 404                           |
//! | `delete_queue`   | 200                           | 500                           |
//! | `create_message` | 201 + `X-Message-Id`          | 404 no queue, 503 + retry     |
//! | `get_messages`   | 200 + body + `X-Message-Id`   | 204 nothing claimable, 503    |
//! | `delete_message` | 202                           | 404 not in any folder, 500    |
//!
//! Queue management and deletes are single blocking filesystem calls and run
//! on tokio's blocking pool. Saves and fetches already run on the store's
//! worker threads.

use super::handler::{FileMqService, Session};
use crate::server::telemetry::{
    increment_empty_fetches, increment_messages_delivered, increment_messages_saved,
    increment_save_failures,
};
use axum::{
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use filemq::{Error, Message, Store, UuidGenerator};
use std::sync::Arc;

pub const MESSAGE_ID_HEADER: HeaderName = HeaderName::from_static("x-message-id");

/// Seconds a client should wait before retrying a failed save.
const RETRY_AFTER_SECS: &str = "1";

/// Runs `f` against the store on the blocking pool.
async fn blocking<T, F>(store: &Arc<Store>, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> T + Send + 'static,
{
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || f(&store)).await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("Blocking store call failed: {e}");
            None
        }
    }
}

pub async fn create_queue(service: &FileMqService, session: Session) -> Response {
    let queue = session.queue();
    match blocking(&service.store, move |store| store.save_queue(&queue)).await {
        Some(Ok(())) => StatusCode::CREATED.into_response(),
        Some(Err(e)) => {
            tracing::warn!("Failed to create queue: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub async fn get_queue(service: &FileMqService, session: Session) -> Response {
    let queue = session.queue();
    match blocking(&service.store, move |store| store.load_queue(&queue)).await {
        Some(true) => StatusCode::OK.into_response(),
        Some(false) => StatusCode::NOT_FOUND.into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub async fn delete_queue(service: &FileMqService, session: Session) -> Response {
    let queue = session.queue();
    match blocking(&service.store, move |store| store.delete_queue(&queue)).await {
        Some(Ok(())) => StatusCode::OK.into_response(),
        Some(Err(e)) => {
            tracing::warn!("Failed to delete queue: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub async fn create_message(service: &FileMqService, session: Session) -> Response {
    let queue = session.queue();

    let exists = {
        let queue = queue.clone();
        blocking(&service.store, move |store| store.load_queue(&queue)).await
    };
    match exists {
        Some(true) => {}
        Some(false) => return StatusCode::NOT_FOUND.into_response(),
        None => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }

    let message_id = service.ids.next_id().hyphenated().to_string();
    let message = Message::new(message_id.clone(), session.body.to_vec());

    match service.store.save_message(&queue, message).await {
        Ok(()) => {
            increment_messages_saved();
            (StatusCode::CREATED, [(MESSAGE_ID_HEADER, message_id)]).into_response()
        }
        Err(e) => {
            tracing::warn!(%message_id, "Failed to save message: {e}");
            increment_save_failures();
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
            )
                .into_response()
        }
    }
}

pub async fn get_messages(service: &FileMqService, session: Session) -> Response {
    match service.store.load_next_message(&session.queue()).await {
        Ok(Some(message)) => {
            increment_messages_delivered();
            (
                StatusCode::OK,
                [(MESSAGE_ID_HEADER, message.id)],
                message.content,
            )
                .into_response()
        }
        Ok(None) => {
            increment_empty_fetches();
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch message: {e}");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

pub async fn delete_message(service: &FileMqService, session: Session) -> Response {
    let queue = session.queue();
    let message_id = session.message_id().to_owned();

    match blocking(&service.store, move |store| store.delete_message(&queue, &message_id)).await {
        Some(Ok(_)) => StatusCode::ACCEPTED.into_response(),
        Some(Err(Error::NotFound { .. })) => StatusCode::NOT_FOUND.into_response(),
        Some(Err(e)) => {
            tracing::warn!("Failed to delete message: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
