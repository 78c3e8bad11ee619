//! Shared service state and the fallback dispatcher.

use super::{endpoints, routes};
use crate::server::telemetry::{increment_requests, record_request_duration};
use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use filemq::{IdGenerator, Queue, RequestRouter, RouteMatch, Store};
use std::{sync::Arc, time::Instant};

/// Everything a request needs, shared by all of them.
#[derive(Clone)]
pub struct FileMqService {
    pub store: Arc<Store>,
    pub ids: Arc<IdGenerator>,
    pub router: Arc<RequestRouter>,
}

impl FileMqService {
    pub fn new(store: Arc<Store>, ids: IdGenerator, router: RequestRouter) -> Self {
        Self {
            store,
            ids: Arc::new(ids),
            router: Arc::new(router),
        }
    }
}

/// One request after routing: the route that matched and the request body.
///
/// Created fresh per request and dropped with its response.
pub struct Session {
    pub route: RouteMatch,
    pub body: Bytes,
}

impl Session {
    /// The queue named in the path. Every route captures one.
    pub fn queue(&self) -> Queue {
        Queue::new(self.route.variable(routes::QUEUE_VAR).unwrap_or_default())
    }

    pub fn message_id(&self) -> &str {
        self.route.variable(routes::MESSAGE_VAR).unwrap_or_default()
    }
}

/// Fallback handler for every request: route, then dispatch by route name.
#[tracing::instrument(skip_all, fields(%method, path = %uri.path()))]
pub async fn dispatch(
    State(service): State<FileMqService>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    increment_requests();

    let Some(route) = service.router.matches(method.as_str(), uri.path()) else {
        tracing::debug!("No route");
        return StatusCode::NOT_FOUND.into_response();
    };

    let name = route.name.clone();
    let session = Session { route, body };
    let response = match name.as_str() {
        routes::CREATE_QUEUE => endpoints::create_queue(&service, session).await,
        routes::GET_QUEUE => endpoints::get_queue(&service, session).await,
        routes::DELETE_QUEUE => endpoints::delete_queue(&service, session).await,
        routes::CREATE_MESSAGE => endpoints::create_message(&service, session).await,
        routes::GET_MESSAGES => endpoints::get_messages(&service, session).await,
        routes::DELETE_MESSAGE => endpoints::delete_message(&service, session).await,
        _ => StatusCode::NOT_FOUND.into_response(),
    };

    tracing::debug!(route = %name, status = %response.status(), "Handled");
    record_request_duration(start.elapsed().as_secs_f64() * 1000.0);
    response
}
