use filemq::{RequestRouter, Result};

pub const CREATE_MESSAGE: &str = "create_message";
pub const GET_MESSAGES: &str = "get_messages";
pub const DELETE_MESSAGE: &str = "delete_message";
pub const CREATE_QUEUE: &str = "create_queue";
pub const GET_QUEUE: &str = "get_queue";
pub const DELETE_QUEUE: &str = "delete_queue";

/// Path variable holding the queue id.
pub const QUEUE_VAR: &str = "queue";
/// Path variable holding the message id.
pub const MESSAGE_VAR: &str = "message";

/// `(name, verb, pattern)`, most specific first.
const ROUTES: &[(&str, &str, &str)] = &[
    (CREATE_MESSAGE, "POST", r"^/(?P<queue>[a-z]+)/messages/?$"),
    (GET_MESSAGES, "GET", r"^/(?P<queue>[a-z]+)/messages/?$"),
    (
        DELETE_MESSAGE,
        "DELETE",
        r"^/(?P<queue>[a-z]+)/messages/(?P<message>[A-Za-z0-9-]+)$",
    ),
    (CREATE_QUEUE, "PUT", r"^/(?P<queue>[a-z]+)/?$"),
    (GET_QUEUE, "GET", r"^/(?P<queue>[a-z]+)/?$"),
    (DELETE_QUEUE, "DELETE", r"^/(?P<queue>[a-z]+)/?$"),
];

/// Builds the broker's route table.
pub fn build_router() -> Result<RequestRouter> {
    let mut router = RequestRouter::new();
    for &(name, verb, pattern) in ROUTES {
        router.add_route(name, verb, pattern)?;
    }
    Ok(router)
}
