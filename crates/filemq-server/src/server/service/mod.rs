//! HTTP front-end and background maintenance.
//!
//! Requests are not routed by axum: a single fallback handler hands every
//! `(method, path)` pair to a [`filemq::RequestRouter`] and dispatches on the
//! name of the route that matched first.
//!
//! ## Structure
//!
//! - [`routes`] - the route table.
//! - [`handler`] - shared service state, per-request [`handler::Session`] and
//!   the dispatcher.
//! - [`endpoints`] - one function per route, mapping store outcomes to status
//!   codes.
//! - [`sweeper`] - optional in-process mover and reaper.

pub mod endpoints;
pub mod handler;
pub mod routes;
pub mod sweeper;
