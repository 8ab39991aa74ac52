//! HTTP API: server wiring, session middleware and the auth routes.

pub mod app;
pub mod middleware;
