//! REST API module for the product search service
//!
//! Provides the HTTP endpoints for semantic catalog search. Uses axum for
//! routing and schemars for OpenAPI documentation generation.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routing;
pub mod server;
pub mod services;
pub mod types;
