//! API Module
//!
//! HTTP handlers and routing exposing the namespaced caches over REST.
//!
//! # Endpoints
//! - `PUT /cache/:namespace/:key` - Store a value
//! - `GET /cache/:namespace/:key` - Retrieve a value
//! - `DELETE /cache/:namespace/:key` - Delete a key
//! - `DELETE /cache/:namespace` - Clear a namespace
//! - `GET /keys/:namespace` - List keys
//! - `GET /stats/:namespace` - Get namespace statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
