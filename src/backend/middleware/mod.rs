//! Middleware Module
//!
//! Request processing ahead of handlers.
//!
//! - **`auth`** - Service-token check for the internal ingress

pub mod auth;

pub use auth::internal_auth_middleware;
