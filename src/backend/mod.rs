//! Backend Module
//!
//! Server side of the real-time core: the WebSocket transport, the join and
//! membership machinery, the internal event ingress and the server bootstrap.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`realtime`** - Registry, oracle, join coordinator, propagator, fan-out
//! - **`server`** - Configuration, application state, initialization
//! - **`routes`** - Router assembly and HTTP handlers
//! - **`auth`** - Handshake token verification
//! - **`middleware`** - Service-token guard for the internal ingress
//! - **`error`** - Backend error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── realtime/       - Real-time core
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── auth/           - JWT verification
//! ├── middleware/     - Request middleware
//! └── error/          - Error types
//! ```
//!
//! # Data Flow
//!
//! Collaborators commit a mutation, then call `RealtimeHub::publish` or
//! `RealtimeHub::on_membership_changed` (in-process, or through
//! `POST /internal/*`). Live connections send `joinProject` / `leaveProject`
//! over `/ws`. The fan-out bus reads the registry to address delivery.
//!
//! # Example
//!
//! ```rust,no_run
//! use projecthub::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! let app = create_app(&config).await?;
//! let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Real-time core
pub mod realtime;

/// Backend error types
pub mod error;

/// Handshake token verification
pub mod auth;

/// Middleware for request processing
pub mod middleware;

pub use error::BackendError;
pub use realtime::RealtimeHub;
pub use server::create_app;
