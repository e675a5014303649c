//! Server Module
//!
//! Configuration, shared state and startup for the realtime server.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Environment configuration and database pool
//! └── init.rs         - State construction and app creation
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Configuration Loading**: `ServerConfig::from_env`
//! 2. **Oracle Selection**: PostgreSQL when `DATABASE_URL` is set, otherwise in-memory
//! 3. **State Creation**: hub, token secrets, pool
//! 4. **Background Tasks**: database reachability check, dead-connection sweep
//! 5. **Router Creation**: WebSocket, health and internal ingress routes

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use config::ServerConfig;
pub use init::{build_state, create_app};
pub use state::AppState;
