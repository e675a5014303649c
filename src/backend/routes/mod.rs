//! Route Configuration Module
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs              - Module exports and documentation
//! ├── router.rs           - Main router creation
//! ├── api_routes.rs       - Public API endpoints (health)
//! └── internal_routes.rs  - Service-token guarded event ingress
//! ```

/// Main router creation
pub mod router;

/// Public API endpoints
pub mod api_routes;

/// Internal event ingress
pub mod internal_routes;

pub use router::create_router;
