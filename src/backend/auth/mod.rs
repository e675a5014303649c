//! Authentication Module
//!
//! Verifies the bearer credential a client presents when it opens the live
//! transport. Account management and credential storage live in the web API;
//! this module only turns a signed token into an identity.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! └── sessions.rs     - JWT creation and verification
//! ```

/// JWT token generation and validation
pub mod sessions;

pub use sessions::{create_token, identity_from_token, verify_token, Claims};
