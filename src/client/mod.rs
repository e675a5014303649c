//! Client Module
//!
//! Client-side session state and the reconciliation fallback that keeps it
//! converging while the live transport is unavailable.

/// Session state and reconciliation
pub mod sync;
