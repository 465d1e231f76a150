//! Infrastructure layer
//!
//! External collaborators of the list state:
//! - Access token service and token refresh
//! - REST page sources and item mutations
//! - Socket transport and the realtime session driver

pub mod api;
pub mod auth;
pub mod realtime;
pub mod socket;
