//! Pure state for list surfaces and socket sessions
//!
//! Every stateful type here follows the Elm Architecture: state changes only through an
//! `update` function that receives a past-tense `Message`, and side effects (fetches,
//! reconnects) are returned as values for the caller to execute.

pub mod comment;
pub mod dream;
pub mod edit;
pub mod item;
pub mod list;
pub mod post;
pub mod reconcile;
pub mod session;
