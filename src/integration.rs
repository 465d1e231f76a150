//! Integration layer
//!
//! Binds list state to its collaborators:
//! - `surface`: a mounted list executing fetches, mutations and realtime updates
//! - `surfaces`: the dream list, post feed, comment list and reply list

pub mod surface;
pub mod surfaces;
