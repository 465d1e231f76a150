//! # dreamsync
//!
//! Client-side core of a dream journal platform: paginated, realtime-synchronized list
//! state for the dream list, the community feed, comment threads and reply threads, plus
//! the socket session that keeps them current.
//!
//! ## Architecture Overview
//!
//! State follows the Elm architecture:
//!
//! - **Model** (`model`): list state, items and the socket session state machine. Every
//!   component exposes `update(&mut self, Message)` and returns the effects it needs
//!   (`FetchRequest`, `Directive`) instead of performing them.
//! - **Infrastructure** (`infrastructure`): REST page sources and mutations, the process-wide
//!   auth session, the websocket transport and the realtime driver.
//! - **Integration** (`integration`): `ListSurface`, which executes effects on tasks and
//!   applies their results to one list while it is mounted.
//!
//! ## Example Usage
//!
//! ```rust
//! use dreamsync::model::list::{ListQuery, ListState, Message, Page};
//! use dreamsync::model::comment::Comment;
//!
//! let mut list: ListState<Comment> = ListState::new(ListQuery::new(), 10);
//! let (_, request) = list.update(Message::Mounted);
//! let request = request.expect("first page is requested on mount");
//!
//! list.update(Message::PageLoaded {
//!     ticket: request.ticket,
//!     page: Page { items: Vec::new(), current_page: 1, total_pages: 0 },
//! });
//! assert!(list.is_empty_state());
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod integration;
pub mod model;
pub mod utils;

pub use error::{Error, Result};
pub use integration::surface::{ListSurface, SurfaceUpdate};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
