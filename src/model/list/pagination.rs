//! Page bookkeeping for a paginated list
//!
//! This module follows the Elm Architecture pattern:
//! - State changes only through the `update` function
//! - All state transitions are explicitly defined as `Message` variants
//! - The module is self-contained and doesn't know about items or filters

/// Identifies one issued fetch. A response is only accepted when its ticket is the one
/// currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub(crate) u64);

/// Messages that can be sent to update the pagination state
///
/// Following Elm conventions, messages are named in past tense
/// to indicate "what happened" rather than "what to do"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A fetch for `page` was issued
    PageRequested { ticket: Ticket, page: u32 },
    /// The in-flight fetch resolved with the server's page counters
    PageLoaded {
        ticket: Ticket,
        current_page: u32,
        total_pages: u32,
    },
    /// The in-flight fetch failed
    PageFailed { ticket: Ticket },
    /// Pagination was reset to the first page
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number, starts at 1
    page: u32,
    /// Highest page merged into the list
    loaded: u32,
    has_more: bool,
    in_flight: Option<Ticket>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new()
    }
}

impl Pagination {
    pub fn new() -> Self {
        Self {
            page: 1,
            loaded: 0,
            has_more: true,
            in_flight: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn loaded_page(&self) -> u32 {
        self.loaded
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight
    }

    /// Whether `ticket` belongs to the fetch currently in flight
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.in_flight == Some(ticket)
    }

    /// The page the next fetch should ask for.
    ///
    /// When the current page has not been merged yet (its fetch failed) the same page is
    /// requested again instead of skipping ahead.
    pub fn next_page(&self) -> u32 {
        if self.loaded < self.page {
            self.page
        } else {
            self.page + 1
        }
    }

    pub fn update(&mut self, message: Message) {
        match message {
            Message::PageRequested { ticket, page } => {
                self.page = page;
                self.in_flight = Some(ticket);
            }
            Message::PageLoaded {
                ticket,
                current_page,
                total_pages,
            } => {
                if self.in_flight != Some(ticket) {
                    return;
                }
                self.loaded = self.page;
                self.has_more = current_page < total_pages;
                self.in_flight = None;
            }
            Message::PageFailed { ticket } => {
                if self.in_flight == Some(ticket) {
                    self.in_flight = None;
                }
            }
            Message::Reset => {
                *self = Self::new();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_default() {
        let state = Pagination::new();
        assert_eq!(state.page(), 1);
        assert_eq!(state.next_page(), 1);
        assert!(state.has_more());
        assert!(!state.is_loading());
    }

    #[test]
    fn test_page_lifecycle() {
        let mut state = Pagination::new();

        state.update(Message::PageRequested {
            ticket: Ticket(1),
            page: 1,
        });
        assert!(state.is_loading());
        assert!(state.is_current(Ticket(1)));

        state.update(Message::PageLoaded {
            ticket: Ticket(1),
            current_page: 1,
            total_pages: 3,
        });
        assert!(!state.is_loading());
        assert!(state.has_more());
        assert_eq!(state.next_page(), 2);
    }

    #[test]
    fn test_has_more_from_server_counters() {
        let mut state = Pagination::new();
        state.update(Message::PageRequested {
            ticket: Ticket(1),
            page: 1,
        });
        state.update(Message::PageLoaded {
            ticket: Ticket(1),
            current_page: 3,
            total_pages: 3,
        });
        assert!(!state.has_more());
    }

    #[test]
    fn test_failed_page_is_requested_again() {
        let mut state = Pagination::new();
        state.update(Message::PageRequested {
            ticket: Ticket(1),
            page: 1,
        });
        state.update(Message::PageLoaded {
            ticket: Ticket(1),
            current_page: 1,
            total_pages: 2,
        });
        state.update(Message::PageRequested {
            ticket: Ticket(2),
            page: 2,
        });
        state.update(Message::PageFailed { ticket: Ticket(2) });

        assert!(!state.is_loading());
        assert_eq!(state.page(), 2);
        assert_eq!(state.next_page(), 2);
    }

    #[test]
    fn test_stale_ticket_ignored() {
        let mut state = Pagination::new();
        state.update(Message::PageRequested {
            ticket: Ticket(2),
            page: 1,
        });
        state.update(Message::PageLoaded {
            ticket: Ticket(1),
            current_page: 1,
            total_pages: 1,
        });
        assert!(state.is_loading());
        assert!(state.has_more());
    }

    #[test]
    fn test_reset() {
        let mut state = Pagination::new();
        state.update(Message::PageRequested {
            ticket: Ticket(4),
            page: 3,
        });
        state.update(Message::Reset);
        assert_eq!(state, Pagination::new());
    }
}
