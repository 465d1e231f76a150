//! Socket session lifecycle state machine
//!
//! `Disconnected -> Connecting -> Connected`, `Connected -> Reauthenticating -> Connected` on
//! token expiry, and any state `-> Disconnected` on unmount or unrecoverable failure. The
//! machine is pure: the realtime driver reports what happened and executes the returned
//! `Directive`.

use strum::Display;

/// Default number of reconnection attempts before realtime updates are given up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reauthenticating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    ConnectStarted,
    ConnectSucceeded,
    ConnectFailed,
    /// The transport closed while connected
    ConnectionLost,
    /// The server rejected the token as expired
    AuthExpired,
    /// A fresh token was obtained and the transport reopened with it
    Reauthenticated,
    /// The token could not be refreshed
    RefreshFailed,
    /// A realtime event was delivered
    EventReceived,
    /// The owning surface went away
    Unmounted,
}

/// What the driver must do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    /// Refresh the token, then reopen the transport with it
    RefreshToken,
    /// Reopen the transport after backing off
    Reconnect { attempt: u32 },
    /// Stop for good; realtime updates end and periodic fetching remains the fallback
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketSession {
    state: ConnectionState,
    max_attempts: u32,
    reconnects: u32,
    reauths: u32,
    finished: bool,
}

impl Default for SocketSession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl SocketSession {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            max_attempts,
            reconnects: 0,
            reauths: 0,
            finished: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the session stopped and will never connect again
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn update(&mut self, message: Message) -> Directive {
        if self.finished {
            return Directive::GiveUp;
        }
        match message {
            Message::ConnectStarted => {
                self.state = ConnectionState::Connecting;
                Directive::Continue
            }
            Message::ConnectSucceeded => {
                self.state = ConnectionState::Connected;
                self.reconnects = 0;
                Directive::Continue
            }
            Message::ConnectFailed | Message::ConnectionLost => {
                self.state = ConnectionState::Disconnected;
                self.reconnects += 1;
                if self.reconnects > self.max_attempts {
                    return self.give_up();
                }
                Directive::Reconnect {
                    attempt: self.reconnects,
                }
            }
            Message::AuthExpired => {
                self.reauths += 1;
                if self.reauths > self.max_attempts {
                    return self.give_up();
                }
                self.state = ConnectionState::Reauthenticating;
                Directive::RefreshToken
            }
            Message::Reauthenticated => {
                self.state = ConnectionState::Connected;
                self.reconnects = 0;
                Directive::Continue
            }
            Message::EventReceived => {
                self.reauths = 0;
                Directive::Continue
            }
            Message::RefreshFailed | Message::Unmounted => self.give_up(),
        }
    }

    fn give_up(&mut self) -> Directive {
        self.state = ConnectionState::Disconnected;
        self.finished = true;
        Directive::GiveUp
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn connected() -> SocketSession {
        let mut session = SocketSession::new(2);
        session.update(Message::ConnectStarted);
        session.update(Message::ConnectSucceeded);
        session
    }

    #[test]
    fn test_connect() {
        let mut session = SocketSession::default();
        assert_eq!(session.state(), ConnectionState::Disconnected);
        session.update(Message::ConnectStarted);
        assert_eq!(session.state(), ConnectionState::Connecting);
        session.update(Message::ConnectSucceeded);
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_reauthentication() {
        let mut session = connected();
        assert_eq!(session.update(Message::AuthExpired), Directive::RefreshToken);
        assert_eq!(session.state(), ConnectionState::Reauthenticating);
        assert_eq!(session.update(Message::Reauthenticated), Directive::Continue);
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_reconnects_are_bounded() {
        let mut session = connected();
        assert_eq!(
            session.update(Message::ConnectionLost),
            Directive::Reconnect { attempt: 1 }
        );
        session.update(Message::ConnectStarted);
        assert_eq!(
            session.update(Message::ConnectFailed),
            Directive::Reconnect { attempt: 2 }
        );
        session.update(Message::ConnectStarted);
        assert_eq!(session.update(Message::ConnectFailed), Directive::GiveUp);
        assert!(session.is_finished());
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_successful_connect_resets_attempts() {
        let mut session = connected();
        session.update(Message::ConnectionLost);
        session.update(Message::ConnectSucceeded);
        session.update(Message::ConnectionLost);
        assert_eq!(
            session.update(Message::ConnectionLost),
            Directive::Reconnect { attempt: 2 }
        );
    }

    #[test]
    fn test_repeated_expiry_without_events_gives_up() {
        let mut session = connected();
        for _ in 0..2 {
            assert_eq!(session.update(Message::AuthExpired), Directive::RefreshToken);
            session.update(Message::Reauthenticated);
        }
        assert_eq!(session.update(Message::AuthExpired), Directive::GiveUp);
    }

    #[test]
    fn test_events_reset_expiry_budget() {
        let mut session = connected();
        for _ in 0..5 {
            assert_eq!(session.update(Message::AuthExpired), Directive::RefreshToken);
            session.update(Message::Reauthenticated);
            session.update(Message::EventReceived);
        }
    }

    #[test]
    fn test_failed_reopen_during_reauthentication_reconnects() {
        let mut session = connected();
        session.update(Message::AuthExpired);
        assert_eq!(
            session.update(Message::ConnectFailed),
            Directive::Reconnect { attempt: 1 }
        );
        assert_eq!(session.state(), ConnectionState::Disconnected);
        session.update(Message::ConnectStarted);
        assert_eq!(session.state(), ConnectionState::Connecting);
        session.update(Message::Reauthenticated);
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[rstest]
    #[case(Message::RefreshFailed)]
    #[case(Message::Unmounted)]
    fn test_terminal(#[case] message: Message) {
        let mut session = connected();
        assert_eq!(session.update(message), Directive::GiveUp);
        assert!(session.is_finished());
        assert_eq!(session.update(Message::ConnectStarted), Directive::GiveUp);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
