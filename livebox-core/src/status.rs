//! Realtime channel states.
//!
//! [`ChannelStatus`] is what the transport reports, mirroring the status
//! strings a hosted realtime service hands to its subscribe callback.
//! [`ChannelState`] is the state machine livebox keeps per channel:
//!
//! ```text
//! Closed ──open──▶ Opening ──SUBSCRIBED──▶ Subscribed
//!                     ▲                        │
//!                     └──CHANNEL_ERROR/TIMED_OUT┘
//! any ──close/CLOSED──▶ Closed (terminal)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status reported by the realtime transport for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    /// Server acknowledged the subscription.
    Subscribed,
    /// The channel failed; the transport may recover on its own.
    ChannelError,
    /// Subscription attempt timed out; the transport may retry.
    TimedOut,
    /// The server closed the channel.
    Closed,
    /// Status string livebox does not interpret.
    Other(String),
}

impl ChannelStatus {
    /// Parses a transport status string such as `"SUBSCRIBED"`.
    pub fn parse(status: &str) -> Self {
        match status {
            "SUBSCRIBED" => Self::Subscribed,
            "CHANNEL_ERROR" => Self::ChannelError,
            "TIMED_OUT" => Self::TimedOut,
            "CLOSED" => Self::Closed,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the canonical status string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Subscribed => "SUBSCRIBED",
            Self::ChannelError => "CHANNEL_ERROR",
            Self::TimedOut => "TIMED_OUT",
            Self::Closed => "CLOSED",
            Self::Other(status) => status,
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelState {
    /// No channel, or the channel was released. Terminal for a subscriber.
    #[default]
    Closed,
    /// Channel requested; waiting for (re)acknowledgement.
    Opening,
    /// Server acknowledged; push events are applied.
    Subscribed,
}

impl ChannelState {
    /// Whether the channel is connected (the UI's "live" indicator).
    pub fn is_connected(self) -> bool {
        self == Self::Subscribed
    }

    /// State reached after `status` is reported in state `self`.
    ///
    /// `Closed` is terminal, later statuses never reopen it.
    pub fn on_status(self, status: &ChannelStatus) -> Self {
        match (self, status) {
            (Self::Closed, _) => Self::Closed,
            (_, ChannelStatus::Subscribed) => Self::Subscribed,
            (_, ChannelStatus::ChannelError | ChannelStatus::TimedOut) => Self::Opening,
            (_, ChannelStatus::Closed) => Self::Closed,
            (state, ChannelStatus::Other(_)) => state,
        }
    }

    /// Returns the state name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Subscribed => "subscribed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for raw in ["SUBSCRIBED", "CHANNEL_ERROR", "TIMED_OUT", "CLOSED", "JOINING"] {
            assert_eq!(ChannelStatus::parse(raw).as_str(), raw);
        }
    }

    #[test]
    fn only_subscribed_connects() {
        let opening = ChannelState::Opening;
        assert_eq!(
            opening.on_status(&ChannelStatus::Subscribed),
            ChannelState::Subscribed
        );
        assert_eq!(
            opening.on_status(&ChannelStatus::parse("JOINING")),
            ChannelState::Opening
        );
        assert!(!opening.is_connected());
    }

    #[test]
    fn errors_drop_back_to_opening() {
        let live = ChannelState::Subscribed;
        assert_eq!(
            live.on_status(&ChannelStatus::ChannelError),
            ChannelState::Opening
        );
        assert_eq!(live.on_status(&ChannelStatus::TimedOut), ChannelState::Opening);
    }

    #[test]
    fn closed_is_terminal() {
        let closed = ChannelState::Subscribed.on_status(&ChannelStatus::Closed);
        assert_eq!(closed, ChannelState::Closed);
        assert_eq!(
            closed.on_status(&ChannelStatus::Subscribed),
            ChannelState::Closed
        );
    }
}
