//! `heart-beat` header.

use std::{fmt, str::FromStr, time::Duration};

use crate::errors::ProtocolError;

/// One side's heart-beat declaration, `heart-beat:<outgoing>,<incoming>`.
///
/// `outgoing_ms` is the smallest interval at which the sender can emit
/// heart-beats; `incoming_ms` is the interval at which it wants to receive
/// them. Zero means "cannot" / "does not want".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Interval this side can send at, in milliseconds.
    pub outgoing_ms: u64,
    /// Interval this side wants to receive at, in milliseconds.
    pub incoming_ms: u64,
}

impl HeartBeat {
    /// Heart-beats disabled in both directions.
    pub const DISABLED: Self = Self { outgoing_ms: 0, incoming_ms: 0 };

    /// Create a declaration.
    pub const fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self { outgoing_ms, incoming_ms }
    }

    /// Declaration from durations (truncated to milliseconds).
    pub fn from_durations(outgoing: Duration, incoming: Duration) -> Self {
        Self::new(outgoing.as_millis() as u64, incoming.as_millis() as u64)
    }

    /// Negotiate effective intervals, `self` being the client and `server`
    /// the broker's `CONNECTED` declaration.
    ///
    /// Returns `(send_every, expect_every)`. `None` disables that direction.
    pub fn negotiate(self, server: Self) -> (Option<Duration>, Option<Duration>) {
        let pick = |ours: u64, theirs: u64| {
            (ours != 0 && theirs != 0).then(|| Duration::from_millis(ours.max(theirs)))
        };

        (pick(self.outgoing_ms, server.incoming_ms), pick(self.incoming_ms, server.outgoing_ms))
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.outgoing_ms, self.incoming_ms)
    }
}

impl FromStr for HeartBeat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidHeartBeat(s.to_string());

        let (out, inc) = s.split_once(',').ok_or_else(invalid)?;
        let outgoing_ms = out.trim().parse().map_err(|_| invalid())?;
        let incoming_ms = inc.trim().parse().map_err(|_| invalid())?;

        Ok(Self { outgoing_ms, incoming_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let hb: HeartBeat = "4000,10000".parse().unwrap();
        assert_eq!(hb, HeartBeat::new(4000, 10000));
        insta::assert_snapshot!(hb.to_string(), @"4000,10000");
    }

    #[test]
    fn reject_garbage() {
        assert!("4000".parse::<HeartBeat>().is_err());
        assert!("a,b".parse::<HeartBeat>().is_err());
        assert!("-1,0".parse::<HeartBeat>().is_err());
    }

    #[test]
    fn negotiate_takes_max() {
        let client = HeartBeat::new(4000, 4000);
        let server = HeartBeat::new(10000, 2000);

        let (send, expect) = client.negotiate(server);
        assert_eq!(send, Some(Duration::from_millis(4000)));
        assert_eq!(expect, Some(Duration::from_millis(10000)));
    }

    #[test]
    fn zero_disables_direction() {
        let client = HeartBeat::new(4000, 4000);

        let negotiated = client.negotiate(HeartBeat::new(0, 5000));
        assert_eq!(negotiated, (Some(Duration::from_millis(5000)), None));
        assert_eq!(client.negotiate(HeartBeat::DISABLED), (None, None));
        assert_eq!(HeartBeat::DISABLED.negotiate(HeartBeat::new(1000, 1000)), (None, None));
    }
}
