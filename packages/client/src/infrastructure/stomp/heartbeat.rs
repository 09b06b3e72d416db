//! heart-beat header negotiation.

use std::time::Duration;

/// Effective heart-beat intervals after negotiation. `None` means disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    /// How often the client must send something
    pub outgoing: Option<Duration>,
    /// How often the broker promised to send something
    pub incoming: Option<Duration>,
}

impl Heartbeat {
    /// Silence longer than this means the connection is dead.
    pub fn incoming_deadline(&self) -> Option<Duration> {
        self.incoming.map(|interval| interval * 2)
    }
}

/// Header value the client offers in CONNECT: `<outgoing>,<incoming>` in milliseconds.
pub fn offer(outgoing: Duration, incoming: Duration) -> String {
    format!("{},{}", outgoing.as_millis(), incoming.as_millis())
}

/// Parse `cx,cy`. A missing or malformed header means `0,0`.
pub fn parse(header: Option<&str>) -> (u64, u64) {
    header
        .and_then(|value| {
            let (x, y) = value.split_once(',')?;
            Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
        })
        .unwrap_or((0, 0))
}

/// Negotiate against the CONNECTED frame's heart-beat header.
pub fn negotiate(
    client_outgoing: Duration,
    client_incoming: Duration,
    server: Option<&str>,
) -> Heartbeat {
    let (server_outgoing, server_incoming) = parse(server);
    let pick = |client: Duration, server_ms: u64| {
        let client_ms = u64::try_from(client.as_millis()).unwrap_or(u64::MAX);
        (client_ms != 0 && server_ms != 0).then(|| Duration::from_millis(client_ms.max(server_ms)))
    };

    Heartbeat {
        outgoing: pick(client_outgoing, server_incoming),
        incoming: pick(client_incoming, server_outgoing),
    }
}
