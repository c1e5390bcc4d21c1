// Connection upkeep: periodic pings keep intermediaries (which drop connections idle for about a
// minute) from closing the socket, and a lost connection is retried after a fixed backoff.

use std::cmp;
use std::time::Duration;

use instant::Instant;
use log::info;


pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
pub const RECONNECT_BACKOFF: Duration = Duration::from_millis(1000);

#[must_use]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeepaliveStatus {
    // No need to do anything.
    Noop,

    // Send a ping. `Keepalive` assumes that it will be sent when this is returned.
    SendPing,
}

pub struct Keepalive {
    interval: Duration,
    latest_outgoing: Instant,
}

impl Keepalive {
    pub fn new(now: Instant) -> Self { Self::with_interval(KEEPALIVE_INTERVAL, now) }

    pub fn with_interval(interval: Duration, now: Instant) -> Self {
        Keepalive { interval, latest_outgoing: now }
    }

    pub fn register_outgoing(&mut self, now: Instant) {
        self.latest_outgoing = cmp::max(self.latest_outgoing, now);
    }

    pub fn update(&mut self, now: Instant) -> KeepaliveStatus {
        if now.saturating_duration_since(self.latest_outgoing) < self.interval {
            return KeepaliveStatus::Noop;
        }
        self.latest_outgoing = now;
        KeepaliveStatus::SendPing
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConnectionStatus {
    Connected,
    // Waiting for the next attempt.
    Reconnecting { since: Instant },
}

// Tracks when to retry after the transport is lost.
pub struct Reconnector {
    backoff: Duration,
    status: ConnectionStatus,
    next_attempt: Option<Instant>,
}

impl Reconnector {
    pub fn new(backoff: Duration) -> Self {
        Reconnector { backoff, status: ConnectionStatus::Connected, next_attempt: None }
    }

    pub fn status(&self) -> ConnectionStatus { self.status }
    pub fn is_connected(&self) -> bool { self.status == ConnectionStatus::Connected }

    pub fn connection_lost(&mut self, now: Instant) {
        if let ConnectionStatus::Connected = self.status {
            self.status = ConnectionStatus::Reconnecting { since: now };
        }
        let next = now + self.backoff;
        info!("Reconnecting in {} ms", self.backoff.as_millis());
        self.next_attempt = Some(next);
    }

    // Whether a new connection attempt is due. At most one attempt per `connection_lost`.
    pub fn should_attempt(&mut self, now: Instant) -> bool {
        match self.next_attempt {
            Some(t) if now >= t => {
                self.next_attempt = None;
                true
            }
            _ => false,
        }
    }

    pub fn connected(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.next_attempt = None;
    }
}

impl Default for Reconnector {
    fn default() -> Self { Self::new(RECONNECT_BACKOFF) }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pings_on_idle() {
        let t0 = Instant::now();
        let mut keepalive = Keepalive::new(t0);
        assert_eq!(keepalive.update(t0 + Duration::from_secs(10)), KeepaliveStatus::Noop);
        keepalive.register_outgoing(t0 + Duration::from_secs(20));
        assert_eq!(keepalive.update(t0 + Duration::from_secs(40)), KeepaliveStatus::Noop);
        assert_eq!(keepalive.update(t0 + Duration::from_secs(50)), KeepaliveStatus::SendPing);
        assert_eq!(keepalive.update(t0 + Duration::from_secs(51)), KeepaliveStatus::Noop);
    }

    #[test]
    fn reconnect_after_backoff() {
        let t0 = Instant::now();
        let mut reconnector = Reconnector::default();
        assert!(!reconnector.should_attempt(t0));
        reconnector.connection_lost(t0);
        assert!(!reconnector.is_connected());
        assert!(!reconnector.should_attempt(t0 + Duration::from_millis(500)));
        assert!(reconnector.should_attempt(t0 + Duration::from_millis(1000)));
        assert!(!reconnector.should_attempt(t0 + Duration::from_millis(3000)));
        reconnector.connection_lost(t0 + Duration::from_millis(3000));
        assert_eq!(reconnector.status(), ConnectionStatus::Reconnecting { since: t0 });
        reconnector.connected();
        assert!(reconnector.is_connected());
    }
}
