use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::net::{Envelope, Opcode, Ping, Pong};

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RttSource {
    /// Computed from the timestamp a Pong echoed back.
    Echo,
    /// Smoothed sample reported by the transport.
    Transport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttSample {
    pub rtt: Duration,
    pub source: RttSource,
}

/// Client-side ping schedule and latency bookkeeping.
///
/// Inactive until [`Keepalive::activate`]; an inactive tracker never yields a
/// ping. Time is passed in so the schedule stays deterministic under test.
#[derive(Debug, Clone)]
pub struct Keepalive {
    interval: Duration,
    next_ping: Option<Instant>,
    latest: Option<RttSample>,
    pings_sent: u64,
    pongs_received: u64,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self::new(DEFAULT_PING_INTERVAL)
    }
}

impl Keepalive {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_ping: None,
            latest: None,
            pings_sent: 0,
            pongs_received: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn activate(&mut self, now: Instant) {
        self.next_ping = Some(now + self.interval);
    }

    pub fn deactivate(&mut self) {
        self.next_ping = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_ping.is_some()
    }

    /// Yields a ping when one is due.
    pub fn poll(&mut self, now: Instant, now_ms: u64) -> Option<Ping> {
        let due = self.next_ping?;
        if now < due {
            return None;
        }

        // Skip missed slots rather than bursting after a stall.
        let mut next = due + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_ping = Some(next);

        Some(self.ping_now(now_ms))
    }

    /// An out-of-schedule ping. Only meaningful while active.
    pub fn ping_now(&mut self, now_ms: u64) -> Ping {
        self.pings_sent += 1;
        Ping { ticks: now_ms }
    }

    pub fn on_pong(&mut self, pong: Pong, now_ms: u64) -> Duration {
        let rtt = Duration::from_millis(now_ms.saturating_sub(pong.ticks));
        self.pongs_received += 1;
        self.latest = Some(RttSample {
            rtt,
            source: RttSource::Echo,
        });
        rtt
    }

    pub fn on_latency_sample(&mut self, rtt: Duration) {
        self.latest = Some(RttSample {
            rtt,
            source: RttSource::Transport,
        });
    }

    pub fn rtt(&self) -> Option<RttSample> {
        self.latest
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent
    }

    pub fn pongs_received(&self) -> u64 {
        self.pongs_received
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Server reply to a Ping: the same payload bytes under the Pong opcode.
pub fn pong_for(ping: &Envelope) -> Envelope {
    Envelope::new(Opcode::Pong, ping.payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_never_pings() {
        let mut keepalive = Keepalive::default();
        let now = Instant::now();
        assert!(keepalive.poll(now, 0).is_none());
        assert!(keepalive.poll(now + Duration::from_secs(60), 0).is_none());
        assert_eq!(keepalive.pings_sent(), 0);
    }

    #[test]
    fn test_first_ping_after_one_interval() {
        let mut keepalive = Keepalive::new(Duration::from_secs(2));
        let start = Instant::now();
        keepalive.activate(start);

        assert!(keepalive.poll(start, 0).is_none());
        assert!(keepalive.poll(start + Duration::from_millis(1999), 0).is_none());

        let ping = keepalive.poll(start + Duration::from_secs(2), 1234).unwrap();
        assert_eq!(ping.ticks, 1234);
        assert!(keepalive.poll(start + Duration::from_secs(3), 0).is_none());
        assert!(keepalive.poll(start + Duration::from_secs(4), 0).is_some());
    }

    #[test]
    fn test_stall_does_not_burst() {
        let mut keepalive = Keepalive::new(Duration::from_secs(1));
        let start = Instant::now();
        keepalive.activate(start);

        let late = start + Duration::from_secs(10);
        assert!(keepalive.poll(late, 0).is_some());
        assert!(keepalive.poll(late, 0).is_none());
        assert_eq!(keepalive.pings_sent(), 1);
    }

    #[test]
    fn test_deactivate_stops_pings() {
        let mut keepalive = Keepalive::new(Duration::from_secs(1));
        let start = Instant::now();
        keepalive.activate(start);
        keepalive.deactivate();
        assert!(keepalive.poll(start + Duration::from_secs(5), 0).is_none());
    }

    #[test]
    fn test_pong_rtt() {
        let mut keepalive = Keepalive::default();
        let rtt = keepalive.on_pong(Pong { ticks: 1000 }, 1042);
        assert_eq!(rtt, Duration::from_millis(42));
        assert_eq!(keepalive.rtt().unwrap().source, RttSource::Echo);

        // Clock skew never produces a negative round trip.
        assert_eq!(keepalive.on_pong(Pong { ticks: 5000 }, 10), Duration::ZERO);
    }

    #[test]
    fn test_transport_sample_recorded() {
        let mut keepalive = Keepalive::default();
        keepalive.on_latency_sample(Duration::from_millis(15));
        assert_eq!(
            keepalive.rtt(),
            Some(RttSample {
                rtt: Duration::from_millis(15),
                source: RttSource::Transport,
            })
        );
    }

    #[test]
    fn test_pong_payload_is_identical() {
        let ping = Envelope::new(Opcode::Ping, Ping { ticks: 1000 }.encode().unwrap());
        let pong = pong_for(&ping);

        assert_eq!(pong.opcode().unwrap(), Opcode::Pong);
        assert_eq!(pong.payload, ping.payload);
        assert_eq!(Pong::decode(&pong.payload).unwrap().ticks, 1000);
    }
}
