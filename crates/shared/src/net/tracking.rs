use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

pub const RECEIVE_WINDOW: u32 = 256;

const MIN_RTO: Duration = Duration::from_millis(50);
const MAX_RTO: Duration = Duration::from_secs(1);

/// Smoothed round-trip estimate (RFC 6298 gains), in milliseconds.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    srtt: f32,
    rtt_var: f32,
    samples: u64,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self {
            srtt: 100.0,
            rtt_var: 50.0,
            samples: 0,
        }
    }
}

impl RttEstimator {
    pub fn update(&mut self, sample: Duration) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let rtt = sample.as_secs_f32() * 1000.0;
        if self.samples == 0 {
            self.srtt = rtt;
            self.rtt_var = rtt / 2.0;
        } else {
            let diff = (rtt - self.srtt).abs();
            self.rtt_var = (1.0 - BETA) * self.rtt_var + BETA * diff;
            self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt;
        }
        self.samples += 1;
    }

    pub fn srtt(&self) -> Duration {
        Duration::from_secs_f32(self.srtt.max(0.0) / 1000.0)
    }

    pub fn rtt_var(&self) -> f32 {
        self.rtt_var
    }

    pub fn has_samples(&self) -> bool {
        self.samples > 0
    }

    pub fn rto(&self) -> Duration {
        let ms = self.srtt + 4.0 * self.rtt_var;
        Duration::from_secs_f32(ms.max(0.0) / 1000.0).clamp(MIN_RTO, MAX_RTO)
    }
}

#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub ordinal: u32,
    pub data: Vec<u8>,
    pub first_sent: Instant,
    pub last_sent: Instant,
    pub resent: bool,
}

/// Sender half of one reliable-ordered channel.
///
/// At most [`RECEIVE_WINDOW`] ordinals are in flight, counted from the oldest
/// unacked one, so the remote always has room to buffer what it is sent.
/// Anything beyond that waits in the backlog until acks open the window.
#[derive(Debug, Default)]
pub struct ReliableSender {
    pending: VecDeque<PendingMessage>,
    backlog: VecDeque<Vec<u8>>,
    next_ordinal: u32,
}

impl ReliableSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message. It goes out with the next [`ReliableSender::take_ready`].
    pub fn push(&mut self, data: Vec<u8>) {
        self.backlog.push_back(data);
    }

    fn window_open(&self) -> bool {
        match self.pending.front() {
            Some(oldest) => self.next_ordinal.wrapping_sub(oldest.ordinal) < RECEIVE_WINDOW,
            None => true,
        }
    }

    /// Assigns ordinals to backlogged messages while the window allows and
    /// returns them for a first transmission.
    pub fn take_ready(&mut self, now: Instant) -> Vec<(u32, Vec<u8>)> {
        let mut ready = Vec::new();
        while self.window_open() {
            let Some(data) = self.backlog.pop_front() else {
                break;
            };
            let ordinal = self.next_ordinal;
            self.next_ordinal = self.next_ordinal.wrapping_add(1);

            self.pending.push_back(PendingMessage {
                ordinal,
                data: data.clone(),
                first_sent: now,
                last_sent: now,
                resent: false,
            });
            ready.push((ordinal, data));
        }
        ready
    }

    /// Messages whose last transmission is older than `rto`. Marks them as sent now.
    pub fn collect_resends(&mut self, now: Instant, rto: Duration) -> Vec<(u32, Vec<u8>)> {
        let mut resends = Vec::new();
        for pending in &mut self.pending {
            if now.duration_since(pending.last_sent) >= rto {
                pending.last_sent = now;
                pending.resent = true;
                resends.push((pending.ordinal, pending.data.clone()));
            }
        }
        resends
    }

    /// Returns an RTT sample only for messages that were never retransmitted.
    pub fn process_ack(&mut self, ordinal: u32, now: Instant) -> Option<Duration> {
        let index = self.pending.iter().position(|p| p.ordinal == ordinal)?;
        let acked = self.pending.remove(index)?;

        if acked.resent {
            None
        } else {
            Some(now.duration_since(acked.first_sent))
        }
    }

    pub fn unacked_count(&self) -> usize {
        self.pending.len()
    }

    pub fn backlog_count(&self) -> usize {
        self.backlog.len()
    }
}

/// Receiver half of one reliable-ordered channel.
#[derive(Debug, Default)]
pub struct OrderedReceiver {
    next_expected: u32,
    buffered: HashMap<u32, Vec<u8>>,
}

impl OrderedReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts one message and returns everything now deliverable, in order.
    ///
    /// `None` means the ordinal lies past the window and was not stored; it
    /// must not be acked so the sender keeps it pending. Duplicates of stored
    /// or already delivered ordinals yield `Some` with nothing to deliver.
    pub fn accept(&mut self, ordinal: u32, data: Vec<u8>) -> Option<Vec<Vec<u8>>> {
        let offset = ordinal.wrapping_sub(self.next_expected);
        if offset >= RECEIVE_WINDOW {
            let behind = self.next_expected.wrapping_sub(ordinal);
            return (behind <= u32::MAX / 2).then(Vec::new);
        }

        self.buffered.entry(ordinal).or_insert(data);

        let mut ready = Vec::new();
        while let Some(data) = self.buffered.remove(&self.next_expected) {
            ready.push(data);
            self.next_expected = self.next_expected.wrapping_add(1);
        }
        Some(ready)
    }

    pub fn next_expected(&self) -> u32 {
        self.next_expected
    }

    pub fn buffered_count(&self) -> usize {
        self.buffered.len()
    }
}
