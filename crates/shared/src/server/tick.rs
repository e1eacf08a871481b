use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::net::{DeliveryMode, Message, SessionId, Transport};
use crate::session::SendError;

use super::ServerCore;

/// Outbound primitive for whatever advances the world, keyed by session
/// rather than by transport peer.
pub trait SessionSend {
    fn send_to_session(
        &mut self,
        session_id: SessionId,
        message: &Message,
        mode: DeliveryMode,
    ) -> Result<(), SendError>;

    /// Returns how many sessions the message was handed to.
    fn broadcast(&mut self, message: &Message, mode: DeliveryMode) -> Result<usize, SendError>;

    fn sessions(&self) -> Vec<SessionId>;
}

/// Called once per tick, after inbound traffic has been processed.
pub trait TickHook {
    fn on_tick(&mut self, tick: u64, sessions: &mut dyn SessionSend);
}

/// Attached when there is no world simulation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWorld;

impl TickHook for NoopWorld {
    fn on_tick(&mut self, _tick: u64, _sessions: &mut dyn SessionSend) {}
}

pub struct TickDriver<T: Transport, H: TickHook = NoopWorld> {
    core: ServerCore<T>,
    hook: H,
    interval: Duration,
    tick: u64,
    deadline: Option<Instant>,
    overruns: u64,
}

impl<T: Transport> TickDriver<T, NoopWorld> {
    pub fn new(core: ServerCore<T>, tick_rate: u32) -> Self {
        Self::with_hook(core, tick_rate, NoopWorld)
    }
}

impl<T: Transport, H: TickHook> TickDriver<T, H> {
    pub fn with_hook(core: ServerCore<T>, tick_rate: u32, hook: H) -> Self {
        Self {
            core,
            hook,
            interval: Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64),
            tick: 0,
            deadline: None,
            overruns: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn core(&self) -> &ServerCore<T> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ServerCore<T> {
        &mut self.core
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// Drains the transport through the core, then hands the tick to the hook.
    pub fn tick_once(&mut self) {
        if let Err(e) = self.core.pump() {
            log::warn!("Network error: {}", e);
        }

        for event in self.core.drain_events() {
            event.log();
        }

        self.hook.on_tick(self.tick, &mut self.core);
        self.tick += 1;
    }

    /// Moves the deadline one interval past the previous one and returns how
    /// long to wait for it. Zero means the next tick is already late.
    pub fn advance(&mut self, now: Instant) -> Duration {
        let next = self.deadline.unwrap_or(now) + self.interval;
        self.deadline = Some(next);

        if next <= now {
            self.overruns += 1;
            Duration::ZERO
        } else {
            next - now
        }
    }

    /// Ticks until `running` clears, then closes every peer link.
    pub fn run(&mut self, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            self.tick_once();

            let wait = self.advance(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
        }

        log::info!("Stopping after {} ticks ({} overruns)", self.tick, self.overruns);
        self.core.disconnect_all();
        if let Err(e) = self.core.pump() {
            log::warn!("Network error during shutdown: {}", e);
        }
        for event in self.core.drain_events() {
            event.log();
        }
    }
}
