/// Callback an animation can register on its [`Timer`].
///
/// Handlers are tokens rather than closures: the timer only records which handler is due, and
/// the owning [`Animation`](crate::Animation) dispatches it with the canvas in hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TickHandler {
    /// Advance the frame sequence by one frame.
    Step,
    /// Fire once after the repeat delay, then restore [`TickHandler::Step`].
    LoopDelay,
}

/// Host-provided event source that fires registered handlers every `interval` milliseconds.
///
/// The host owns scheduling: when the interval elapses it calls
/// [`Animation::tick`](crate::Animation::tick), which dispatches [`Timer::handlers`].
pub trait Timer {
    /// Start (or resume) firing.
    fn start(&mut self);

    /// Stop firing. Registered handlers are kept.
    fn stop(&mut self);

    /// Whether the timer is firing.
    fn is_running(&self) -> bool;

    /// Current interval in milliseconds.
    fn interval(&self) -> u64;

    /// Change the interval. Takes effect from the next tick.
    fn set_interval(&mut self, interval_ms: u64);

    /// Register a handler. Registering the same handler twice is a no-op.
    fn on_tick(&mut self, handler: TickHandler);

    /// Unregister a handler if present.
    fn remove_tick(&mut self, handler: TickHandler);

    /// Registered handlers, in registration order.
    fn handlers(&self) -> Vec<TickHandler>;
}

/// Deterministic [`Timer`] for hosts that drive ticks themselves (and for tests).
#[derive(Clone, Debug, Default)]
pub struct ManualTimer {
    interval: u64,
    running: bool,
    handlers: Vec<TickHandler>,
}

impl ManualTimer {
    /// Create a stopped timer with `interval_ms`.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: interval_ms,
            running: false,
            handlers: Vec::new(),
        }
    }
}

impl Timer for ManualTimer {
    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn interval(&self) -> u64 {
        self.interval
    }

    fn set_interval(&mut self, interval_ms: u64) {
        self.interval = interval_ms;
    }

    fn on_tick(&mut self, handler: TickHandler) {
        if !self.handlers.contains(&handler) {
            self.handlers.push(handler);
        }
    }

    fn remove_tick(&mut self, handler: TickHandler) {
        self.handlers.retain(|h| *h != handler);
    }

    fn handlers(&self) -> Vec<TickHandler> {
        self.handlers.clone()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/timer.rs"]
mod tests;
