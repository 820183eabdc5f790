/// Tick clock: converts wall-clock milliseconds into frame-normalized
/// delta ticks.
///
/// One delta tick is one reference frame (60 Hz by default). Movement is
/// scaled by delta so speed is independent of the actual tick rate; the
/// clamp keeps a stalled frame from teleporting actors.

#[derive(Clone, Debug)]
pub struct Clock {
    now: u64,
    last_tick: Option<u64>,
    frame_ms: f32,
    max_delta: f32,
}

impl Clock {
    pub fn new(frame_ms: f32, max_delta: f32) -> Self {
        Clock {
            now: 0,
            last_tick: None,
            frame_ms: frame_ms.max(1.0),
            max_delta: max_delta.max(0.0),
        }
    }

    /// Record a tick at `now` and return the clamped delta in frames.
    /// The first tick (and any tick after a resync) yields 0.
    pub fn tick(&mut self, now: u64) -> f32 {
        let elapsed = match self.last_tick {
            Some(last) => now.saturating_sub(last),
            None => 0,
        };
        self.last_tick = Some(now);
        self.now = now;
        (elapsed as f32 / self.frame_ms).clamp(0.0, self.max_delta)
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Forget the last tick (after a pause the next delta starts from 0).
    pub fn resync(&mut self) {
        self.last_tick = None;
    }
}
