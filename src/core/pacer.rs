use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

/// Timing of a single completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    /// Time spent emulating the frame, from its first CPU step to its last
    pub busy: Duration,
    /// Time from the first CPU step to the end of pacing
    pub frame_time: Duration,
    /// Average wall clock time per emulated CPU cycle
    pub cycle_time: Duration,
}

/// Keeps emulation from running faster than the real console.
///
/// At the end of every frame, sleeps for whatever is left of the target frame period.
/// A frame that took longer than the period is not made up for later.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    target: Duration,
}

impl FramePacer {
    pub fn new(target: Duration) -> FramePacer {
        FramePacer { target }
    }
    /// ```
    /// use std::time::Duration;
    /// use nes_tandem::core::FramePacer;
    /// assert_eq!(FramePacer::from_refresh_rate(60).target(), Duration::from_nanos(16_666_666));
    /// ```
    pub fn from_refresh_rate(frames_per_second: u32) -> FramePacer {
        FramePacer::new(Duration::from_nanos(
            1_000_000_000 / frames_per_second.max(1) as u64,
        ))
    }
    /// The period of a single frame.
    pub fn target(&self) -> Duration {
        self.target
    }
    /// How long to wait after a frame that took `elapsed`, if at all.
    pub fn slack(&self, elapsed: Duration) -> Option<Duration> {
        self.target.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
    /// Average time per cycle, rounded down to the nanosecond.
    pub fn cycle_time(elapsed: Duration, cycles: u64) -> Duration {
        match cycles {
            0 => Duration::ZERO,
            _ => Duration::from_nanos((elapsed.as_nanos() / cycles as u128) as u64),
        }
    }
    /// Finish a frame that started at `started` and ran for `cycles` CPU cycles.
    ///
    /// If `limit_speed` is set, blocks until the frame period is up or `stop` is raised.
    /// The wait can be cut short by unparking the calling thread after raising `stop`.
    pub fn finish_frame(
        &self,
        started: Instant,
        cycles: u64,
        limit_speed: bool,
        stop: &AtomicBool,
    ) -> FrameReport {
        let busy = started.elapsed();
        if limit_speed && self.slack(busy).is_some() {
            wait_until(started + self.target, stop);
        }
        FrameReport {
            busy,
            frame_time: started.elapsed(),
            cycle_time: FramePacer::cycle_time(busy, cycles),
        }
    }
}

// park_timeout may wake up early, so keep going until the deadline
fn wait_until(deadline: Instant, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::park_timeout(deadline - now);
    }
}
