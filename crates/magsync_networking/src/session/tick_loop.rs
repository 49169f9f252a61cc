//! # Tick Loop
//!
//! Fixed-rate pacing for the binaries that drive a [`super::Session`]
//! against a real socket.
//!
//! ## Design
//!
//! - Ticks at a fixed rate (20Hz by default)
//! - Hands out the session clock in seconds since start
//! - Records how long each tick took and how many ran late

use std::time::{Duration, Instant};

use magsync_shared::TICK_RATE;

/// Fixed-timestep tick controller.
pub struct TickLoop {
    /// Target tick duration.
    tick_duration: Duration,
    /// Time the loop was created; the session clock's zero.
    started: Instant,
    /// Start of the most recent tick.
    last_tick: Instant,
    /// Total ticks executed.
    tick_count: u64,
    /// Timing statistics.
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Shortest tick observed (microseconds).
    pub min_tick_us: u64,
    /// Longest tick observed (microseconds).
    pub max_tick_us: u64,
    /// Ticks that exceeded the budget.
    pub late_ticks: u64,
}

impl TickLoop {
    /// Creates a loop ticking `tick_rate` times per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        let now = Instant::now();
        Self {
            tick_duration,
            started: now,
            last_tick: now,
            tick_count: 0,
            stats: TickStats {
                min_tick_us: u64::MAX,
                ..TickStats::default()
            },
        }
    }

    /// Marks the start of a tick and returns the session clock in seconds.
    pub fn begin_tick(&mut self) -> f64 {
        self.last_tick = Instant::now();
        self.tick_count += 1;
        self.last_tick.duration_since(self.started).as_secs_f64()
    }

    /// Marks the end of a tick, recording its duration.
    pub fn end_tick(&mut self) {
        let duration_us = self.last_tick.elapsed().as_micros() as u64;
        self.stats.min_tick_us = self.stats.min_tick_us.min(duration_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(duration_us);
        if duration_us > self.tick_duration.as_micros() as u64 {
            self.stats.late_ticks += 1;
        }
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.last_tick.elapsed();
        if elapsed < self.tick_duration {
            std::thread::sleep(self.tick_duration - elapsed);
        }
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_loop_creation() {
        let tick_loop = TickLoop::new(20);
        assert_eq!(tick_loop.tick_count(), 0);
        assert_eq!(tick_loop.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_clock_advances() {
        let mut tick_loop = TickLoop::new(1000);
        let first = tick_loop.begin_tick();
        tick_loop.end_tick();
        tick_loop.wait_for_next_tick();
        let second = tick_loop.begin_tick();
        tick_loop.end_tick();

        assert!(second > first);
        assert_eq!(tick_loop.tick_count(), 2);
        assert!(tick_loop.stats().min_tick_us <= tick_loop.stats().max_tick_us);
    }
}
