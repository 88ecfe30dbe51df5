//! The single time source for the frame loop.

use std::time::Instant;

/// Time handed to one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous tick
    pub delta: f32,
    /// Seconds since the clock started
    pub elapsed: f32,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Wall { last: Instant },
    Fixed { step: f32 },
}

/// Produces `(delta, elapsed)` once per frame.
///
/// Wall clocks read `Instant`; fixed clocks advance by a constant step, which
/// the headless runner and tests use.
#[derive(Debug, Clone)]
pub struct FrameClock {
    source: Source,
    elapsed: f32,
}

impl FrameClock {
    pub fn wall() -> Self {
        Self {
            source: Source::Wall {
                last: Instant::now(),
            },
            elapsed: 0.0,
        }
    }

    pub fn fixed(step: f32) -> Self {
        Self {
            source: Source::Fixed { step },
            elapsed: 0.0,
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn tick(&mut self) -> FrameTime {
        let delta = match &mut self.source {
            Source::Wall { last } => {
                let now = Instant::now();
                let delta = now.duration_since(*last).as_secs_f32();
                *last = now;
                delta
            }
            Source::Fixed { step } => *step,
        };
        self.elapsed += delta;
        FrameTime {
            delta,
            elapsed: self.elapsed,
        }
    }
}
