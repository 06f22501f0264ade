use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable cancellation flag for a [`FrameLoop`].
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Timing passed to each frame callback.
#[derive(Clone, Copy, Debug)]
pub struct FrameTick {
    pub index: u64,
    pub elapsed: Duration,
}

/// Fixed-cadence frame driver that runs until its [`StopSignal`] fires.
pub struct FrameLoop {
    interval: Duration,
    stop: StopSignal,
}

impl FrameLoop {
    pub fn new(fps: u32) -> Self {
        let fps = fps.max(1);
        Self {
            interval: Duration::from_secs_f64(1.0 / fps as f64),
            stop: StopSignal::new(),
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Call `on_frame` once per interval until stopped. A late frame does
    /// not trigger catch-up frames; the schedule restarts from now.
    /// Returns the number of frames run.
    pub fn run<F>(&self, mut on_frame: F) -> Result<u64>
    where
        F: FnMut(FrameTick) -> Result<()>,
    {
        let started = Instant::now();
        let mut next_deadline = started;
        let mut index = 0u64;

        while !self.stop.is_stopped() {
            on_frame(FrameTick {
                index,
                elapsed: started.elapsed(),
            })?;
            index += 1;

            next_deadline += self.interval;
            let now = Instant::now();
            if next_deadline > now {
                std::thread::sleep(next_deadline - now);
            } else {
                next_deadline = now;
            }
        }

        log::debug!("Frame loop stopped after {} frames", index);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_until_disposed() {
        let frame_loop = FrameLoop::new(1000);
        let stop = frame_loop.stop_signal();
        let mut seen = Vec::new();

        let count = frame_loop
            .run(|tick| {
                seen.push(tick.index);
                if tick.index == 4 {
                    stop.dispose();
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stopped_loop_runs_no_frames() {
        let frame_loop = FrameLoop::new(60);
        frame_loop.stop_signal().dispose();
        let count = frame_loop.run(|_| panic!("frame after dispose")).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn frame_error_ends_the_loop() {
        let frame_loop = FrameLoop::new(1000);
        let result = frame_loop.run(|tick| {
            if tick.index == 2 {
                anyhow::bail!("presenter gone");
            }
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn interval_follows_fps() {
        assert_eq!(FrameLoop::new(50).interval(), Duration::from_millis(20));
        assert_eq!(FrameLoop::new(0).interval(), Duration::from_secs(1));
    }
}
