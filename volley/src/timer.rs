use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Paces the live statistics panel.
///
/// A slow observer delays the following frames instead of bunching them up, and
/// [`Frame::lag`] reports how far behind schedule the frame fired.
pub(crate) struct RenderTicker {
    interval: Interval,
    period: Duration,
    previous: Instant,
    frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub number: u64,
    pub since_previous: Duration,
}

impl Frame {
    pub fn lag(&self, period: Duration) -> Duration {
        self.since_previous.saturating_sub(period)
    }
}

impl RenderTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick; the first frame lands one period in.
        interval.reset();
        Self {
            interval,
            period,
            previous: Instant::now(),
            frames: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn next_frame(&mut self) -> Frame {
        self.interval.tick().await;
        let now = Instant::now();
        let since_previous = now.saturating_duration_since(self.previous);
        self.previous = now;
        self.frames += 1;
        Frame {
            number: self.frames,
            since_previous,
        }
    }
}

impl std::fmt::Display for RenderTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", humantime::format_duration(self.period))
    }
}
