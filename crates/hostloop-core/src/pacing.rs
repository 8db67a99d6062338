//! Frame pacing: render-or-skip decisions and the inter-frame sleep.
//!
//! The clock tracks a virtual deadline for the next frame. Each timed tick
//! sleeps until that deadline and then advances it by exactly one frame
//! time, so rounding never accumulates. When the host falls far behind (a
//! pause, a debugger stop) the deadline is re-anchored to "now" instead of
//! fast-forwarding through the backlog.

mod clock;

use std::{
    str::FromStr,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::error::ConfigError;

pub use clock::{Clock, SystemClock};

#[cfg(test)]
pub(crate) use clock::manual::ManualClock;

/// Frames allowed to pass between renders while `Auto` is catching up.
const AUTO_CATCHUP_LIMIT: u32 = 10;

pub const FRAME_TIME_NTSC: Duration = Duration::from_micros(16_667);
pub const FRAME_TIME_PAL: Duration = Duration::from_micros(20_000);
pub const DEFAULT_TURBO_SKIP_FRAMES: u32 = 15;
pub const DEFAULT_LAG_RESYNC_THRESHOLD: Duration = Duration::from_micros(500_000);

/// Refresh-rate regime reported by the emulation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoMode {
    #[default]
    Ntsc,
    Pal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Render every frame while on schedule, one in ten while behind.
    #[default]
    Auto,
    /// Render one frame out of every `n`.
    Fixed(u32),
}

impl FromStr for SkipPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse()
            .map(Self::Fixed)
            .map_err(|_| ConfigError::InvalidFrameSkip(s.to_owned()))
    }
}

/// Per-session pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub frame_time_ntsc: Duration,
    pub frame_time_pal: Duration,
    pub skip_policy: SkipPolicy,
    /// Under turbo, one frame in this many is rendered.
    pub turbo_skip_frames: u32,
    /// Lag at or beyond this is treated as a pause and re-anchors the deadline.
    pub lag_resync_threshold: Duration,
}

impl PacingConfig {
    pub fn frame_time(&self, mode: VideoMode) -> Duration {
        match mode {
            VideoMode::Ntsc => self.frame_time_ntsc,
            VideoMode::Pal => self.frame_time_pal,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_time_ntsc.is_zero() || self.frame_time_pal.is_zero() {
            return Err(ConfigError::ZeroFrameTime);
        }
        Ok(())
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            frame_time_ntsc: FRAME_TIME_NTSC,
            frame_time_pal: FRAME_TIME_PAL,
            skip_policy: SkipPolicy::Auto,
            turbo_skip_frames: DEFAULT_TURBO_SKIP_FRAMES,
            lag_resync_threshold: DEFAULT_LAG_RESYNC_THRESHOLD,
        }
    }
}

/// Speed-related switches that may change between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpeedFlags {
    pub video_mode: VideoMode,
    pub turbo: bool,
    /// The audio device paces frames; the clock stays out of the way.
    pub sound_sync: bool,
    /// Offline stream dumping or "as fast as possible": no pacing at all.
    pub unthrottled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDecision {
    pub render: bool,
    /// Time spent waiting for the deadline during this tick.
    pub slept: Duration,
}

impl FrameDecision {
    const RENDER_NOW: Self = Self {
        render: true,
        slept: Duration::ZERO,
    };
}

pub struct FrameClock<C: Clock = SystemClock> {
    config: PacingConfig,
    clock: C,
    /// When the next frame is due. `None` until the first timed tick.
    deadline: Option<Instant>,
    skipped: u32,
    turbo_skipped: u32,
}

impl FrameClock<SystemClock> {
    pub fn new(config: PacingConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> FrameClock<C> {
    pub fn with_clock(config: PacingConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            deadline: None,
            skipped: 0,
            turbo_skipped: 0,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Forgets the current deadline so the next timed tick re-anchors to "now".
    ///
    /// Used after an explicit pause so resuming does not trip the lag logic.
    pub fn reanchor(&mut self) {
        self.deadline = None;
        self.skipped = 0;
    }

    /// Decides whether this frame renders and waits out the rest of the frame time.
    pub fn tick(&mut self, flags: &SpeedFlags) -> FrameDecision {
        if flags.sound_sync || flags.unthrottled {
            return FrameDecision::RENDER_NOW;
        }

        if flags.turbo {
            return self.tick_turbo();
        }

        self.tick_timed(self.config.frame_time(flags.video_mode))
    }

    fn tick_turbo(&mut self) -> FrameDecision {
        self.turbo_skipped += 1;
        let render = self.turbo_skipped >= self.config.turbo_skip_frames;
        if render {
            self.turbo_skipped = 0;
        }
        FrameDecision {
            render,
            slept: Duration::ZERO,
        }
    }

    fn tick_timed(&mut self, frame_time: Duration) -> FrameDecision {
        let mut now = self.clock.now();
        let mut deadline = *self
            .deadline
            .get_or_insert_with(|| now + Duration::from_micros(1));

        let limit = match self.config.skip_policy {
            SkipPolicy::Auto if deadline < now => AUTO_CATCHUP_LIMIT,
            SkipPolicy::Auto => 1,
            SkipPolicy::Fixed(n) => n,
        };

        self.skipped += 1;
        let render = self.skipped >= limit;
        if render {
            self.skipped = 0;
        }

        if let Some(lag) = now.checked_duration_since(deadline)
            && lag >= self.config.lag_resync_threshold
        {
            debug!(lag_us = lag.as_micros() as u64, "frame pacing resynchronized");
            deadline = now;
        }

        let mut slept = Duration::ZERO;
        while now < deadline {
            self.clock.sleep(deadline - now);
            let woke = self.clock.now();
            slept += woke.saturating_duration_since(now);
            now = woke;
        }

        self.deadline = Some(deadline + frame_time);
        FrameDecision { render, slept }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_US: u64 = 16_667;

    fn clock_with(policy: SkipPolicy) -> (FrameClock<ManualClock>, ManualClock) {
        let manual = ManualClock::new();
        let config = PacingConfig {
            skip_policy: policy,
            ..PacingConfig::default()
        };
        (FrameClock::with_clock(config, manual.clone()), manual)
    }

    #[test]
    fn sleeps_do_not_drift_over_600_frames() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags::default();
        let mut slept = Duration::ZERO;
        for _ in 0..600 {
            let decision = clock.tick(&flags);
            assert!(decision.render);
            slept += decision.slept;
        }
        let expected = Duration::from_micros(600 * FRAME_US);
        let tolerance = Duration::from_micros(FRAME_US);
        assert!(expected.abs_diff(slept) <= tolerance, "slept {slept:?}");
        assert_eq!(slept, manual.slept());
    }

    #[test]
    fn emulation_work_is_absorbed_by_the_sleep() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags::default();
        for i in 0..600u64 {
            // 2..=11 ms of simulated work per frame.
            manual.advance(Duration::from_micros(2_000 + (i * 7_919) % 10_000));
            assert!(clock.tick(&flags).render);
        }
        let expected = Duration::from_micros(600 * FRAME_US);
        assert!(expected.abs_diff(manual.elapsed()) <= Duration::from_micros(FRAME_US));
    }

    #[test]
    fn interrupted_sleep_is_retried_until_the_deadline() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags::default();
        clock.tick(&flags);
        let due = clock.deadline().expect("initialized");
        manual.interrupt_next(3);
        clock.tick(&flags);
        assert!(manual.now() >= due);
    }

    #[test]
    fn long_pause_resynchronizes_instead_of_bursting() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags::default();
        for _ in 0..5 {
            clock.tick(&flags);
        }

        manual.advance(Duration::from_secs(2));
        let resumed_at = manual.now();
        clock.tick(&flags);
        assert_eq!(
            clock.deadline(),
            Some(resumed_at + Duration::from_micros(FRAME_US))
        );

        for _ in 0..10 {
            assert!(clock.tick(&flags).render);
        }
    }

    #[test]
    fn lag_of_exactly_the_threshold_resynchronizes() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags::default();
        clock.tick(&flags);
        let due = clock.deadline().expect("initialized");
        manual.advance(due.duration_since(manual.now()) + DEFAULT_LAG_RESYNC_THRESHOLD);

        let resumed_at = manual.now();
        clock.tick(&flags);
        assert_eq!(
            clock.deadline(),
            Some(resumed_at + Duration::from_micros(FRAME_US))
        );
    }

    #[test]
    fn lag_just_under_the_threshold_keeps_the_schedule() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags::default();
        clock.tick(&flags);
        let due = clock.deadline().expect("initialized");
        manual.advance(
            due.duration_since(manual.now()) + DEFAULT_LAG_RESYNC_THRESHOLD
                - Duration::from_micros(1),
        );

        clock.tick(&flags);
        assert_eq!(
            clock.deadline(),
            Some(due + Duration::from_micros(FRAME_US))
        );
    }

    #[test]
    fn fixed_policy_also_resynchronizes() {
        let (mut clock, manual) = clock_with(SkipPolicy::Fixed(1));
        let flags = SpeedFlags::default();
        clock.tick(&flags);
        manual.advance(Duration::from_secs(3));
        let resumed_at = manual.now();
        assert!(clock.tick(&flags).render);
        assert_eq!(
            clock.deadline(),
            Some(resumed_at + Duration::from_micros(FRAME_US))
        );
    }

    #[test]
    fn small_lag_is_caught_up_by_skipping() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags::default();
        clock.tick(&flags);
        // 100 ms behind: below the resync threshold.
        manual.advance(Duration::from_millis(100));
        let renders = (0..5).filter(|_| clock.tick(&flags).render).count();
        assert_eq!(renders, 0);
    }

    #[test]
    fn reanchor_restarts_from_now() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags::default();
        clock.tick(&flags);
        manual.advance(Duration::from_millis(300));
        clock.reanchor();
        assert_eq!(clock.deadline(), None);
        let before = manual.slept();
        assert!(clock.tick(&flags).render);
        assert_eq!(manual.slept() - before, Duration::from_micros(1));
    }

    #[test]
    fn fixed_skip_renders_every_nth_frame() {
        let (mut clock, _) = clock_with(SkipPolicy::Fixed(3));
        let flags = SpeedFlags::default();
        let pattern: Vec<bool> = (0..9).map(|_| clock.tick(&flags).render).collect();
        assert_eq!(
            pattern,
            [false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn turbo_skips_by_count_without_sleeping() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags {
            turbo: true,
            ..SpeedFlags::default()
        };
        let renders = (0..45).filter(|_| clock.tick(&flags).render).count();
        assert_eq!(renders, 3);
        assert_eq!(manual.slept(), Duration::ZERO);
        assert_eq!(clock.deadline(), None);
    }

    #[test]
    fn sound_sync_and_unthrottled_bypass_pacing() {
        let (mut clock, manual) = clock_with(SkipPolicy::Fixed(4));
        for flags in [
            SpeedFlags {
                sound_sync: true,
                ..SpeedFlags::default()
            },
            SpeedFlags {
                unthrottled: true,
                turbo: true,
                ..SpeedFlags::default()
            },
        ] {
            for _ in 0..10 {
                assert_eq!(clock.tick(&flags), FrameDecision::RENDER_NOW);
            }
        }
        assert_eq!(manual.elapsed(), Duration::ZERO);
    }

    #[test]
    fn pal_uses_its_own_frame_time() {
        let (mut clock, manual) = clock_with(SkipPolicy::Auto);
        let flags = SpeedFlags {
            video_mode: VideoMode::Pal,
            ..SpeedFlags::default()
        };
        for _ in 0..51 {
            clock.tick(&flags);
        }
        // 1 µs epoch marker plus 50 full PAL frames.
        assert_eq!(manual.elapsed(), Duration::from_micros(1 + 50 * 20_000));
    }

    #[test]
    fn skip_policy_parses_from_text() {
        assert_eq!("auto".parse(), Ok(SkipPolicy::Auto));
        assert_eq!("AUTO".parse(), Ok(SkipPolicy::Auto));
        assert_eq!("2".parse(), Ok(SkipPolicy::Fixed(2)));
        assert_eq!(
            "two".parse::<SkipPolicy>(),
            Err(ConfigError::InvalidFrameSkip("two".to_owned()))
        );
    }
}
