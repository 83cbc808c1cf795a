// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time source for freshness checks.

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use parking_lot::Mutex;

/// Provides the current time to the cache.
///
/// Freshness is tracked with absolute [`SystemTime`] values because entries are shared with
/// other processes through the storage backend; [`Instant`] is used only to time operations
/// for telemetry.
///
/// Cloning a clock is cheap and every clone observes the same time. A clock created from a
/// [`ClockControl`] is frozen and only moves when the control advances it, which keeps
/// expiry tests deterministic.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use recall::{Clock, ClockControl};
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let before = clock.system_time();
/// control.advance(Duration::from_secs(10));
/// assert_eq!(clock.system_time().duration_since(before).unwrap(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Clock(ClockState);

#[derive(Debug, Clone, Default)]
enum ClockState {
    #[default]
    System,
    Controlled(ClockControl),
}

impl Clock {
    /// Creates a clock that reads the operating system time.
    #[must_use]
    pub fn system() -> Self {
        Self(ClockState::System)
    }

    /// Creates a frozen clock.
    ///
    /// Equivalent to `ClockControl::new().to_clock()`; since the control is dropped,
    /// time never moves.
    #[must_use]
    pub fn new_frozen() -> Self {
        ClockControl::new().to_clock()
    }

    /// Returns the current absolute time.
    #[must_use]
    pub fn system_time(&self) -> SystemTime {
        match &self.0 {
            ClockState::System => SystemTime::now(),
            ClockState::Controlled(control) => control.system_time(),
        }
    }

    /// Returns the current monotonic instant.
    #[must_use]
    pub fn instant(&self) -> Instant {
        match &self.0 {
            ClockState::System => Instant::now(),
            ClockState::Controlled(control) => control.instant(),
        }
    }

    /// Returns the time elapsed since `start`, saturating at zero.
    #[must_use]
    pub fn elapsed_since(&self, start: Instant) -> Duration {
        self.instant().saturating_duration_since(start)
    }

    /// Awaits `work` and measures how long it took on this clock.
    pub(crate) async fn timed<F: Future>(&self, work: F) -> Timed<F::Output> {
        let start = self.instant();
        let result = work.await;
        Timed {
            result,
            duration: self.elapsed_since(start),
        }
    }
}

/// Output of [`Clock::timed`].
#[derive(Debug)]
pub(crate) struct Timed<R> {
    pub(crate) result: R,
    pub(crate) duration: Duration,
}

/// Controls the flow of time in tests.
///
/// The initial time is the UNIX epoch unless created with [`ClockControl::new_at`].
#[derive(Debug, Clone)]
pub struct ClockControl {
    state: Arc<Mutex<ControlState>>,
}

#[derive(Debug)]
struct ControlState {
    system_time: SystemTime,
    instant: Instant,
}

impl Default for ClockControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockControl {
    /// Creates a control whose clock starts at the UNIX epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::new_at(SystemTime::UNIX_EPOCH)
    }

    /// Creates a control whose clock starts at `system_time`.
    #[must_use]
    pub fn new_at(system_time: SystemTime) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControlState {
                system_time,
                instant: Instant::now(),
            })),
        }
    }

    /// Creates a control whose clock starts at the current system time.
    #[must_use]
    pub fn now() -> Self {
        Self::new_at(SystemTime::now())
    }

    /// Moves time forward by `duration` for every clock created from this control.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.system_time += duration;
        state.instant += duration;
    }

    /// Returns a clock driven by this control.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock(ClockState::Controlled(self.clone()))
    }

    /// Returns the controlled absolute time.
    #[must_use]
    pub fn system_time(&self) -> SystemTime {
        self.state.lock().system_time
    }

    fn instant(&self) -> Instant {
        self.state.lock().instant
    }
}
